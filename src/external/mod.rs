//! Filters delegating to external executables.
//!
//! A tool type ([`ToolSpec`]) carries an argv template and the capabilities
//! derived for it. An [`ExternalTool`] is one configured instance: its
//! options are resolved like any filter's, then each capability call expands
//! the template and runs [`subprocess`].

mod process;
mod spec;
mod template;

pub use process::subprocess;
pub use spec::{
    Method, MethodDecl, OpenFn, Overrides, StreamFn, ToolBuilder, ToolSpec, define_tools,
};
pub use template::{RESERVED, TemplateVars, expand_argv};

use crate::config::{Kwargs, Value};
use crate::filter::{Capabilities, Capability, Filter, FilterBase, FilterError, Slot};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// A configured instance of a tool type.
#[derive(Debug)]
pub struct ExternalTool {
    spec: Arc<ToolSpec>,
    base: FilterBase,
}

impl ExternalTool {
    pub fn new(spec: Arc<ToolSpec>, kwargs: Kwargs) -> Result<Self, FilterError> {
        let base = FilterBase::new(spec.options(), kwargs)?;
        Ok(Self { spec, base })
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// The `self.*` namespace of argv templates.
    fn template_self(&self) -> Value {
        let mut map: BTreeMap<String, Value> = self
            .spec
            .options()
            .iter()
            .map(|o| (o.attr.clone(), Value::Null))
            .collect();
        map.extend(
            self.options()
                .values()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        map.insert("name".to_owned(), Value::from(self.display_name()));
        Value::Map(map)
    }

    /// Expand `argv` against this instance and the call arguments.
    pub fn format_argv(
        &self,
        argv: &[String],
        positional: &[Value],
        kw: &Kwargs,
    ) -> Result<Vec<String>, FilterError> {
        let this = self.template_self();
        let vars = TemplateVars {
            positional,
            kwargs: kw,
            this: &this,
        };
        Ok(expand_argv(argv, &vars)?)
    }

    /// Run already expanded `argv` in the context root.
    pub fn subprocess(
        &self,
        argv: &[String],
        out: &mut dyn Write,
        data: Option<&[u8]>,
    ) -> Result<(), FilterError> {
        let cwd = self.base.ctx().map(|ctx| ctx.root.as_path());
        subprocess(argv, out, data, cwd)
    }

    fn run_template(
        &self,
        positional: &[Value],
        out: &mut dyn Write,
        data: Option<&[u8]>,
        kw: &Kwargs,
    ) -> Result<(), FilterError> {
        let argv = self.format_argv(self.spec.argv(), positional, kw)?;
        self.subprocess(&argv, out, data)
    }

    fn run_stream(
        &self,
        capability: Capability,
        input: &mut dyn Read,
        out: &mut dyn Write,
        kw: &Kwargs,
    ) -> Result<(), FilterError> {
        let custom = match capability {
            Capability::Input => self.spec.overrides().input.as_ref(),
            Capability::Output => self.spec.overrides().output.as_ref(),
            Capability::Open => None,
        };
        match (self.spec.capabilities().get(capability), custom) {
            (Slot::Native, Some(f)) => f(self, input, out, kw),
            (Slot::Tool, _) => {
                let mut data = Vec::new();
                input.read_to_end(&mut data)?;
                self.run_template(&[], out, Some(&data), kw)
            }
            _ => Err(self.unsupported(capability)),
        }
    }
}

impl Filter for ExternalTool {
    fn name(&self) -> Option<&str> {
        self.spec.name()
    }

    fn type_name(&self) -> &str {
        self.spec.type_name()
    }

    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn capabilities(&self) -> Capabilities {
        self.spec.capabilities()
    }

    fn open(&self, out: &mut dyn Write, source: &Path, kw: &Kwargs) -> Result<(), FilterError> {
        match (self.spec.capabilities().open, &self.spec.overrides().open) {
            (Slot::Native, Some(f)) => f(self, out, source, kw),
            (Slot::Tool, _) => {
                let source = Value::from(source.to_string_lossy().into_owned());
                self.run_template(&[source], out, None, kw)
            }
            _ => Err(self.unsupported(Capability::Open)),
        }
    }

    fn input(&self, input: &mut dyn Read, out: &mut dyn Write, kw: &Kwargs) -> Result<(), FilterError> {
        self.run_stream(Capability::Input, input, out, kw)
    }

    fn output(&self, input: &mut dyn Read, out: &mut dyn Write, kw: &Kwargs) -> Result<(), FilterError> {
        self.run_stream(Capability::Output, input, out, kw)
    }

    /// The argv template and method along with the resolved options, so
    /// two types registered under one name never compare equal.
    fn unique(&self) -> Value {
        let mut token = BTreeMap::new();
        token.insert("argv".to_owned(), Value::from(self.spec.argv().to_vec()));
        token.insert("method".to_owned(), Value::from(self.spec.method().as_str()));
        token.insert("options".to_owned(), self.options().to_value());
        Value::Map(token)
    }
}
