//! Tool type definitions and capability derivation.
//!
//! A tool type is defined once, optionally on top of a parent type. Which of
//! `open`, `input` and `output` it provides follows from its `method`
//! declaration and the parent's state:
//!
//! | declaration          | parent locked | result                                   |
//! |----------------------|---------------|------------------------------------------|
//! | any                  | yes           | parent's slots; explicit overrides added |
//! | `none`               | no            | all slots kept, still unlocked           |
//! | unset, argv declared | no            | as `output`                              |
//! | unset, no argv       | no            | every slot dropped except overrides      |
//! | `open/input/output`  | no            | that slot kept, others dropped unless overridden |
//!
//! Every type except `none` locks its subtree.

use super::ExternalTool;
use crate::config::{Kwargs, OptionSpec, ToolDef};
use crate::filter::{
    Capabilities, Capability, DefinitionError, Filter, FilterError, FilterType, Slot,
};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Custom `open` implementation.
pub type OpenFn =
    Arc<dyn Fn(&ExternalTool, &mut dyn Write, &Path, &Kwargs) -> Result<(), FilterError> + Send + Sync>;

/// Custom `input` or `output` implementation.
pub type StreamFn = Arc<
    dyn Fn(&ExternalTool, &mut dyn Read, &mut dyn Write, &Kwargs) -> Result<(), FilterError>
        + Send
        + Sync,
>;

// ============================================================================
// Method
// ============================================================================

/// The capability an argv template is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Open,
    Input,
    Output,
}

impl Method {
    pub fn capability(self) -> Capability {
        match self {
            Method::Open => Capability::Open,
            Method::Input => Capability::Input,
            Method::Output => Capability::Output,
        }
    }
}

/// A type's own `method` declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MethodDecl {
    /// Not declared.
    #[default]
    Unset,
    /// Declared `none`: keep every inherited slot, bind nothing.
    Manual,
    Bound(Method),
}

impl MethodDecl {
    pub fn as_str(self) -> &'static str {
        match self {
            MethodDecl::Unset => "unset",
            MethodDecl::Manual => "none",
            MethodDecl::Bound(Method::Open) => "open",
            MethodDecl::Bound(Method::Input) => "input",
            MethodDecl::Bound(Method::Output) => "output",
        }
    }
}

impl FromStr for MethodDecl {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(MethodDecl::Manual),
            "open" => Ok(MethodDecl::Bound(Method::Open)),
            "input" => Ok(MethodDecl::Bound(Method::Input)),
            "output" => Ok(MethodDecl::Bound(Method::Output)),
            other => Err(DefinitionError::InvalidMethod(other.to_owned())),
        }
    }
}

impl From<Method> for MethodDecl {
    fn from(method: Method) -> Self {
        MethodDecl::Bound(method)
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Capability implementations supplied explicitly by a type.
#[derive(Clone, Default)]
pub struct Overrides {
    pub open: Option<OpenFn>,
    pub input: Option<StreamFn>,
    pub output: Option<StreamFn>,
}

impl Overrides {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Open => self.open.is_some(),
            Capability::Input => self.input.is_some(),
            Capability::Output => self.output.is_some(),
        }
    }

    /// Own overrides win; missing ones come from the parent.
    fn inherit(self, parent: &Overrides) -> Self {
        Self {
            open: self.open.or_else(|| parent.open.clone()),
            input: self.input.or_else(|| parent.input.clone()),
            output: self.output.or_else(|| parent.output.clone()),
        }
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present: Vec<_> = Capability::ALL
            .into_iter()
            .filter(|c| self.has(*c))
            .map(Capability::as_str)
            .collect();
        f.debug_tuple("Overrides").field(&present).finish()
    }
}

// ============================================================================
// ToolSpec
// ============================================================================

/// A fully derived tool type.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    name: Option<String>,
    type_name: String,
    argv: Vec<String>,
    options: Vec<OptionSpec>,
    method: MethodDecl,
    locked: bool,
    capabilities: Capabilities,
    overrides: Overrides,
}

impl ToolSpec {
    pub fn builder(name: &str) -> ToolBuilder {
        ToolBuilder::new(name)
    }

    /// Define a tool from its config-file table.
    ///
    /// `parent` resolves the `extends` name to an already defined type.
    pub fn from_def(
        name: &str,
        def: &ToolDef,
        parent: impl FnOnce(&str) -> Option<Arc<ToolSpec>>,
    ) -> Result<Arc<ToolSpec>, DefinitionError> {
        let mut builder = ToolBuilder::new(name);
        if let Some(method) = &def.method {
            builder = builder.method(method.parse::<MethodDecl>()?);
        }
        if let Some(argv) = &def.argv {
            builder = builder.argv(argv.iter().map(String::as_str));
        }
        if let Some(extends) = &def.extends {
            if extends == name {
                return Err(DefinitionError::CyclicParent(name.to_owned()));
            }
            let spec = parent(extends).ok_or_else(|| DefinitionError::UnknownParent {
                tool: name.to_owned(),
                parent: extends.clone(),
            })?;
            builder = builder.extends(spec);
        }
        for (attr, option) in &def.options {
            builder = builder.option(option.to_spec(attr));
        }
        Ok(builder.build())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    /// This type's own declaration after defaulting.
    pub fn method(&self) -> MethodDecl {
        self.method
    }

    /// Whether an ancestor (or this type) has fixed the capability set.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Registry entry constructing instances of this type.
    pub fn filter_type(self: &Arc<Self>) -> FilterType {
        let spec = Arc::clone(self);
        FilterType::new(
            self.name(),
            self.type_name(),
            Arc::new(move |kwargs: Kwargs| {
                ExternalTool::new(Arc::clone(&spec), kwargs).map(|t| Box::new(t) as Box<dyn Filter>)
            }),
        )
    }
}

// ============================================================================
// ToolBuilder
// ============================================================================

/// Collects a tool type's declarations, then derives its capabilities.
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    name: Option<String>,
    type_name: String,
    argv: Option<Vec<String>>,
    options: Vec<OptionSpec>,
    method: MethodDecl,
    overrides: Overrides,
    parent: Option<Arc<ToolSpec>>,
}

impl ToolBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            type_name: name.to_owned(),
            argv: None,
            options: Vec::new(),
            method: MethodDecl::Unset,
            overrides: Overrides::default(),
            parent: None,
        }
    }

    /// A type not selectable by name.
    pub fn unnamed(type_name: &str) -> Self {
        Self {
            name: None,
            ..Self::new(type_name)
        }
    }

    pub fn argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    pub fn method(mut self, method: impl Into<MethodDecl>) -> Self {
        self.method = method.into();
        self
    }

    /// Declare an option; replaces an inherited option of the same name.
    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.retain(|o| o.attr != option.attr);
        self.options.push(option);
        self
    }

    pub fn extends(mut self, parent: Arc<ToolSpec>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn override_open(mut self, f: OpenFn) -> Self {
        self.overrides.open = Some(f);
        self
    }

    pub fn override_input(mut self, f: StreamFn) -> Self {
        self.overrides.input = Some(f);
        self
    }

    pub fn override_output(mut self, f: StreamFn) -> Self {
        self.overrides.output = Some(f);
        self
    }

    pub fn build(self) -> Arc<ToolSpec> {
        let declared_argv = self.argv.is_some();
        let method = match self.method {
            MethodDecl::Unset if declared_argv => MethodDecl::Bound(Method::Output),
            other => other,
        };

        let (inherited, locked, overrides, argv, options) = match &self.parent {
            Some(parent) => {
                let mut options = parent.options.clone();
                for option in self.options {
                    options.retain(|o| o.attr != option.attr);
                    options.push(option);
                }
                (
                    parent.capabilities,
                    parent.locked,
                    self.overrides.inherit(&parent.overrides),
                    self.argv.unwrap_or_else(|| parent.argv.clone()),
                    options,
                )
            }
            None => (
                Capabilities::NONE
                    .with(Capability::Open, Slot::Tool)
                    .with(Capability::Input, Slot::Tool)
                    .with(Capability::Output, Slot::Tool),
                false,
                self.overrides,
                self.argv.unwrap_or_default(),
                self.options,
            ),
        };

        let mut capabilities = inherited;
        let locked = if locked {
            true
        } else {
            let keep = match method {
                MethodDecl::Manual => None,
                MethodDecl::Unset => Some(None),
                MethodDecl::Bound(m) => Some(Some(m.capability())),
            };
            if let Some(keep) = keep {
                for capability in Capability::ALL {
                    if Some(capability) != keep {
                        capabilities.set(capability, Slot::Absent);
                    }
                }
            }
            keep.is_some()
        };
        for capability in Capability::ALL {
            if overrides.has(capability) {
                capabilities.set(capability, Slot::Native);
            }
        }

        Arc::new(ToolSpec {
            name: self.name,
            type_name: self.type_name,
            argv,
            options,
            method,
            locked,
            capabilities,
            overrides,
        })
    }
}

// ============================================================================
// Project tools
// ============================================================================

/// Define every `[tools.<name>]` table, parents first.
///
/// `extends` may name another table or a type `known` returns (the stock
/// tools). Definition order does not matter.
pub fn define_tools(
    defs: &BTreeMap<String, ToolDef>,
    known: &dyn Fn(&str) -> Option<Arc<ToolSpec>>,
) -> Result<Vec<Arc<ToolSpec>>, DefinitionError> {
    let mut defined = BTreeMap::new();
    for name in defs.keys() {
        define_one(name, defs, known, &mut defined, &mut Vec::new())?;
    }
    Ok(defined.into_values().collect())
}

fn define_one<'a>(
    name: &'a str,
    defs: &'a BTreeMap<String, ToolDef>,
    known: &dyn Fn(&str) -> Option<Arc<ToolSpec>>,
    defined: &mut BTreeMap<&'a str, Arc<ToolSpec>>,
    stack: &mut Vec<&'a str>,
) -> Result<Arc<ToolSpec>, DefinitionError> {
    if let Some(spec) = defined.get(name) {
        return Ok(Arc::clone(spec));
    }
    if stack.contains(&name) {
        return Err(DefinitionError::CyclicParent(name.to_owned()));
    }
    let Some(def) = defs.get(name) else {
        return Err(DefinitionError::UnknownParent {
            tool: stack.last().copied().unwrap_or(name).to_owned(),
            parent: name.to_owned(),
        });
    };

    stack.push(name);
    let parent = match def.extends.as_deref() {
        Some(parent) if parent == name => None,
        Some(parent) if defs.contains_key(parent) => {
            Some(define_one(parent, defs, known, defined, stack)?)
        }
        Some(parent) => known(parent),
        None => None,
    };
    stack.pop();

    let spec = ToolSpec::from_def(name, def, |_| parent)?;
    defined.insert(name, Arc::clone(&spec));
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(spec: &ToolSpec) -> [Slot; 3] {
        let caps = spec.capabilities();
        [caps.open, caps.input, caps.output]
    }

    fn noop_stream() -> StreamFn {
        Arc::new(
            |_: &ExternalTool,
             _: &mut dyn Read,
             _: &mut dyn Write,
             _: &Kwargs|
             -> Result<(), FilterError> { Ok(()) },
        )
    }

    #[test]
    fn test_method_input() {
        let spec = ToolBuilder::new("f").method(Method::Input).build();
        assert_eq!(slots(&spec), [Slot::Absent, Slot::Tool, Slot::Absent]);
    }

    #[test]
    fn test_method_output() {
        let spec = ToolBuilder::new("f").method(Method::Output).build();
        assert_eq!(slots(&spec), [Slot::Absent, Slot::Absent, Slot::Tool]);
    }

    #[test]
    fn test_method_open() {
        let spec = ToolBuilder::new("f").method(Method::Open).build();
        assert_eq!(slots(&spec), [Slot::Tool, Slot::Absent, Slot::Absent]);
    }

    #[test]
    fn test_method_invalid() {
        assert_eq!(
            "foobar".parse::<MethodDecl>(),
            Err(DefinitionError::InvalidMethod("foobar".into()))
        );
    }

    #[test]
    fn test_no_method() {
        // Neither method nor argv: nothing is generated.
        let spec = ToolBuilder::new("f").build();
        assert_eq!(slots(&spec), [Slot::Absent; 3]);

        // argv without method defaults to output.
        let spec = ToolBuilder::new("f").argv(["app"]).build();
        assert_eq!(slots(&spec), [Slot::Absent, Slot::Absent, Slot::Tool]);
        assert_eq!(spec.method(), MethodDecl::Bound(Method::Output));

        // `none` keeps every slot.
        let spec = ToolBuilder::new("f").method(MethodDecl::Manual).build();
        assert_eq!(slots(&spec), [Slot::Tool; 3]);
        assert!(!spec.is_locked());
    }

    #[test]
    fn test_subclass_keeps_parent_method() {
        let base = ToolBuilder::new("base").method(Method::Open).build();
        let sub = ToolBuilder::new("sub")
            .method(Method::Input)
            .extends(Arc::clone(&base))
            .build();
        assert_eq!(slots(&base), [Slot::Tool, Slot::Absent, Slot::Absent]);
        assert_eq!(slots(&sub), [Slot::Tool, Slot::Absent, Slot::Absent]);
        assert!(sub.is_locked());
    }

    #[test]
    fn test_unlocked_parent_lets_child_choose() {
        let base = ToolBuilder::new("base").method(MethodDecl::Manual).build();
        let sub = ToolBuilder::new("sub")
            .method(Method::Input)
            .extends(base)
            .build();
        assert_eq!(slots(&sub), [Slot::Absent, Slot::Tool, Slot::Absent]);
    }

    #[test]
    fn test_method_no_override() {
        let spec = ToolBuilder::new("f")
            .method(Method::Open)
            .override_input(noop_stream())
            .build();
        assert_eq!(slots(&spec), [Slot::Tool, Slot::Native, Slot::Absent]);

        // Inherited overrides survive a locked child.
        let sub = ToolBuilder::new("g").extends(spec).build();
        assert_eq!(slots(&sub), [Slot::Tool, Slot::Native, Slot::Absent]);
    }

    #[test]
    fn test_inherits_argv_and_options() {
        let base = ToolBuilder::new("base")
            .argv(["{self.binary}", "-"])
            .option(OptionSpec::new("binary", "BASE_BIN"))
            .option(OptionSpec::new("flag", "BASE_FLAG"))
            .build();
        let sub = ToolBuilder::new("sub")
            .option(OptionSpec::new("binary", "SUB_BIN"))
            .extends(base)
            .build();
        assert_eq!(sub.argv(), ["{self.binary}", "-"]);
        let keys: Vec<_> = sub
            .options()
            .iter()
            .map(|o| o.setting_key.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(keys, ["BASE_FLAG", "SUB_BIN"]);
    }

    #[test]
    fn test_from_def() {
        let base = ToolBuilder::new("base").argv(["base"]).build();
        let def = ToolDef {
            method: Some("input".into()),
            extends: Some("base".into()),
            ..ToolDef::default()
        };
        let spec = ToolSpec::from_def("child", &def, |name| {
            (name == "base").then(|| Arc::clone(&base))
        })
        .unwrap();
        // Parent bound `output` through its argv; the child cannot rebind.
        assert_eq!(slots(&spec), [Slot::Absent, Slot::Absent, Slot::Tool]);
        assert_eq!(spec.argv(), ["base"]);

        let err = ToolSpec::from_def("child", &def, |_| None).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownParent { .. }));

        let cyclic = ToolDef {
            extends: Some("me".into()),
            ..ToolDef::default()
        };
        assert_eq!(
            ToolSpec::from_def("me", &cyclic, |_| None).unwrap_err(),
            DefinitionError::CyclicParent("me".into())
        );

        let bad = ToolDef {
            method: Some("foobar".into()),
            argv: Some(vec!["x".into()]),
            ..ToolDef::default()
        };
        assert!(ToolSpec::from_def("bad", &bad, |_| None).is_err());
    }

    fn tool(argv: Option<&str>, extends: Option<&str>) -> ToolDef {
        ToolDef {
            argv: argv.map(|a| vec![a.to_owned()]),
            extends: extends.map(str::to_owned),
            ..ToolDef::default()
        }
    }

    #[test]
    fn test_define_tools_resolves_parents() {
        let mut defs = BTreeMap::new();
        // Child sorts before its parent.
        defs.insert("a-child".to_owned(), tool(None, Some("z-parent")));
        defs.insert("z-parent".to_owned(), tool(Some("parent-bin"), None));
        defs.insert("on-stock".to_owned(), tool(None, Some("stock")));

        let stock = ToolBuilder::new("stock").argv(["stock-bin"]).build();
        let known = |name: &str| (name == "stock").then(|| Arc::clone(&stock));
        let specs = define_tools(&defs, &known).unwrap();

        let argv_of = |name: &str| {
            specs
                .iter()
                .find(|s| s.name() == Some(name))
                .map(|s| s.argv().to_vec())
                .unwrap()
        };
        assert_eq!(specs.len(), 3);
        assert_eq!(argv_of("a-child"), ["parent-bin"]);
        assert_eq!(argv_of("on-stock"), ["stock-bin"]);
    }

    #[test]
    fn test_define_tools_errors() {
        let none = |_: &str| -> Option<Arc<ToolSpec>> { None };

        let mut defs = BTreeMap::new();
        defs.insert("a".to_owned(), tool(None, Some("b")));
        defs.insert("b".to_owned(), tool(None, Some("a")));
        assert!(matches!(
            define_tools(&defs, &none),
            Err(DefinitionError::CyclicParent(_))
        ));

        let mut defs = BTreeMap::new();
        defs.insert("a".to_owned(), tool(None, Some("missing")));
        assert_eq!(
            define_tools(&defs, &none).unwrap_err(),
            DefinitionError::UnknownParent {
                tool: "a".into(),
                parent: "missing".into()
            }
        );
    }
}
