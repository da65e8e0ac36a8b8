//! The filter contract.
//!
//! A filter can intercept content at three points of a bundle build:
//!
//! | Capability | Signature                    | Runs                            |
//! |------------|------------------------------|---------------------------------|
//! | `open`     | `open(out, source, kw)`      | instead of reading a source     |
//! | `input`    | `input(in, out, kw)`         | per source, before concatenation|
//! | `output`   | `output(in, out, kw)`        | once, after concatenation       |
//!
//! Which of them a filter implements is reported by [`Filter::capabilities`],
//! so callers check before calling. Calling an unimplemented capability
//! returns [`FilterError::Unsupported`].
//!
//! Lifecycle: construct (options validated) → `set_context` → `setup`
//! (options not given at construction are read from settings/environment)
//! → any number of capability calls.

mod callable;
mod context;
mod error;
pub mod registry;

pub use callable::{CallableFilter, CallableFn};
pub use context::Context;
pub use error::{DefinitionError, FilterError, SpecError, TemplateError};
pub use registry::{
    FilterClass, FilterSpec, FilterType, Registry, get_filter, register_filter, registry,
};

use crate::config::{Kwargs, Lookup, OptionSpec, Options, Value};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Capabilities
// ============================================================================

/// One of the three interception points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Open,
    Input,
    Output,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Open, Capability::Input, Capability::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Open => "open",
            Capability::Input => "input",
            Capability::Output => "output",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a capability is provided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Not implemented.
    #[default]
    Absent,
    /// Implemented by the filter's own code.
    Native,
    /// Synthesized from an external tool's argv template.
    Tool,
}

impl Slot {
    pub fn is_present(self) -> bool {
        self != Slot::Absent
    }
}

/// Which capabilities a filter implements, and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub open: Slot,
    pub input: Slot,
    pub output: Slot,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        open: Slot::Absent,
        input: Slot::Absent,
        output: Slot::Absent,
    };

    /// A single capability provided by `slot`, the others absent.
    pub fn only(capability: Capability, slot: Slot) -> Self {
        Self::NONE.with(capability, slot)
    }

    pub fn with(mut self, capability: Capability, slot: Slot) -> Self {
        self.set(capability, slot);
        self
    }

    pub fn get(&self, capability: Capability) -> Slot {
        match capability {
            Capability::Open => self.open,
            Capability::Input => self.input,
            Capability::Output => self.output,
        }
    }

    pub fn set(&mut self, capability: Capability, slot: Slot) {
        match capability {
            Capability::Open => self.open = slot,
            Capability::Input => self.input = slot,
            Capability::Output => self.output = slot,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.get(capability).is_present()
    }

    /// Implemented capabilities, in `open`, `input`, `output` order.
    pub fn present(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.has(*c))
    }
}

// ============================================================================
// Identity
// ============================================================================

/// What a cache compares filters by: their kind plus their `unique()` token.
///
/// The kind is the registered name, or the type name for unnamed filters,
/// so instances of different types only compare equal when they share a
/// name and a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FilterId {
    pub kind: String,
    pub token: Value,
}

// ============================================================================
// FilterBase
// ============================================================================

/// State every filter carries: its options and the bound context.
#[derive(Debug, Clone, Default)]
pub struct FilterBase {
    ctx: Option<Arc<Context>>,
    options: Options,
}

impl FilterBase {
    /// Validate constructor keywords against the option schema.
    pub fn new(schema: &[OptionSpec], kwargs: Kwargs) -> Result<Self, FilterError> {
        Ok(Self {
            ctx: None,
            options: Options::from_kwargs(schema, kwargs)?,
        })
    }

    /// A base with no options; any keyword is rejected.
    pub fn empty(kwargs: Kwargs) -> Result<Self, FilterError> {
        Self::new(&[], kwargs)
    }

    pub fn bind(&mut self, ctx: Arc<Context>) {
        self.ctx = Some(ctx);
    }

    pub fn ctx(&self) -> Option<&Context> {
        self.ctx.as_deref()
    }

    /// Pull unset options from the bound context.
    ///
    /// Unbound filters only get their declared defaults.
    pub fn setup(&mut self) -> Result<(), FilterError> {
        let ctx = self.ctx.clone().unwrap_or_default();
        self.options.resolve(&ctx.settings, ctx.env.as_ref())?;
        Ok(())
    }

    /// Look up a configuration value through the bound context.
    pub fn get_config(&self, filter: &str, lookup: &Lookup<'_>) -> Result<Option<Value>, FilterError> {
        let ctx = self
            .ctx()
            .ok_or_else(|| FilterError::Unbound(filter.to_owned()))?;
        ctx.get_config(lookup).map_err(FilterError::from)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }
}

// ============================================================================
// Filter
// ============================================================================

/// A named, configurable content transformation.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Registered name; `None` means not selectable by name.
    fn name(&self) -> Option<&str>;

    /// Name of the implementing type.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn base(&self) -> &FilterBase;

    fn base_mut(&mut self) -> &mut FilterBase;

    fn capabilities(&self) -> Capabilities;

    fn set_context(&mut self, ctx: Arc<Context>) {
        self.base_mut().bind(ctx);
    }

    fn setup(&mut self) -> Result<(), FilterError> {
        self.base_mut().setup()
    }

    fn open(&self, _out: &mut dyn Write, _source: &Path, _kw: &Kwargs) -> Result<(), FilterError> {
        Err(self.unsupported(Capability::Open))
    }

    fn input(
        &self,
        _input: &mut dyn Read,
        _out: &mut dyn Write,
        _kw: &Kwargs,
    ) -> Result<(), FilterError> {
        Err(self.unsupported(Capability::Input))
    }

    fn output(
        &self,
        _input: &mut dyn Read,
        _out: &mut dyn Write,
        _kw: &Kwargs,
    ) -> Result<(), FilterError> {
        Err(self.unsupported(Capability::Output))
    }

    /// The part of this filter's state that affects its output.
    fn unique(&self) -> Value {
        Value::Null
    }

    fn id(&self) -> FilterId {
        FilterId {
            kind: self.display_name().to_owned(),
            token: self.unique(),
        }
    }

    /// Name for messages: the registered name, else the type name.
    fn display_name(&self) -> &str {
        self.name().unwrap_or_else(|| self.type_name())
    }

    fn get_config(&self, lookup: &Lookup<'_>) -> Result<Option<Value>, FilterError> {
        self.base().get_config(self.display_name(), lookup)
    }

    fn options(&self) -> &Options {
        self.base().options()
    }

    fn unsupported(&self, capability: Capability) -> FilterError {
        FilterError::Unsupported {
            filter: self.display_name().to_owned(),
            capability,
        }
    }
}

impl PartialEq for dyn Filter + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn Filter + '_ {}

/// Bind `filter` to `ctx` and run its setup.
pub fn prepare(filter: &mut dyn Filter, ctx: Arc<Context>) -> Result<(), FilterError> {
    filter.set_context(ctx);
    filter.setup()
}
