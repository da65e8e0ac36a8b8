//! Name → filter type registry and filter spec resolution.
//!
//! The process-wide registry is created lazily, pre-seeded with the builtin
//! filters. Lookups take a read lock; registration takes the write lock, and
//! the last registration of a name wins. Tests build isolated registries
//! with [`Registry::new`] or [`Registry::with_builtins`].

use super::{CallableFilter, CallableFn, Filter, FilterError, SpecError};
use crate::config::Kwargs;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Builds a filter instance from constructor keywords.
pub type Constructor = Arc<dyn Fn(Kwargs) -> Result<Box<dyn Filter>, FilterError> + Send + Sync>;

// ============================================================================
// FilterType
// ============================================================================

/// A filter type with a compile-time name, constructible from keywords.
pub trait FilterClass: Filter + Sized + 'static {
    /// Registered name; `None` for types not selectable by name.
    const NAME: Option<&'static str>;

    fn create(kwargs: Kwargs) -> Result<Self, FilterError>;
}

/// A filter type as stored in the registry.
#[derive(Clone)]
pub struct FilterType {
    name: Option<String>,
    type_name: String,
    ctor: Constructor,
}

impl FilterType {
    pub fn new(name: Option<&str>, type_name: &str, ctor: Constructor) -> Self {
        Self {
            name: name.map(str::to_owned),
            type_name: type_name.to_owned(),
            ctor,
        }
    }

    /// The filter type of `F`.
    pub fn of<F: FilterClass>() -> Self {
        Self::new(
            F::NAME,
            std::any::type_name::<F>(),
            Arc::new(|kwargs| F::create(kwargs).map(|f| Box::new(f) as Box<dyn Filter>)),
        )
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Construct an instance; keywords are validated by the filter.
    pub fn instantiate(&self, kwargs: Kwargs) -> Result<Box<dyn Filter>, FilterError> {
        (self.ctor)(kwargs)
    }
}

impl fmt::Debug for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterType")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FilterSpec
// ============================================================================

/// Everything a filter can be specified as.
pub enum FilterSpec {
    /// A registered name.
    Name(String),
    /// A filter type, instantiated with the given keywords.
    Type(FilterType),
    /// A ready instance, used as is.
    Instance(Box<dyn Filter>),
    /// A bare function, wrapped as an output filter.
    Callable(CallableFn),
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpec::Name(name) => f.debug_tuple("Name").field(name).finish(),
            FilterSpec::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
            FilterSpec::Instance(filter) => f.debug_tuple("Instance").field(filter).finish(),
            FilterSpec::Callable(_) => f.write_str("Callable"),
        }
    }
}

impl From<&str> for FilterSpec {
    fn from(name: &str) -> Self {
        FilterSpec::Name(name.to_owned())
    }
}

impl From<String> for FilterSpec {
    fn from(name: String) -> Self {
        FilterSpec::Name(name)
    }
}

impl From<FilterType> for FilterSpec {
    fn from(ty: FilterType) -> Self {
        FilterSpec::Type(ty)
    }
}

impl From<Box<dyn Filter>> for FilterSpec {
    fn from(filter: Box<dyn Filter>) -> Self {
        FilterSpec::Instance(filter)
    }
}

impl From<CallableFn> for FilterSpec {
    fn from(func: CallableFn) -> Self {
        FilterSpec::Callable(func)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Mapping from filter name to filter type.
#[derive(Default)]
pub struct Registry {
    filters: RwLock<FxHashMap<String, FilterType>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the builtin filters.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtin::register_all(&registry);
        registry
    }

    /// Install `ty` under its name, replacing any previous registration.
    pub fn register(&self, ty: FilterType) -> Result<(), SpecError> {
        let name = match ty.name() {
            Some(name) if !name.trim().is_empty() => name.to_owned(),
            _ => return Err(SpecError::Unnamed(ty.type_name().to_owned())),
        };
        if let Some(previous) = self.filters.write().insert(name.clone(), ty) {
            crate::debug!("registry"; "`{}` replaces {}", name, previous.type_name());
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<FilterType> {
        self.filters.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.filters.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Resolve a filter spec into an instance.
    ///
    /// Keywords are passed to the constructor. They are rejected for
    /// instances and callables, which cannot be re-parameterized.
    pub fn get_filter(
        &self,
        spec: impl Into<FilterSpec>,
        kwargs: Kwargs,
    ) -> Result<Box<dyn Filter>, FilterError> {
        match spec.into() {
            FilterSpec::Name(name) => {
                let ty = self
                    .lookup(&name)
                    .ok_or(SpecError::UnknownFilter(name))?;
                ty.instantiate(kwargs)
            }
            FilterSpec::Type(ty) => ty.instantiate(kwargs),
            FilterSpec::Instance(filter) => {
                if !kwargs.is_empty() {
                    return Err(SpecError::InstanceWithOptions.into());
                }
                Ok(filter)
            }
            FilterSpec::Callable(func) => {
                if !kwargs.is_empty() {
                    return Err(SpecError::CallableWithOptions.into());
                }
                Ok(Box::new(CallableFilter::new(func)))
            }
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("filters", &self.names())
            .finish()
    }
}

/// Global registry instance.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::with_builtins);

/// The process-wide registry.
#[inline]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Register a filter type in the process-wide registry.
#[inline]
pub fn register_filter(ty: FilterType) -> Result<(), SpecError> {
    registry().register(ty)
}

/// Resolve a filter spec against the process-wide registry.
#[inline]
pub fn get_filter(
    spec: impl Into<FilterSpec>,
    kwargs: Kwargs,
) -> Result<Box<dyn Filter>, FilterError> {
    registry().get_filter(spec, kwargs)
}
