//! Plain functions used as output filters.

use super::{Capabilities, Capability, Filter, FilterBase, FilterError, Slot};
use crate::config::{Kwargs, Value};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// A bare transformation function.
pub type CallableFn =
    Arc<dyn Fn(&mut dyn Read, &mut dyn Write) -> Result<(), FilterError> + Send + Sync>;

/// Adapter exposing a function as an `output` filter.
///
/// The function gets no keyword arguments. Two adapters are equal when they
/// wrap the same function object.
pub struct CallableFilter {
    base: FilterBase,
    func: CallableFn,
}

impl CallableFilter {
    pub fn new(func: CallableFn) -> Self {
        Self {
            base: FilterBase::default(),
            func,
        }
    }
}

impl fmt::Debug for CallableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableFilter")
            .field("func", &Arc::as_ptr(&self.func).cast::<()>())
            .finish()
    }
}

impl Filter for CallableFilter {
    fn name(&self) -> Option<&str> {
        None
    }

    fn type_name(&self) -> &str {
        "callable"
    }

    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::only(Capability::Output, Slot::Native)
    }

    fn output(
        &self,
        input: &mut dyn Read,
        out: &mut dyn Write,
        _kw: &Kwargs,
    ) -> Result<(), FilterError> {
        (self.func)(input, out)
    }

    fn unique(&self) -> Value {
        #[allow(clippy::cast_possible_wrap)]
        let addr = Arc::as_ptr(&self.func).cast::<()>() as usize as i64;
        Value::Int(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper() -> CallableFn {
        Arc::new(|input: &mut dyn Read, out: &mut dyn Write| -> Result<(), FilterError> {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            out.write_all(text.to_uppercase().as_bytes())?;
            Ok(())
        })
    }

    #[test]
    fn test_callable_runs_as_output() {
        let filter = CallableFilter::new(upper());
        assert!(filter.capabilities().has(Capability::Output));
        assert!(!filter.capabilities().has(Capability::Input));

        let mut out = Vec::<u8>::new();
        filter
            .output(&mut &b"initial value"[..], &mut out, &Kwargs::new())
            .unwrap();
        assert_eq!(out, b"INITIAL VALUE");
    }

    #[test]
    fn test_callable_identity() {
        let func = upper();
        let a = CallableFilter::new(Arc::clone(&func));
        let b = CallableFilter::new(func);
        let c = CallableFilter::new(upper());
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}
