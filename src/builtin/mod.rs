//! Filters available without any configuration.

mod minify;
pub mod tools;

pub use minify::{CssMin, JsMin, minify_css, minify_js};

use crate::filter::{FilterType, Registry};

/// Register every builtin filter in `registry`.
pub fn register_all(registry: &Registry) {
    let types = [FilterType::of::<CssMin>(), FilterType::of::<JsMin>()]
        .into_iter()
        .chain(tools::all().into_iter().map(|spec| spec.filter_type()));

    for ty in types {
        if let Err(err) = registry.register(ty) {
            crate::log!("error"; "builtin filter: {}", err);
        }
    }
}
