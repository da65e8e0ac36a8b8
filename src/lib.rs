//! assetflow - a filter engine for static asset bundles.
//!
//! Filters transform asset content at three points of a bundle build
//! (`open`, `input`, `output`). They are either in-process Rust code or
//! external executables described by an argv template. A [`FilterChain`]
//! runs a bundle's sources through an ordered list of filters.
//!
//! ```ignore
//! use assetflow::chain::FilterChain;
//! use assetflow::filter::{Context, get_filter};
//!
//! let mut chain = FilterChain::new();
//! chain.push(get_filter("scss", Default::default())?, false)?;
//! chain.push(get_filter("cssmin", Default::default())?, false)?;
//! chain.prepare(&Arc::new(Context::new(".")))?;
//! chain.apply(&ctx, &sources, None, &mut std::io::stdout())?;
//! ```

pub mod logger;

pub mod builtin;
pub mod chain;
pub mod config;
pub mod external;
pub mod filter;
pub mod utils;

pub use chain::FilterChain;
pub use config::{ConfigError, ProjectConfig};
pub use external::{ExternalTool, ToolSpec};
pub use filter::{Filter, FilterError, get_filter, register_filter};
