//! Command-line interface module.

mod args;
pub mod build;
pub mod list;
pub mod run;

pub use args::{Cli, Commands, RunArgs};

use anyhow::{Context as _, Result};
use assetflow::builtin::tools;
use assetflow::config::ProjectConfig;
use assetflow::external::define_tools;
use assetflow::filter::{Context, Registry, registry};
use assetflow::{debug, log};
use std::sync::Arc;

/// A loaded project: its config file and the context filters bind to.
pub struct Project {
    pub config: ProjectConfig,
    pub ctx: Arc<Context>,
}

impl Project {
    /// Load the config file and register its tools in the global registry.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = ProjectConfig::load(cli.config.as_deref())?;
        if config.config_path.as_os_str().is_empty() {
            debug!("config"; "no config file, using {}", config.root.display());
        } else {
            debug!("config"; "loaded {}", config.config_path.display());
        }

        register_tools(&config, registry())?;
        let ctx = Arc::new(Context::from_project(&config));
        Ok(Self { config, ctx })
    }
}

/// Register the `[tools]` section. A tool may extend a stock tool.
fn register_tools(config: &ProjectConfig, registry: &Registry) -> Result<()> {
    let specs = define_tools(&config.tools, &tools::find)
        .with_context(|| format!("invalid [tools] in {}", config.config_path.display()))?;
    for spec in specs {
        let name = spec.name().unwrap_or_default().to_owned();
        if registry.contains(&name) {
            log!("config"; "tool `{}` replaces a registered filter", name);
        }
        registry.register(spec.filter_type())?;
    }
    Ok(())
}
