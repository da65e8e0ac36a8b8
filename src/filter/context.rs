//! Build context filters are bound to before use.

use crate::config::{
    ConfigError, EnvSource, Lookup, ProcessEnv, ProjectConfig, Settings, Value, get_config,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings, environment and build flags shared by the filters of one build.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub env: Arc<dyn EnvSource>,
    /// Debug build; concrete filters may skip work.
    pub debug: bool,
    /// Base URL the output is served from.
    pub url: Option<String>,
    /// Whether the caller caches filter results.
    pub cache: bool,
    /// Directory relative resource paths resolve against.
    pub root: PathBuf,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            settings: Settings::new(),
            env: Arc::new(ProcessEnv),
            debug: false,
            url: None,
            cache: false,
            root: PathBuf::new(),
        }
    }
}

impl Context {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Context for a loaded project file.
    pub fn from_project(config: &ProjectConfig) -> Self {
        Self {
            settings: config.settings(),
            env: Arc::new(ProcessEnv),
            debug: config.debug,
            url: config.url.clone(),
            cache: config.cache,
            root: config.root.clone(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Resolve a configuration value in this context.
    pub fn get_config(&self, lookup: &Lookup<'_>) -> Result<Option<Value>, ConfigError> {
        get_config(&self.settings, self.env.as_ref(), lookup)
    }

    /// Resolve `path` against the context root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
