//! Configuration: the settings store, layered lookup, option declarations
//! and the `assetflow.toml` project file.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error      # ConfigError, ConfigDiagnostics
//! ├── option     # OptionSpec, Options, OptionDef
//! ├── resolve    # get_config, Lookup, smartsplit
//! ├── section    # [tools] and [[bundles]]
//! ├── settings   # Settings, EnvSource
//! ├── value      # Value
//! └── mod.rs     # ProjectConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section          | Purpose                                         |
//! |------------------|-------------------------------------------------|
//! | top level        | `debug`, `url`, `cache` context flags           |
//! | `[settings]`     | Settings store read by filters                  |
//! | `[tools.<name>]` | External tools registered as filters            |
//! | `[[bundles]]`    | Sources, output and filter chain per bundle     |

mod error;
mod option;
mod resolve;
mod section;
mod settings;
mod value;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use option::{Kwargs, OptionDef, OptionError, OptionSpec, Options, SourceName};
pub use resolve::{Lookup, ValueKind, get_config, smartsplit};
pub use section::{BundleDef, FilterRef, ToolDef};
pub use settings::{EnvSource, MapEnv, ProcessEnv, Settings};
pub use value::Value;

use crate::log;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name.
pub const CONFIG_FILE: &str = "assetflow.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing assetflow.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Debug builds; individual filters may skip work.
    pub debug: bool,

    /// Base URL output is served from.
    pub url: Option<String>,

    /// Whether the caller caches filter results.
    pub cache: bool,

    /// Settings store consulted by filters.
    pub settings: BTreeMap<String, Value>,

    /// User-declared external tools.
    pub tools: BTreeMap<String, ToolDef>,

    /// Bundle definitions.
    pub bundles: Vec<BundleDef>,
}

impl ProjectConfig {
    /// Load `assetflow.toml`, searching upward from the working directory.
    ///
    /// Without a config file, returns defaults rooted at the working directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|err| ConfigError::Io(PathBuf::from("."), err))?;
        let path = match explicit {
            Some(path) => Some(cwd.join(path)),
            None => find_config_file(&cwd, Path::new(CONFIG_FILE)),
        };

        let Some(path) = path else {
            let mut config = Self::default();
            config.root = cwd;
            return Ok(config);
        };

        let mut config = Self::from_path(&path)?;
        config.root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
        config.config_path = path;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let (config, _) = Self::parse_with_ignored(content)
            .map_err(|err| ConfigError::Toml(PathBuf::from(CONFIG_FILE), err))?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .map_err(|err| ConfigError::Toml(path.to_path_buf(), err))?;

        if !ignored.is_empty() {
            log!("warning"; "unknown fields in {}, ignoring:", path.display());
            for field in &ignored {
                eprintln!("- {field}");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Check tools and bundles, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        for (name, tool) in &self.tools {
            tool.validate(name, &mut diag);
        }

        let mut seen = rustc_hash::FxHashSet::default();
        for (i, bundle) in self.bundles.iter().enumerate() {
            bundle.validate(i, &mut diag);
            if !seen.insert(bundle.name.as_str()) {
                diag.error(
                    format!("bundles[{i}].name"),
                    format!("duplicate bundle name `{}`", bundle.name),
                );
            }
        }

        diag.into_result()
    }

    /// The `[settings]` table as a settings store.
    pub fn settings(&self) -> Settings {
        self.settings.iter().map(|(k, v)| (k, v.clone())).collect()
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    pub fn bundle(&self, name: &str) -> Option<&BundleDef> {
        self.bundles.iter().find(|b| b.name == name)
    }
}

/// Find config file by searching upward from `start`
///
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/site/assets/css/     ← cwd
/// /home/user/site/assetflow.toml  ← found!
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.exists())
}

#[cfg(test)]
pub(crate) fn test_parse_config(content: &str) -> ProjectConfig {
    ProjectConfig::from_str(content).expect("test config should parse")
}
