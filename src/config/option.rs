//! Declared filter options and their resolved values.
//!
//! Each option is an explicit record instead of a tuple whose shape decides
//! its meaning:
//!
//! | Constructor                         | keyword      | settings / env |
//! |-------------------------------------|--------------|----------------|
//! | `OptionSpec::new("attr1", "ATTR1")` | `attr1`      | `ATTR1`        |
//! | `.init_arg("secondattr")`           | `secondattr` | unchanged      |
//! | `.no_init_arg()`                    | rejected     | unchanged      |
//! | `OptionSpec::init_only("attr4")`    | `attr4`      | never read     |
//!
//! The two directions are independent: a settings-only option rejects the
//! keyword at construction, an init-only option ignores the settings store
//! even when a matching key exists.

use super::{ConfigError, EnvSource, Lookup, Settings, Value, ValueKind, get_config};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Keyword arguments given when constructing a filter.
pub type Kwargs = BTreeMap<String, Value>;

/// Rejected constructor keywords.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("got an unexpected keyword argument `{0}`")]
    Unexpected(String),

    #[error("option `{attr}` cannot be given as a keyword argument (settings only)")]
    NotAnInitArg { attr: String },
}

// ============================================================================
// OptionSpec
// ============================================================================

/// Declaration of a single filter option.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionSpec {
    /// Attribute name the option is stored under (`self.<attr>` in argv).
    pub attr: String,
    /// Keyword accepted at construction.
    pub init_key: String,
    /// Settings store key.
    pub setting_key: Option<String>,
    /// Environment variable name.
    pub env_key: Option<String>,
    /// Whether the keyword is accepted at construction.
    pub init_allowed: bool,
    /// Whether `setup()` reads settings/environment for this option.
    pub settings_allowed: bool,
    /// Coercion applied to environment strings.
    pub kind: ValueKind,
    /// Used when no source yields a value.
    pub default: Option<Value>,
}

impl OptionSpec {
    /// Option `attr`, read from the `key` setting and `key` env var.
    pub fn new(attr: &str, key: &str) -> Self {
        Self {
            attr: attr.to_owned(),
            init_key: attr.to_owned(),
            setting_key: Some(key.to_owned()),
            env_key: Some(key.to_owned()),
            init_allowed: true,
            settings_allowed: true,
            kind: ValueKind::Scalar,
            default: None,
        }
    }

    /// Option only settable through the constructor.
    pub fn init_only(attr: &str) -> Self {
        Self {
            setting_key: None,
            env_key: None,
            settings_allowed: false,
            ..Self::new(attr, attr)
        }
    }

    /// Accept the constructor keyword under a different name.
    pub fn init_arg(mut self, key: &str) -> Self {
        self.init_key = key.to_owned();
        self.init_allowed = true;
        self
    }

    /// Reject the constructor keyword; settings/environment only.
    pub fn no_init_arg(mut self) -> Self {
        self.init_allowed = false;
        self
    }

    /// Read a different environment variable; `None` disables it.
    pub fn env(mut self, name: Option<&str>) -> Self {
        self.env_key = name.map(str::to_owned);
        self
    }

    /// Split environment strings into a list.
    pub fn list(mut self) -> Self {
        self.kind = ValueKind::List;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn lookup(&self) -> Option<Lookup<'_>> {
        if !self.settings_allowed {
            return None;
        }
        let setting = self.setting_key.as_deref();
        let env = self.env_key.as_deref();
        let name = setting.or(env)?;
        Some(
            Lookup::new(name)
                .setting(setting)
                .env(env)
                .kind(self.kind)
                .optional(),
        )
    }
}

// ============================================================================
// OptionDef (declared in assetflow.toml)
// ============================================================================

/// An option as written in a `[tools.<name>.options.<attr>]` table.
///
/// ```toml
/// [tools.postcss.options.config]
/// setting = "POSTCSS_CONFIG"   # also the env var unless `env` is given
/// env = false                  # settings only
/// init = "config_file"         # keyword name, or false to reject it
/// default = "postcss.config.js"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionDef {
    pub setting: Option<SourceName>,
    pub env: Option<SourceName>,
    pub init: Option<SourceName>,
    pub list: bool,
    pub default: Option<Value>,
}

/// A source name or `false` to disable that source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceName {
    Name(String),
    Enabled(bool),
}

impl OptionDef {
    /// Turn the table into an `OptionSpec` for attribute `attr`.
    ///
    /// Unset `setting` defaults to the upper-cased attribute name; unset
    /// `env` follows `setting`.
    pub fn to_spec(&self, attr: &str) -> OptionSpec {
        let upper = attr.to_ascii_uppercase();
        let setting = match &self.setting {
            None | Some(SourceName::Enabled(true)) => Some(upper),
            Some(SourceName::Enabled(false)) => None,
            Some(SourceName::Name(name)) => Some(name.clone()),
        };
        let env = match &self.env {
            None | Some(SourceName::Enabled(true)) => setting.clone(),
            Some(SourceName::Enabled(false)) => None,
            Some(SourceName::Name(name)) => Some(name.clone()),
        };

        let mut spec = OptionSpec::new(attr, attr);
        spec.settings_allowed = setting.is_some() || env.is_some();
        spec.setting_key = setting;
        spec.env_key = env;
        match &self.init {
            None | Some(SourceName::Enabled(true)) => {}
            Some(SourceName::Enabled(false)) => spec = spec.no_init_arg(),
            Some(SourceName::Name(name)) => spec = spec.init_arg(name),
        }
        if self.list {
            spec = spec.list();
        }
        spec.default = self.default.clone();
        spec
    }
}

// ============================================================================
// Options
// ============================================================================

/// Resolved option values of one filter instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Options {
    schema: Vec<OptionSpec>,
    values: BTreeMap<String, Value>,
}

impl Options {
    /// Validate constructor keywords against `schema`.
    ///
    /// Options not given stay unset until `resolve` runs.
    pub fn from_kwargs(schema: &[OptionSpec], mut kwargs: Kwargs) -> Result<Self, OptionError> {
        let mut values = BTreeMap::new();
        for spec in schema {
            if !spec.init_allowed {
                continue;
            }
            if let Some(value) = kwargs.remove(&spec.init_key) {
                values.insert(spec.attr.clone(), value);
            }
        }

        if let Some(key) = kwargs.into_keys().next() {
            return match schema.iter().find(|s| s.attr == key && !s.init_allowed) {
                Some(spec) => Err(OptionError::NotAnInitArg {
                    attr: spec.attr.clone(),
                }),
                None => Err(OptionError::Unexpected(key)),
            };
        }

        Ok(Self {
            schema: schema.to_vec(),
            values,
        })
    }

    /// Fill options still unset from settings/environment, then defaults.
    pub fn resolve(&mut self, settings: &Settings, env: &dyn EnvSource) -> Result<(), ConfigError> {
        for spec in &self.schema {
            if self.values.contains_key(&spec.attr) {
                continue;
            }
            let found = match spec.lookup() {
                Some(lookup) => get_config(settings, env, &lookup)?,
                None => None,
            };
            if let Some(value) = found.or_else(|| spec.default.clone()) {
                self.values.insert(spec.attr.clone(), value);
            }
        }
        Ok(())
    }

    pub fn schema(&self) -> &[OptionSpec] {
        &self.schema
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.values.get(attr)
    }

    pub fn get_str(&self, attr: &str) -> Option<&str> {
        self.get(attr).and_then(Value::as_str)
    }

    pub fn get_bool(&self, attr: &str) -> Option<bool> {
        self.get(attr).and_then(Value::as_bool)
    }

    pub fn get_list(&self, attr: &str) -> Vec<String> {
        self.get(attr).map(Value::to_string_list).unwrap_or_default()
    }

    pub fn set(&mut self, attr: &str, value: impl Into<Value>) {
        self.values.insert(attr.to_owned(), value.into());
    }

    /// All resolved values, keyed by attribute.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// The resolved values as one map value (used for uniqueness tokens).
    pub fn to_value(&self) -> Value {
        Value::Map(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnv;

    fn schema() -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("attr1", "ATTR1"),
            OptionSpec::new("attr2", "ATTR2").init_arg("secondattr"),
            OptionSpec::new("attr3", "ATTR3").no_init_arg(),
            OptionSpec::init_only("attr4"),
        ]
    }

    fn kwargs(pairs: &[(&str, &str)]) -> Kwargs {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_init_arguments() {
        let opts = Options::from_kwargs(&schema(), kwargs(&[("attr1", "foo")])).unwrap();
        assert_eq!(opts.get_str("attr1"), Some("foo"));

        let opts = Options::from_kwargs(&schema(), kwargs(&[("secondattr", "foo")])).unwrap();
        assert_eq!(opts.get_str("attr2"), Some("foo"));

        let err = Options::from_kwargs(&schema(), kwargs(&[("attr3", "foo")])).unwrap_err();
        assert_eq!(
            err,
            OptionError::NotAnInitArg {
                attr: "attr3".into()
            }
        );

        let opts = Options::from_kwargs(&schema(), kwargs(&[("attr4", "foo")])).unwrap();
        assert_eq!(opts.get_str("attr4"), Some("foo"));
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let err = Options::from_kwargs(&schema(), kwargs(&[("nope", "x")])).unwrap_err();
        assert_eq!(err, OptionError::Unexpected("nope".into()));

        // attr2 is only reachable through its renamed keyword.
        let err = Options::from_kwargs(&schema(), kwargs(&[("attr2", "x")])).unwrap_err();
        assert_eq!(err, OptionError::Unexpected("attr2".into()));
    }

    #[test]
    fn test_resolve_from_settings() {
        let mut settings = Settings::new();
        settings.set("attr1", "bar");
        settings.set("attr4", "bar");

        let mut opts = Options::from_kwargs(&schema(), Kwargs::new()).unwrap();
        opts.resolve(&settings, &MapEnv::new()).unwrap();

        assert_eq!(opts.get_str("attr1"), Some("bar"));
        // Init-only options never look at settings.
        assert_eq!(opts.get("attr4"), None);
    }

    #[test]
    fn test_resolve_keeps_init_values() {
        let mut settings = Settings::new();
        settings.set("ATTR1", "from-settings");

        let mut opts = Options::from_kwargs(&schema(), kwargs(&[("attr1", "given")])).unwrap();
        opts.resolve(&settings, &MapEnv::new()).unwrap();
        assert_eq!(opts.get_str("attr1"), Some("given"));
    }

    #[test]
    fn test_resolve_env_list_and_default() {
        let schema = vec![
            OptionSpec::new("args", "TOOL_ARGS").list(),
            OptionSpec::new("binary", "TOOL_BIN").default_value("tool"),
        ];
        let env: MapEnv = [("TOOL_ARGS", "-a,-b")].into_iter().collect();

        let mut opts = Options::from_kwargs(&schema, Kwargs::new()).unwrap();
        opts.resolve(&Settings::new(), &env).unwrap();
        assert_eq!(opts.get_list("args"), vec!["-a", "-b"]);
        assert_eq!(opts.get_str("binary"), Some("tool"));
    }

    #[test]
    fn test_option_def_to_spec() {
        #[derive(Deserialize)]
        struct Doc {
            options: BTreeMap<String, OptionDef>,
        }
        let doc: Doc = toml::from_str(
            r#"
[options.config]
env = false
init = "config_file"
default = "postcss.config.js"

[options.browsers]
setting = "AUTOPREFIXER_BROWSERS"
list = true

[options.secret]
init = false
"#,
        )
        .unwrap();

        let config = doc.options["config"].to_spec("config");
        assert_eq!(config.setting_key.as_deref(), Some("CONFIG"));
        assert_eq!(config.env_key, None);
        assert_eq!(config.init_key, "config_file");
        assert_eq!(config.default, Some(Value::from("postcss.config.js")));

        let browsers = doc.options["browsers"].to_spec("browsers");
        assert_eq!(browsers.env_key.as_deref(), Some("AUTOPREFIXER_BROWSERS"));
        assert_eq!(browsers.kind, ValueKind::List);

        let secret = doc.options["secret"].to_spec("secret");
        assert!(!secret.init_allowed);
        assert!(secret.settings_allowed);
    }
}
