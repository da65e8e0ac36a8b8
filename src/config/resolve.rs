//! Layered configuration lookup: settings store first, environment second.
//!
//! | Lookup                              | settings key | env var |
//! |-------------------------------------|--------------|---------|
//! | `Lookup::new("X")`                  | `X`          | `X`     |
//! | `Lookup::new("X").env(Some("Y"))`   | `X`          | `Y`     |
//! | `Lookup::new("X").env(None)`        | `X`          | -       |
//! | `Lookup::env_only("Y")`             | -            | `Y`     |
//!
//! A value stored in settings is returned exactly as stored. Only strings
//! read from the environment are coerced, e.g. split into a list.

use super::{ConfigError, EnvSource, Settings, Value};

/// Requested shape of the resolved value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Take the value as found.
    #[default]
    Scalar,
    /// Split environment strings on unescaped commas.
    List,
}

/// One configuration lookup.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    setting: Option<&'a str>,
    env: Option<&'a str>,
    require: bool,
    kind: ValueKind,
    what: Option<&'a str>,
}

impl<'a> Lookup<'a> {
    /// Look `name` up as both a settings key and an environment variable.
    pub fn new(name: &'a str) -> Self {
        Self {
            setting: Some(name),
            env: Some(name),
            require: true,
            kind: ValueKind::Scalar,
            what: None,
        }
    }

    /// Only consult the settings store.
    pub fn setting_only(name: &'a str) -> Self {
        Self::new(name).env(None)
    }

    /// Only consult the environment.
    pub fn env_only(name: &'a str) -> Self {
        Self::new(name).setting(None)
    }

    /// Override the settings key; `None` disables the settings store.
    pub fn setting(mut self, key: Option<&'a str>) -> Self {
        self.setting = key;
        self
    }

    /// Override the environment variable; `None` disables the environment.
    pub fn env(mut self, name: Option<&'a str>) -> Self {
        self.env = name;
        self
    }

    pub fn require(mut self, require: bool) -> Self {
        self.require = require;
        self
    }

    /// Shorthand for `require(false)`.
    pub fn optional(self) -> Self {
        self.require(false)
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shorthand for `kind(ValueKind::List)`.
    pub fn list(self) -> Self {
        self.kind(ValueKind::List)
    }

    /// Label used in the "not found" error (defaults to the key).
    pub fn what(mut self, what: &'a str) -> Self {
        self.what = Some(what);
        self
    }
}

/// Resolve a lookup against a settings store and an environment.
///
/// Returns `Ok(None)` for an absent optional value.
pub fn get_config(
    settings: &Settings,
    env: &dyn EnvSource,
    lookup: &Lookup<'_>,
) -> Result<Option<Value>, ConfigError> {
    if lookup.setting.is_none() && lookup.env.is_none() {
        return Err(ConfigError::NoSource);
    }

    let from_settings = lookup
        .setting
        .and_then(|key| settings.get(key))
        .filter(|value| !value.is_null())
        .cloned();

    let value = from_settings.or_else(|| {
        let raw = env.var(lookup.env?)?;
        Some(match lookup.kind {
            ValueKind::Scalar => Value::Str(raw),
            ValueKind::List => Value::from(smartsplit(&raw, ',')),
        })
    });

    match value {
        Some(value) => Ok(Some(value)),
        None if lookup.require => {
            let what = lookup
                .what
                .or(lookup.setting)
                .or(lookup.env)
                .unwrap_or("value");
            Err(ConfigError::missing(what, lookup.setting, lookup.env))
        }
        None => Ok(None),
    }
}

/// Split on `sep`, treating a backslash-escaped separator as a literal.
///
/// A backslash before any other character is kept as is.
pub fn smartsplit(raw: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&sep) {
            current.push(sep);
            chars.next();
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}
