//! The settings store and the environment source filters read from.

use super::Value;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

// ============================================================================
// Settings
// ============================================================================

/// Key/value settings store consulted before the environment.
///
/// Keys are case-insensitive: `SASS_BIN` and `sass_bin` name the same entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(&key.to_ascii_lowercase())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Settings::new();
        for (k, v) in iter {
            settings.set(k.as_ref(), v);
        }
        settings
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Where environment variables come from.
///
/// Filters never call `std::env` themselves; the context carries one of
/// these so tests can swap in a fixed map.
pub trait EnvSource: Send + Sync + std::fmt::Debug {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed in-memory environment.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: FxHashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_owned(), value.to_owned());
    }

    pub fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_case_insensitive() {
        let mut settings = Settings::new();
        settings.set("SASS_BIN", "/opt/sass");
        assert_eq!(settings.get("sass_bin"), Some(&Value::from("/opt/sass")));
        assert_eq!(settings.get("Sass_Bin"), Some(&Value::from("/opt/sass")));

        settings.set("sass_bin", "sass");
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.remove("SASS_BIN"), Some(Value::from("sass")));
        assert!(settings.is_empty());
    }

    #[test]
    fn test_map_env_is_case_sensitive() {
        let env: MapEnv = [("FOO", "bar")].into_iter().collect();
        assert_eq!(env.var("FOO").as_deref(), Some("bar"));
        assert_eq!(env.var("foo"), None);
    }
}
