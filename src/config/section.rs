//! `[tools]` and `[[bundles]]` sections of `assetflow.toml`.
//!
//! # Example
//!
//! ```toml
//! [tools.autoprefix]
//! argv = ["postcss", "--use", "autoprefixer", "-o", "{output}", "{input}"]
//! method = "input"
//!
//! [tools.autoprefix.options.binary]
//! setting = "POSTCSS_BIN"
//! default = "postcss"
//!
//! [[bundles]]
//! name = "site.css"
//! sources = ["css/reset.scss", "css/site.scss"]
//! output = "public/site.css"
//! filters = [{ name = "scss", as_output = true }, "autoprefix", "cssmin"]
//! ```

use super::{ConfigDiagnostics, Kwargs, OptionDef};
use crate::external::MethodDecl;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// Tools
// ============================================================================

/// An external tool declared in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolDef {
    /// Argument template; `{input}`, `{output}` and `{self.<option>}` expand.
    pub argv: Option<Vec<String>>,
    /// `"input"`, `"output"`, `"open"` or `"none"`.
    pub method: Option<String>,
    /// Name of a tool this one derives from.
    pub extends: Option<String>,
    /// Declared options, keyed by attribute name.
    pub options: BTreeMap<String, OptionDef>,
}

impl ToolDef {
    pub fn validate(&self, name: &str, diag: &mut ConfigDiagnostics) {
        if let Some(method) = &self.method
            && method.parse::<MethodDecl>().is_err()
        {
            diag.error_with_hint(
                format!("tools.{name}.method"),
                format!("`{method}` is not a supported filter method"),
                "use one of \"input\", \"output\", \"open\" or \"none\"",
            );
        }
        if self.argv.as_ref().is_some_and(Vec::is_empty) {
            diag.error(format!("tools.{name}.argv"), "argv must not be empty");
        }
        if self.argv.is_none() && self.extends.is_none() {
            diag.error_with_hint(
                format!("tools.{name}"),
                "tool declares neither `argv` nor `extends`",
                "add an argv template, e.g. argv = [\"mytool\", \"{input}\"]",
            );
        }
    }
}

// ============================================================================
// Bundles
// ============================================================================

/// A bundle: sources run through a filter chain into one output file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleDef {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
    #[serde(default)]
    pub filters: Vec<FilterRef>,
    /// Joins sources before output filters run (default: newline).
    pub separator: Option<String>,
}

impl BundleDef {
    pub fn validate(&self, index: usize, diag: &mut ConfigDiagnostics) {
        let field = format!("bundles[{index}]");
        if self.name.trim().is_empty() {
            diag.error(format!("{field}.name"), "bundle name must not be empty");
        }
        if self.sources.is_empty() {
            diag.error(
                format!("{field}.sources"),
                format!("bundle `{}` has no sources", self.name),
            );
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if filter.name().trim().is_empty() {
                diag.error(
                    format!("{field}.filters[{i}]"),
                    "filter name must not be empty",
                );
            }
        }
    }
}

/// A filter reference inside a bundle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterRef {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        as_output: bool,
        #[serde(default)]
        options: Kwargs,
    },
}

impl FilterRef {
    pub fn name(&self) -> &str {
        match self {
            FilterRef::Name(name) | FilterRef::Detailed { name, .. } => name,
        }
    }

    pub fn as_output(&self) -> bool {
        matches!(self, FilterRef::Detailed { as_output: true, .. })
    }

    pub fn options(&self) -> Kwargs {
        match self {
            FilterRef::Name(_) => Kwargs::new(),
            FilterRef::Detailed { options, .. } => options.clone(),
        }
    }
}
