//! Filter error types.
//!
//! | Variant              | Raised when                                        |
//! |----------------------|----------------------------------------------------|
//! | `Config`             | a required setting is missing everywhere           |
//! | `Option`             | a constructor keyword is unknown or disallowed     |
//! | `Spec`               | a filter specification cannot be resolved          |
//! | `Definition`         | a tool type is declared with an invalid method     |
//! | `MissingInput`       | `{input}` is used without upstream content         |
//! | `ToolFailed`         | an external tool exits non-zero                    |

use super::Capability;
use crate::config::{ConfigError, OptionError};
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised while resolving, configuring or running a filter.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Option(#[from] OptionError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("`{tool}` uses {{input}} but no input content was given")]
    MissingInput { tool: String },

    #[error("program file not found: `{program}`")]
    ToolNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero.
    #[error("{message}")]
    ToolFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
        stdout: String,
        message: String,
    },

    #[error("`{program}` exited successfully but did not write {{output}}")]
    MissingOutput {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("filter `{filter}` does not implement `{capability}`")]
    Unsupported {
        filter: String,
        capability: Capability,
    },

    #[error("filter `{0}` was used before set_context()")]
    Unbound(String),

    #[error("only one filter may implement `open`, got `{0}` and `{1}`")]
    MultipleOpen(String, String),

    /// An in-process filter rejected its input.
    #[error("{filter}: {message}")]
    Failed { filter: String, message: String },

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    pub fn failed(filter: &str, message: impl Into<String>) -> Self {
        FilterError::Failed {
            filter: filter.to_owned(),
            message: message.into(),
        }
    }
}

/// A filter specification that cannot be turned into an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("undefined filter: `{0}`")]
    UnknownFilter(String),

    #[error("filter type `{0}` has no name and cannot be registered")]
    Unnamed(String),

    #[error("cannot pass options to a filter instance")]
    InstanceWithOptions,

    #[error("cannot pass options to a callable filter")]
    CallableWithOptions,
}

/// A tool type declared incorrectly (caught when the type is defined).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("`{0}` is not a supported filter method")]
    InvalidMethod(String),

    #[error("tool `{tool}` extends unknown tool `{parent}`")]
    UnknownParent { tool: String, parent: String },

    #[error("tool `{0}` extends itself")]
    CyclicParent(String),
}

/// A bad placeholder in an argv template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{placeholder}}}` in `{token}`")]
    Unknown { token: String, placeholder: String },

    #[error("unbalanced brace in `{0}`")]
    Unbalanced(String),
}
