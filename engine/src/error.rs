//! Error types for dispatch.
//!
//! Resolution, binding, validation and exclusion errors are fail-fast: the
//! first one aborts the pipeline before the action runs. [`ActionError`] is
//! what action and hook bodies raise; the hook pipeline recovers it and maps
//! it to an exit code.

use std::fmt;
use std::sync::Arc;

use command_dispatch_core::DefinitionError;
use thiserror::Error;

use crate::config::ExitCodes;

/// Error kind carried by [`ActionError::cancelled`].
pub const CANCELLED_KIND: &str = "cancelled";

/// Error kind used when an action fails without naming one.
pub const FAILURE_KIND: &str = "failure";

fn describe_token(token: &Option<String>) -> String {
    match token {
        Some(token) => format!("'{token}'"),
        None => "<none>".to_string(),
    }
}

/// Failures walking the command tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No top-level command or root action matches.
    #[error("unknown command {}", describe_token(.token))]
    UnknownCommand { token: Option<String> },
    /// The deepest matched command has no action matching the next token
    /// and no primary action.
    #[error("unknown action {} for command '{command}'", describe_token(.token))]
    UnknownAction {
        command: String,
        token: Option<String>,
    },
}

/// Failures reading interactive input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// Prompting is disabled or no terminal is attached.
    #[error("input is not interactive")]
    NotInteractive,
    /// The input stream closed before an answer was read.
    #[error("no more input")]
    Exhausted,
    #[error("I/O error: {0}")]
    Io(String),
}

/// Failures mapping tokens onto an action's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("unknown option '{option}'")]
    UnknownOption { option: String },
    #[error("option '{option}' requires a value")]
    MissingOptionValue { option: String },
    #[error("missing required argument '{parameter}'")]
    MissingRequiredArgument { parameter: String },
    #[error("missing required option '{option}'")]
    MissingRequiredOption { parameter: String, option: String },
    #[error("invalid value '{value}' for '{parameter}': {reason}")]
    ValueConversion {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("unexpected argument '{token}'")]
    UnexpectedArgument { token: String },
    #[error("reading '{parameter}' failed: {source}")]
    Prompt {
        parameter: String,
        #[source]
        source: PromptError,
    },
    #[error("no context of type '{context_type}' supplied for '{parameter}'")]
    MissingContext {
        parameter: String,
        context_type: String,
    },
}

/// A bound value failed one of its validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Binding name of the failing parameter.
    pub parameter: String,
    pub message: String,
}

/// More than one member of a mutually exclusive set was supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} cannot be used together (mutually exclusive set '{group}')", join_names(.parameters))]
pub struct MutualExclusionError {
    pub group: String,
    /// Display names of the supplied members, in declaration order.
    pub parameters: Vec<String>,
}

/// Failures loading or saving a [`DispatchConfig`](crate::DispatchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Everything that can stop a dispatch before the action's own outcome is
/// known.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Exclusion(#[from] MutualExclusionError),
    /// The tree failed its definition checks.
    #[error("invalid command tree: {}", join_errors(.0))]
    InvalidTree(Vec<DefinitionError>),
    #[error("no handler registered for action '{0}'")]
    MissingHandler(String),
    #[error("no hook handler registered under '{0}'")]
    MissingHook(String),
    /// The cancellation signal fired before the action was invoked.
    #[error("dispatch cancelled")]
    Cancelled,
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

fn join_errors(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatchError {
    /// Exit code reported for this error.
    ///
    /// Input errors map to the usage code, cancellation to the cancellation
    /// code, and wiring errors to the generic failure code.
    pub fn exit_code(&self, codes: &ExitCodes) -> i32 {
        match self {
            DispatchError::Resolve(_)
            | DispatchError::Bind(_)
            | DispatchError::Validation(_)
            | DispatchError::Exclusion(_) => codes.usage,
            DispatchError::Cancelled => codes.cancelled,
            DispatchError::InvalidTree(_)
            | DispatchError::MissingHandler(_)
            | DispatchError::MissingHook(_) => codes.failure,
        }
    }
}

/// Error raised by an action or hook body.
///
/// The `kind` is the key looked up in exit-code maps.
///
/// # Examples
///
/// ```
/// use command_dispatch::ActionError;
///
/// let err = ActionError::new("not_found", "remote 'origin' does not exist");
/// assert_eq!(err.kind(), "not_found");
/// assert_eq!(err.to_string(), "remote 'origin' does not exist");
///
/// let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// assert_eq!(ActionError::from(io).kind(), "io");
/// ```
#[derive(Debug, Clone)]
pub struct ActionError {
    kind: String,
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ActionError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// An error with the generic failure kind.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(FAILURE_KIND, message)
    }

    /// Signals that the body observed cancellation and stopped.
    pub fn cancelled() -> Self {
        Self::new(CANCELLED_KIND, "operation cancelled")
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == CANCELLED_KIND
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl PartialEq for ActionError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::new("io", err.to_string()).with_source(err)
    }
}

/// Convenience alias for results with [`DispatchError`].
pub type Result<T> = std::result::Result<T, DispatchError>;
