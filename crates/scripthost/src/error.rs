use std::fmt;

use rhai::{EvalAltResult, ParseError};
use serde::{Deserialize, Serialize};

/// Result type for bridge operations. `Err` is the failure sentinel.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Category of a bridge failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// A global or a path segment was absent, or an intermediate was not a table.
    LookupFailure,
    /// A resolved value had the wrong type.
    TypeMismatch,
    /// An invocation target was not a function.
    NotCallable,
    /// The engine raised a runtime error while executing script code.
    CallFailure,
    /// Source failed to read, parse or compile.
    LoadFailure,
    /// A global could not be bound.
    BindFailure,
}

impl FailureKind {
    /// Short machine-friendly name for the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LookupFailure => "lookup",
            Self::TypeMismatch => "type_mismatch",
            Self::NotCallable => "not_callable",
            Self::CallFailure => "call",
            Self::LoadFailure => "load",
            Self::BindFailure => "bind",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by a [`ScriptHost`](crate::ScriptHost).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// A global, or a segment of a global path, could not be resolved.
    #[error("Failed to get script global at '{path}'")]
    Lookup {
        /// The full requested path, dot separated.
        path: String,
    },
    /// A global resolved to a value of an unexpected type.
    #[error("Script global '{key}' is not type {expected}, has type {found}")]
    TypeMismatch {
        /// The requested key or path.
        key: String,
        /// The type that was required.
        expected: String,
        /// The type that was observed.
        found: String,
    },
    /// An invocation target was nil or not a function.
    #[error("'{target}' is not a script function (has type {found})")]
    NotCallable {
        /// Name or description of the target.
        target: String,
        /// The type that was observed.
        found: String,
    },
    /// Script code raised an error while running.
    #[error("Script error calling '{target}': {message}")]
    Call {
        /// The function or chunk being run.
        target: String,
        /// Decorated engine diagnostic.
        message: String,
        /// Line of the failure, when known.
        line: Option<usize>,
    },
    /// Source could not be read or compiled.
    #[error("Script load error in '{origin}': {message}")]
    Load {
        /// Where the source came from (file path or `<string>`).
        origin: String,
        /// Decorated engine diagnostic.
        message: String,
        /// Line of the failure, when known.
        line: Option<usize>,
    },
    /// A global could not be bound.
    #[error("Failed to set script global '{key}': {message}")]
    Bind {
        /// The global key.
        key: String,
        /// Why the binding was rejected.
        message: String,
    },
}

impl ScriptError {
    /// The failure category.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Lookup { .. } => FailureKind::LookupFailure,
            Self::TypeMismatch { .. } => FailureKind::TypeMismatch,
            Self::NotCallable { .. } => FailureKind::NotCallable,
            Self::Call { .. } => FailureKind::CallFailure,
            Self::Load { .. } => FailureKind::LoadFailure,
            Self::Bind { .. } => FailureKind::BindFailure,
        }
    }

    /// Create a lookup failure for a path of keys.
    pub fn lookup<S: AsRef<str>>(keys: &[S]) -> Self {
        Self::Lookup {
            path: join_path(keys),
        }
    }

    /// Create a bind failure.
    pub fn bind(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bind {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_parse(origin: &str, err: &ParseError) -> Self {
        Self::Load {
            origin: origin.to_string(),
            message: err.to_string(),
            line: err.position().line(),
        }
    }

    pub(crate) fn from_eval(target: &str, err: &EvalAltResult) -> Self {
        Self::Call {
            target: target.to_string(),
            message: err.to_string(),
            line: err.position().line(),
        }
    }

    /// Line number attached to the failure, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Call { line, .. } | Self::Load { line, .. } => *line,
            _ => None,
        }
    }

    /// Convert the error to a structured, serializable form.
    pub fn info(&self) -> ScriptErrorInfo {
        ScriptErrorInfo {
            error_type: self.kind(),
            message: self.to_string(),
            location: format_location(self.line()),
        }
    }
}

/// Serializable error details for a reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptErrorInfo {
    /// Failure category.
    pub error_type: FailureKind,
    /// Human-readable error message.
    pub message: String,
    /// Location in the script, when available.
    pub location: Option<String>,
}

/// Join keys into the dotted form used in diagnostics.
pub(crate) fn join_path<S: AsRef<str>>(keys: &[S]) -> String {
    keys.iter()
        .map(|k| k.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

fn format_location(line: Option<usize>) -> Option<String> {
    line.map(|line| format!("line {line}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn lookup_names_full_path() {
        let err = ScriptError::lookup(&["a", "b", "c"]);
        assert_eq!(err.kind(), FailureKind::LookupFailure);
        assert_eq!(err.to_string(), "Failed to get script global at 'a.b.c'");
    }

    #[test]
    fn info_carries_location() {
        let err = ScriptError::Call {
            target: "update".into(),
            message: "boom".into(),
            line: Some(3),
        };
        let info = err.info();
        assert_eq!(info.error_type, FailureKind::CallFailure);
        assert_eq!(info.location.as_deref(), Some("line 3"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["error_type"], "CallFailure");
    }

    #[test]
    fn type_mismatch_message() {
        let err = ScriptError::TypeMismatch {
            key: "config".into(),
            expected: "table".into(),
            found: "i64".into(),
        };
        assert_eq!(
            err.to_string(),
            "Script global 'config' is not type table, has type i64"
        );
    }
}
