// Error types for bruno-runner
// Discovery and execution failures propagate as BrunoError; validation
// operations fold most problems into report objects instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for collection operations.
pub type Result<T> = std::result::Result<T, BrunoError>;

/// Errors that can occur while inspecting or running a collection.
#[derive(Debug, Error)]
pub enum BrunoError {
    /// Path does not exist or is not a directory.
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Directory exists but carries no bruno.json manifest.
    #[error("Not a Bruno collection (no bruno.json found): {}", path.display())]
    NotACollection { path: PathBuf },

    /// No request file matched the requested name.
    #[error("Request '{name}' not found in collection {}", collection.display())]
    RequestNotFound { name: String, collection: PathBuf },

    /// The runner binary could not be started.
    #[error("Bruno CLI not found ('{program}'). Install it with: npm install -g @usebruno/cli")]
    RunnerNotFound { program: String },

    /// The runner refused to run outside a collection root.
    #[error("Bruno CLI must be run from the root of a collection: {}", path.display())]
    NotACollectionRoot { path: PathBuf },

    /// The runner failed and reported why on stderr.
    #[error("Bruno CLI error: {stderr}")]
    RunnerError { stderr: String },

    /// The runner exceeded its time budget and was killed.
    #[error("Bruno CLI timed out after {timeout_ms}ms")]
    ExecutionTimeout { timeout_ms: u64 },

    #[error("Unknown error while running Bruno CLI: {message}")]
    UnknownExecutionError { message: String },

    /// Path lies outside every configured allowed root.
    #[error("Access denied: {} is outside the allowed paths", path.display())]
    PathNotAllowed { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BrunoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BrunoError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while resolving configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_path() {
        let err = BrunoError::NotACollection {
            path: PathBuf::from("/tmp/api"),
        };
        assert_eq!(
            err.to_string(),
            "Not a Bruno collection (no bruno.json found): /tmp/api"
        );

        let err = BrunoError::ExecutionTimeout { timeout_ms: 500 };
        assert_eq!(err.to_string(), "Bruno CLI timed out after 500ms");
    }

    #[test]
    fn config_errors_convert() {
        let err: BrunoError = ConfigError::InvalidValue {
            key: "BRUNO_CACHE_TTL_SECS".to_string(),
            message: "must be a number".to_string(),
        }
        .into();
        assert!(err.to_string().contains("BRUNO_CACHE_TTL_SECS"));
    }
}
