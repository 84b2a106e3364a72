//! Error types for shared state operations.

use thiserror::Error;

/// How serious an error is for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A misuse of the API; fixing the calling code resolves it.
    Medium,
    /// Something failed while applying a change or talking to storage.
    High,
}

/// The underlying reason an update, reset or refresh failed.
#[derive(Debug, Error)]
pub enum Cause {
    #[error("`{0}` is not a field of this state")]
    UnknownKey(String),

    #[error("reset data is missing field `{0}`")]
    MissingKey(String),

    #[error("listener panicked: {0}")]
    ListenerPanicked(String),
}

/// Failure reported by a persistence collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store `{store}` failed: {message}")]
    Backend { store: String, message: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn backend(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            store: store.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by [`SharedState`](crate::SharedState).
#[derive(Debug, Error)]
pub enum StateError {
    #[error("State has not been initialized.")]
    Uninitialized,

    #[error("Update state error")]
    Update(#[source] Cause),

    #[error("Reset state error")]
    Reset(#[source] Cause),

    #[error("Refresh state error")]
    Refresh(#[source] Cause),

    #[error("Error loading from storage")]
    Storage(#[from] StorageError),
}

impl StateError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED_STATE_ERROR",
            Self::Update(_) => "UPDATE_STATE_ERROR",
            Self::Reset(_) => "RESET_STATE_ERROR",
            Self::Refresh(_) => "REFRESH_STATE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Uninitialized => Severity::Medium,
            _ => Severity::High,
        }
    }

    /// The wrapped cause, if this error came from applying a change.
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Update(cause) | Self::Reset(cause) | Self::Refresh(cause) => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn codes_and_severity() {
        assert_eq!(StateError::Uninitialized.code(), "UNINITIALIZED_STATE_ERROR");
        assert_eq!(StateError::Uninitialized.severity(), Severity::Medium);

        let err = StateError::Update(Cause::UnknownKey("missing".into()));
        assert_eq!(err.code(), "UPDATE_STATE_ERROR");
        assert_eq!(err.severity(), Severity::High);
    }

    #[test]
    fn cause_is_preserved_as_source() {
        let err = StateError::Reset(Cause::MissingKey("count".into()));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("reset data is missing field `count`"));
        assert!(matches!(err.cause(), Some(Cause::MissingKey(k)) if k == "count"));
    }

    #[test]
    fn storage_error_converts() {
        let err: StateError = StorageError::backend("prefs", "disk full").into();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert_eq!(
            err.source().map(|s| s.to_string()).as_deref(),
            Some("store `prefs` failed: disk full")
        );
    }
}
