#![forbid(unsafe_code)]

use fvue_core::BoxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    #[error("cannot set reactive property on undefined, null, or primitive value: {target}")]
    InvalidTarget { target: String },

    #[error("cannot delete reactive property on undefined, null, or primitive value: {target}")]
    InvalidDeleteTarget { target: String },

    #[error("invalid array index: {key:?}")]
    InvalidKey { key: String },

    #[error("getter for watcher \"{expression}\" failed: {cause}")]
    Getter { expression: String, cause: BoxError },

    #[error("callback for watcher \"{expression}\" failed: {cause}")]
    Callback { expression: String, cause: BoxError },
}

impl ReactiveError {
    /// The user error wrapped by a getter or callback failure.
    #[must_use]
    pub fn cause(&self) -> Option<&BoxError> {
        match self {
            Self::Getter { cause, .. } | Self::Callback { cause, .. } => Some(cause),
            _ => None,
        }
    }
}
