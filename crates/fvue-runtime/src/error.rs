#![forbid(unsafe_code)]

use fvue_core::BoxError;
use fvue_reactive::ReactiveError;
use fvue_vdom::PatchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown method \"{name}\" on {component}")]
    UnknownMethod { name: String, component: String },

    #[error("method \"{name}\" failed: {cause}")]
    Method { name: String, cause: BoxError },

    /// The instance has no host to render into: it was never mounted and
    /// has no parent to inherit a patcher from.
    #[error("{component} has no host patcher")]
    NoHost { component: String },

    #[error("plugin \"{name}\" failed to install: {cause}")]
    Plugin { name: String, cause: BoxError },

    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}
