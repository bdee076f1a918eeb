#![forbid(unsafe_code)]

use fvue_core::BoxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatchError>;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to create component <{tag}>: {cause}")]
    ComponentInit { tag: String, cause: BoxError },

    #[error("failed to update component <{tag}>: {cause}")]
    ComponentUpdate { tag: String, cause: BoxError },
}
