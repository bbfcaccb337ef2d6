//! Node error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] cobalt_store::StoreError),
}
