//! LMDB error bridging.

use cobalt_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("lmdb: {0}")]
    Heed(#[from] heed::Error),

    #[error("encoding: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("{0}")]
    Other(String),
}

impl From<LmdbError> for StoreError {
    fn from(err: LmdbError) -> Self {
        match err {
            LmdbError::Heed(e) => StoreError::Io(e.to_string()),
            LmdbError::Encoding(e) => StoreError::Corruption {
                table: "unknown",
                detail: e.to_string(),
            },
            LmdbError::Other(e) => StoreError::Io(e),
        }
    }
}
