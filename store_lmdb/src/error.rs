use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema version {found} is not supported (this build reads up to {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for bounty_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(key) => bounty_store::StoreError::NotFound(key),
            LmdbError::Serialization(msg) => bounty_store::StoreError::Serialization(msg),
            other => bounty_store::StoreError::Backend(other.to_string()),
        }
    }
}
