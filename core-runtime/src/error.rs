use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Invalid path for {field}: '{}'", path.display())]
    InvalidPath { field: &'static str, path: PathBuf },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when a required host bridge was not injected.
    pub fn is_capability_missing(&self) -> bool {
        matches!(self, Error::CapabilityMissing { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
