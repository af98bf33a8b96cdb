use thiserror::Error;

use super::backend::BackendError;
use super::settings::ConfigError;
use super::unit::RepeatId;
use crate::core::alchemy::AlchemyError;
use crate::core::forces::ForceError;
use crate::core::io::storage::StorageError;
use crate::core::restraints::GeometryError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Restraint geometry error: {source}")]
    Geometry {
        #[from]
        source: GeometryError,
    },

    #[error("Alchemical transformation failed: {source}")]
    Alchemy {
        #[from]
        source: AlchemyError,
    },

    #[error("System assembly failed: {source}")]
    Force {
        #[from]
        source: ForceError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },

    #[error("Setup artifact {path:?} could not be read or written: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unit '{unit}' has no usable setup result")]
    MissingSetup { unit: String },

    #[error("Unit '{unit}' belongs to repeat {expected} but was given the setup output of repeat {found}")]
    SetupMismatch {
        unit: String,
        expected: RepeatId,
        found: RepeatId,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}
