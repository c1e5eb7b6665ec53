use std::path::PathBuf;

use crate::domain::{ReqId, Spec};

pub mod directory;
pub use directory::Directory;

mod materialize;
pub use materialize::{Action, MaterializeError, Materializer, Policy, Summary};

/// The YAML representation of a requirement record.
pub mod spec_file;
pub use spec_file::{LoadError, SpecFile};

/// A store of requirement records keyed by identifier.
pub trait SpecStore {
    /// Whether a record with this identifier is already stored.
    fn exists(&self, id: ReqId) -> bool;

    /// Store `spec` under its identifier, replacing any existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn write(&mut self, spec: &Spec) -> Result<(), StoreError>;

    /// Every stored record, in numeric identifier order.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be read.
    fn read_all(&self) -> Result<Vec<Spec>, StoreError>;
}

/// Errors raised by a [`SpecStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A file could not be read or written.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A stored record could not be loaded.
    #[error("failed to load {}: {source}", path.display())]
    Load {
        /// The offending file.
        path: PathBuf,
        /// What was wrong with it.
        source: LoadError,
    },

    /// A record could not be serialized.
    #[error("failed to serialize {id}: {source}")]
    Serialize {
        /// The record.
        id: ReqId,
        /// The serializer error.
        source: serde_yaml::Error,
    },
}
