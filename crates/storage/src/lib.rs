//! Blob storage and the CSV source registry kept inside it.

pub mod backend;
pub mod error;
pub mod registry;

pub use backend::{BlobStore, StorageBackend};
pub use error::StorageError;
pub use registry::SourceRegistry;
