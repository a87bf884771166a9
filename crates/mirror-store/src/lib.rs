//! Object store backends for httpmirror.
//!
//! Every backend implements [`mirror_core::RemoteStore`]. [`StoreConfig`]
//! builds the backend selected by configuration.

pub mod config;
pub mod filesystem;
pub mod memory;
pub mod s3;
mod spool;

pub use config::{S3Config, StoreConfig};
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use s3::S3Store;
