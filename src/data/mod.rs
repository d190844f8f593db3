//! Data module - census table loading, header remapping and joining

mod header;
mod loader;
mod merger;

pub use header::HeaderMapping;
pub use loader::{DataLoader, LoadOptions, LoaderError};
pub use merger::{FilterValue, MergeError, Merger};
