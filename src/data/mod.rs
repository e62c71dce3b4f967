//! Data module - CSV loading, reshaping and merging

mod loader;
mod merge;

pub use loader::LoaderError;
pub use merge::{build_merged_dataset, MergeError};
