//! Orchestration across the blob store and the metadata index.
//!
//! Neither store knows about the other. The controllers sequence calls to
//! both in a fixed order, heal stale records when they trip over them, and
//! run the full consistency scan. They hold only shared handles and can be
//! rebuilt per call.

mod dir;
mod file;

pub use dir::DirectoryController;
pub use file::FileController;
