//! Encrypted blob storage on the host filesystem.
//!
//! - [`FileStore`] - Byte-level operations on virtual locations
//! - [`LocalFileStore`] - Implementation over a host directory
//!
//! Locations are virtual absolute paths (see [`crate::paths`]); `/` is the
//! storage root. This layer never looks at metadata: keeping records in step
//! with the bytes is the controllers' job.

mod local;
mod ops;

pub use local::LocalFileStore;
pub use ops::FileStore;
