//! Metadata index for stored entries.
//!
//! - [`MetadataStore`] - Record persistence and path-prefix cascades
//! - [`SqliteMetadataStore`] - SQLite implementation
//!
//! Records are keyed by `(path, filename)`. Directory subtrees are addressed
//! by path prefix, component-aware: the prefix `/docs` covers `/docs` and
//! `/docs/2024` but never `/docs2`.

mod ops;
mod sqlite;

pub use ops::MetadataStore;
pub use sqlite::SqliteMetadataStore;
