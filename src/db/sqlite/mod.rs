//! SQLite implementation of the database traits.
//!
//! This module provides a SQLx-backed implementation of the repository
//! traits defined in the parent module.

mod author;
mod book;
mod chapter;
mod connection;
mod helpers;
mod location;
mod metadata;
mod series;
mod timeline;
mod trope;

#[cfg(test)]
mod chapter_test;
#[cfg(test)]
mod connection_test;
#[cfg(test)]
mod metadata_test;
#[cfg(test)]
mod trope_test;

pub use author::SqliteAuthorRepository;
pub use book::SqliteBookRepository;
pub use chapter::SqliteChapterRepository;
pub use connection::{DEFAULT_MAX_CONNECTIONS, SqliteDatabase};
pub use helpers::{SqlValue, UpdateBuilder};
pub use location::SqliteLocationRepository;
pub use metadata::SqliteMetadataRepository;
pub use series::SqliteSeriesRepository;
pub use timeline::SqliteTimelineRepository;
pub use trope::SqliteTropeRepository;
