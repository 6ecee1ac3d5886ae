//! Database abstraction layer.
//!
//! This module provides trait-based abstractions for data access,
//! allowing different storage backends to be swapped without changing
//! the tool handlers that sit on top of them.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `models`: Domain entities (Author, Series, Book, Chapter, Location, Trope, ...)
//! - `repository`: Trait definitions for data access
//! - `sqlite`: SQLx-backed implementation with embedded migrations

mod error;
mod models;
mod repository;
pub mod sqlite;
pub(crate) mod utils;


pub use error::{DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::SqliteDatabase;
