//! HTTP handlers.

mod system;

pub use system::health;
