//! In-memory document storage
//!
//! [`MemoryStore`] keeps one document tree together with its value, numeric
//! and full-text indexes and serves them through
//! [`IndexAccessor`](crate::query::IndexAccessor). Stores are assembled with a
//! [`DocumentBuilder`].

mod memory;

pub use memory::{DocumentBuilder, MemoryStore};
