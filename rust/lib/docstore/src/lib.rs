//! Document store seam for the access core.
//!
//! The access core never talks to a database directly. It issues
//! [`Predicate`]s and batched writes through the [`DocumentStore`] trait;
//! this crate ships an in-memory backend for tests and embedding, and a
//! redb-backed one for the CLI.

pub mod error;
pub mod memory;
pub mod predicate;
pub mod redb;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use predicate::Predicate;
pub use redb::RedbStore;
pub use traits::{DocumentStore, document_id};
