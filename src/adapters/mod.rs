//! Adapter interfaces for external data.
//!
//! - ReferenceLookup: read-only place reference data (SQLite or in-memory)
//! - ErrorStore: SQLite persistence for error records
//! - CorpusLoader: citations and source documents per place

pub mod corpus;
pub mod error_store;
pub mod reference;

pub use corpus::{CorpusLoader, JsonlCorpus, LoadError};
pub use error_store::ErrorStore;
pub use reference::{MemoryReference, ReferenceError, ReferenceLookup, SqliteReference};
