//! Persistence layer: the `DocumentStore` trait and its backends.

mod libsql_backend;
mod traits;

pub use libsql_backend::LibSqlDocumentStore;
pub use traits::{DocumentStore, MemoryDocumentStore};
