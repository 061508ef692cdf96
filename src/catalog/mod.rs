/// Users and bearer tokens
pub mod auth;
/// Catalog and user records, creation payloads and patches
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// SQLite persistence for the catalog
pub mod local_storage;
/// Page request and page envelope
pub mod pagination;
/// Catalog Query Engine: filtering, pagination and relation loading
pub mod query;

pub use auth::Session;
pub use local_storage::LocalStorage;
pub use pagination::{Page, PageRequest};
pub use query::{Field, MatchKind, Predicate, QueryEngine, Record, Relation, Resource, Value};
