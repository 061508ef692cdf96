//! Musicbox - REST API for a music catalog
//!
//! Artists own albums, albums own songs. The catalog is stored in SQLite and
//! served over HTTP with token-based registration and login.

/// Persistence and the Catalog Query Engine
pub mod catalog;
/// Server configuration
pub mod config;
/// HTTP routes and handlers
pub mod http;
/// HTTP server lifecycle
pub mod server;

#[cfg(test)]
pub(crate) mod test_utils;
