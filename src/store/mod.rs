//! Persistence layer — libSQL-backed storage for proposals.

pub mod libsql_backend;
pub mod migrations;
pub mod proposals;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use proposals::{NewProposal, Proposal};
pub use traits::Database;
