//! `connector-core` — shared vocabulary of the async query connector.
//!
//! This crate holds **pure data** types: identifiers, query criteria and the
//! result payload returned by an acquisition. No runtime or I/O concerns.

pub mod error;
pub mod id;
pub mod query;
pub mod result;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use query::{Condition, QueryCriteria};
pub use result::{Entity, Link, LinkDirection, QueryResult};
