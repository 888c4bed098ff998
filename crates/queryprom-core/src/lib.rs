//! queryprom core: scalar coercion, label schema resolution, and error types.
//!
//! This crate holds the pieces of the metric-construction engine that do not
//! depend on a runtime, a database driver, or an exposition backend: the
//! closed `Scalar` enum adapters decode into, the coercion of result values
//! into observations, and the derivation of label schemas from result columns.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every fallible path surfaces as `QueryPromError`/`Result` so a bad row from
//! one query cannot take the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod row;
pub mod schema;
pub mod value;

/// Shared result type.
pub use error::{ErrorCode, QueryPromError, Result};
pub use row::PollRow;
pub use schema::LabelSchema;
pub use value::{coerce, Scalar};
