//! # sable-core
//!
//! Foundation types shared by the sable ORM crates:
//!
//! - [`errors`]: [`OrmError`], the single error type surfaced by the ORM
//! - [`value`]: SQL values, bind parameter maps, and result rows
//! - [`codec`]: versioned JSON envelope for structured column values
//! - [`retry`]: transient-failure classification and backoff policy
//! - [`logging`]: `tracing` subscriber setup and test capture utilities

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod logging;
pub mod retry;
pub mod value;

pub use errors::{OrmError, Result};
pub use retry::RetryPolicy;
pub use value::{BindParams, BindType, Row, Value};
