//! Base types and error handling.
//!
//! Provides foundational types shared by the resolution machinery:
//! - [`ResolveError`]: Errors surfaced to callers, including the aggregate tree
//! - [`QueryStatus`]: Per-query status reported by the resolver library
//! - [`ErrorChain`]: Accumulator for sub-query failures

pub mod context;
pub mod error;

pub use error::{ErrorChain, QueryKind, QueryStatus, ResolveError};
