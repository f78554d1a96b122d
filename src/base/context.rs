//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! turning a bare resolver-library status into a context-rich
//! `ResolveError::Query`.

use crate::base::error::{QueryKind, QueryStatus, ResolveError};

/// Extension trait for adding query context to resolver-library results.
pub trait QueryResultExt<T> {
    /// Attach the query kind and the queried name to a failure.
    ///
    /// # Example
    /// ```ignore
    /// use rpcresolv::base::context::QueryResultExt;
    ///
    /// let records = channel.query_srv(name.clone()).await
    ///     .query_context(QueryKind::Srv, name.as_str())?;
    /// // Error: "SRV lookup for _grpclb._tcp.example.com failed: Domain name not found"
    /// ```
    fn query_context(self, kind: QueryKind, name: &str) -> Result<T, ResolveError>;
}

impl<T> QueryResultExt<T> for Result<T, QueryStatus> {
    fn query_context(self, kind: QueryKind, name: &str) -> Result<T, ResolveError> {
        self.map_err(|status| ResolveError::Query {
            kind,
            name: name.to_string(),
            status,
        })
    }
}
