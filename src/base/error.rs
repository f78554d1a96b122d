use std::fmt;
use thiserror::Error;

/// Status reported by the resolver library for a single query.
///
/// These mirror the status vocabulary of a stub resolver: every sub-query
/// completes with either an answer or exactly one of these.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum QueryStatus {
    #[error("Domain name not found")]
    NotFound,
    #[error("DNS server returned answer with no data")]
    NoData,
    #[error("DNS server returned general failure")]
    ServerFailure,
    #[error("DNS server refused query")]
    Refused,
    #[error("Misformatted DNS reply")]
    BadResponse,
    #[error("DNS server does not implement requested operation")]
    NotImplemented,
    #[error("Timeout while contacting DNS servers")]
    Timeout,
    #[error("DNS query cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// Kind of sub-query a [`QueryStatus`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// A record lookup.
    Ipv4,
    /// AAAA record lookup.
    Ipv6,
    /// Service-discovery (SRV) lookup.
    Srv,
    /// Text-record (TXT) lookup.
    Txt,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::Ipv4 => "A",
            QueryKind::Ipv6 => "AAAA",
            QueryKind::Srv => "SRV",
            QueryKind::Txt => "TXT",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ResolveError {
    // Parse errors
    #[error("unparseable host:port: {target}")]
    UnparseableTarget { target: String },
    #[error("no port in name: {target}")]
    MissingPort { target: String },

    // Session errors
    #[error("cannot parse DNS server address: {addr}")]
    InvalidServer { addr: String },
    #[error("failed to create query session: {0}")]
    Session(String),

    // Query errors
    #[error("{kind} lookup for {name} failed: {status}")]
    Query {
        kind: QueryKind,
        name: String,
        status: QueryStatus,
    },

    #[error("resolution canceled")]
    Canceled,

    #[error("invalid service config: {0}")]
    InvalidServiceConfig(String),

    /// Aggregate of several failures, newest first.
    #[error("{}", join_causes(.0))]
    Multiple(Vec<ResolveError>),
}

fn join_causes(causes: &[ResolveError]) -> String {
    causes.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ResolveError {
    /// Returns the RPC status code this error surfaces as.
    pub fn status_code(&self) -> i32 {
        match self {
            ResolveError::UnparseableTarget { .. } | ResolveError::MissingPort { .. } => 3,
            ResolveError::InvalidServer { .. } => 3,
            ResolveError::Session(_) => 13,
            ResolveError::Query { status: QueryStatus::Timeout, .. } => 4,
            ResolveError::Query { .. } => 14,
            ResolveError::Canceled => 1,
            ResolveError::InvalidServiceConfig(_) => 3,
            ResolveError::Multiple(causes) => {
                causes.first().map(ResolveError::status_code).unwrap_or(14)
            }
        }
    }

    /// Returns true for malformed-target errors.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ResolveError::UnparseableTarget { .. } | ResolveError::MissingPort { .. })
    }

    /// Iterates over the leaf errors of this error tree, newest first.
    pub fn causes(&self) -> Vec<&ResolveError> {
        match self {
            ResolveError::Multiple(children) => {
                children.iter().flat_map(ResolveError::causes).collect()
            }
            leaf => vec![leaf],
        }
    }
}

/// Accumulates sub-query failures into a single error tree.
///
/// The first failure is stored as is. Each later failure becomes the parent
/// of everything recorded so far, so the newest cause is listed first.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorChain {
    head: Option<ResolveError>,
}

impl ErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ResolveError) {
        self.head = Some(match self.head.take() {
            None => error,
            Some(prev) => ResolveError::Multiple(vec![error, prev]),
        });
    }

    pub fn clear(&mut self) {
        self.head = None;
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.head.as_ref().map(|e| e.causes().len()).unwrap_or(0)
    }

    pub fn take(&mut self) -> Option<ResolveError> {
        self.head.take()
    }
}
