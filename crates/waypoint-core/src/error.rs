//! Error kinds shared across the waypoint crates.

/// Everything that can go wrong in the registry, snapshot store, cache,
/// and reporting paths. Transport layers translate these into their own
/// status codes; the variants carry enough context for log correlation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed peer id, out-of-range score, or similar bad input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation on a component that is missing or has been stopped.
    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    /// Snapshot file written by a format version this binary doesn't know.
    #[error("snapshot version mismatch (expected {expected}, got {found})")]
    VersionMismatch { expected: String, found: String },

    /// Snapshot file exists but doesn't parse.
    #[error("snapshot corrupted: {0}")]
    Corruption(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote reporting endpoint unreachable.
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// A readiness wait exhausted its retry budget.
    #[error("not ready after {attempts} attempts, still {behind} blocks behind")]
    ReadinessExceeded { attempts: u32, behind: u64 },
}
