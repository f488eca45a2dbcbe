/// Everything that can go wrong while building a game or training on it.
///
/// Traversal itself recovers nothing beyond its numeric safeguards; all
/// of these surface to the control loop, which decides stop vs continue
/// and records a human-readable stopping reason.
#[derive(Debug)]
pub enum SolverError {
    /// inconsistent or out-of-range parameters, caught at entry
    ConfigInvalid(String),
    /// invariant violation during tree construction. indicates a bug.
    TreeShape(String),
    /// an update vector whose length does not match the record's num_actions
    InfoSetShapeMismatch {
        expected: usize,
        got: usize,
    },
    /// unseedable or unavailable randomness source
    RngState(String),
    /// missing path, corrupt magic, or version mismatch on a snapshot
    CheckpointIo(String),
    /// memory above the critical threshold after pruning escalation
    ResourceExhausted {
        resident_bytes: u64,
        limit_bytes: u64,
    },
    /// user or timeout requested a clean shutdown
    CancelRequested,
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::ConfigInvalid(s) => write!(f, "invalid configuration: {}", s),
            Self::TreeShape(s) => write!(f, "tree invariant violated: {}", s),
            Self::InfoSetShapeMismatch { expected, got } => {
                write!(f, "update vector of length {} against {} actions", got, expected)
            }
            Self::RngState(s) => write!(f, "rng state: {}", s),
            Self::CheckpointIo(s) => write!(f, "checkpoint: {}", s),
            Self::ResourceExhausted {
                resident_bytes,
                limit_bytes,
            } => write!(
                f,
                "resident {} bytes over limit {} bytes after pruning",
                resident_bytes, limit_bytes
            ),
            Self::CancelRequested => write!(f, "cancel requested"),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> Self {
        Self::CheckpointIo(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
