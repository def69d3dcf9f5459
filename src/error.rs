use std::path::PathBuf;

use crate::domain::ReferenceKind;

/// Process-level error: a message plus the exit code `psd` terminates with.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a single remote call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport(String),
    Timeout,
    Status(u16),
    Malformed(String),
    Empty,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchErrorKind::Timeout => write!(f, "request timed out"),
            FetchErrorKind::Status(code) => write!(f, "HTTP status {code}"),
            FetchErrorKind::Malformed(msg) => write!(f, "malformed body: {msg}"),
            FetchErrorKind::Empty => write!(f, "empty response"),
        }
    }
}

/// Output-contract failures raised while cleaning or validating records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CleaningError {
    #[error("{table} is missing required field `{field}`")]
    MissingSchemaField { table: &'static str, field: &'static str },
    #[error("record {index} violates the output contract: {reason}")]
    ContractViolation { index: usize, reason: String },
}

/// Per-request series failure. Collected, never propagated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("commodity {commodity_code} year {market_year}: {kind}")]
pub struct SeriesFetchError {
    pub commodity_code: String,
    pub market_year: i32,
    pub kind: FetchErrorKind,
}

/// Errors from reading a snapshot back for the dashboard.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot not found at {}; run `psd refresh` to build it", .0.display())]
    Missing(PathBuf),
    #[error("snapshot schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },
    #[error("snapshot I/O error at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

/// Fatal pipeline errors. Any of these aborts the run before the snapshot is touched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("credential missing: set {var} in the environment (or .env)")]
    CredentialMissing { var: String },
    #[error("failed to fetch {table} reference table: {kind}")]
    ReferenceFetch { table: ReferenceKind, kind: FetchErrorKind },
    #[error(transparent)]
    Cleaning(#[from] CleaningError),
    #[error("empty dataset after {stage}; refusing to overwrite the snapshot")]
    EmptyDataset { stage: &'static str },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::CredentialMissing { .. } | PipelineError::Config(_) => 2,
            PipelineError::EmptyDataset { .. } => 3,
            PipelineError::ReferenceFetch { .. } | PipelineError::Snapshot(_) => 4,
            PipelineError::Cleaning(_) => 5,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl From<SnapshotError> for AppError {
    fn from(err: SnapshotError) -> Self {
        PipelineError::from(err).into()
    }
}
