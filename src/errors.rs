use thiserror::Error;

/// Errors surfaced by the library core. The CLI binary wraps these in
/// `anyhow::Error` at its boundary.
#[derive(Error, Debug)]
pub enum KbError {
    #[error("unrecognized option: {0}")]
    UnrecognizedOption(String),
    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },
    #[error("missing or malformed .npy header in {path}: {reason}")]
    NpyHeader { path: String, reason: String },
    #[error("shape mismatch for {path}: expected {expected:?}, found {found:?}")]
    NpyShape {
        path: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("unknown entity or relation name: {0}")]
    UnknownName(String),
    #[error("malformed line in {path}: {line}")]
    MalformedLine { path: String, line: String },
    #[error("host callable failure: {0}")]
    HostCallable(#[from] HostCallableError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("params.json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type KbResult<T> = Result<T, KbError>;

/// Sum-typed failure codes returned by a `BatchSource` implementor that
/// bridges to a host runtime's user-supplied callable. The numeric
/// values match the original contract exactly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCallableError {
    #[error("a batch should be a (seed, paths) pair")]
    OuterShape = 1,
    #[error("paths not iterable")]
    PathsNotIterable = 2,
    #[error("some path not iterable")]
    PathNotIterable = 3,
    #[error("an edge should be a (relation, tail) pair")]
    BadEdgeTuple = 4,
    #[error("failed to build argument list")]
    ArgListBuild = 5,
}

impl HostCallableError {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::OuterShape),
            2 => Some(Self::PathsNotIterable),
            3 => Some(Self::PathNotIterable),
            4 => Some(Self::BadEdgeTuple),
            5 => Some(Self::ArgListBuild),
            _ => None,
        }
    }
}
