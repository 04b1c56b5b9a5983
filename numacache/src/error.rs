use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised while building a cache system or replaying a trace
///
/// Cache operations themselves never fail once the cache is constructed
#[derive(Debug)]
pub enum CacheError {
    /// The number of lines isn't a multiple of the associativity
    Geometry { num_lines: u64, associativity: u64 },
    ZeroAssociativity,
    InvalidConfig(String),
    /// A trace record named a thread with no entry in the thread to domain map
    UnknownThread { tid: usize },
    /// A trace line which isn't a comment and can't be parsed, with its 1-based line number
    MalformedTrace { line: u64, content: String },
    Io(std::io::Error),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Geometry { num_lines, associativity } => write!(
                f,
                "{num_lines} cache lines can't be split into sets of {associativity}"
            ),
            CacheError::ZeroAssociativity => write!(f, "associativity must be at least 1"),
            CacheError::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            CacheError::UnknownThread { tid } => {
                write!(f, "thread {tid} isn't mapped to a cache domain")
            }
            CacheError::MalformedTrace { line, content } => {
                write!(f, "malformed trace record on line {line}: {content:?}")
            }
            CacheError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
