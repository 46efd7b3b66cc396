//! Sorting errors.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};
use std::io;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error: input, run or output file cannot be opened, read, created or written.
    IO(io::Error),
    /// Invalid sorter configuration (for example a run size smaller than one record).
    Configuration(String),
    /// Heap access on an empty heap. Signals a programming error rather than a runtime condition.
    PreconditionViolation(&'static str),
    /// Operation requested in a state where it cannot be performed.
    InvalidState(String),
    /// Input token that is not a signed decimal integer.
    MalformedInput { token: String, position: u64 },
    /// Run data cannot be decoded.
    Decode(String),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::IO(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            SortError::PreconditionViolation(msg) => write!(f, "precondition violated: {}", msg),
            SortError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            SortError::MalformedInput { token, position } => {
                write!(f, "malformed input token {:?} at record {}", token, position)
            }
            SortError::Decode(msg) => write!(f, "run data decoding error: {}", msg),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}

impl SortError {
    /// Returns `true` for errors that indicate a bug in the caller rather than an environment failure.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, SortError::PreconditionViolation(_) | SortError::InvalidState(_))
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io;

    use rstest::*;

    use super::SortError;

    #[rstest]
    #[case(SortError::IO(io::Error::new(io::ErrorKind::NotFound, "missing")), "I/O operation failed: missing")]
    #[case(SortError::Configuration("too small".to_string()), "invalid configuration: too small")]
    #[case(SortError::PreconditionViolation("heap is empty"), "precondition violated: heap is empty")]
    #[case(SortError::InvalidState("no runs".to_string()), "invalid state: no runs")]
    #[case(
        SortError::MalformedInput { token: "abc".to_string(), position: 3 },
        "malformed input token \"abc\" at record 3"
    )]
    fn test_display(#[case] err: SortError, #[case] expected: &str) {
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_io_error_source() {
        let err: SortError = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert!(err.source().is_some());
        assert!(!err.is_programming_error());
        assert!(SortError::PreconditionViolation("empty").is_programming_error());
    }
}
