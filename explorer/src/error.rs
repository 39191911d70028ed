use std::error::Error;
use std::fmt;
use std::io;

use rustyline::error::ReadlineError;

use tricolor::HeapError;

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    IOError(String),
    CommandError(String),
    UnboundName(String),
    Heap(HeapError),
}

/// An explorer session error, optionally tagged with the command file line
/// it came from
#[derive(Debug, PartialEq)]
pub struct ExplorerError {
    kind: ErrorKind,
    line: Option<usize>,
}

impl ExplorerError {
    pub fn new(kind: ErrorKind) -> ExplorerError {
        ExplorerError { kind, line: None }
    }

    pub fn at_line(self, line: usize) -> ExplorerError {
        ExplorerError {
            kind: self.kind,
            line: Some(line),
        }
    }

    pub fn error_kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// IO failures end a session; everything else is reported and skipped
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::IOError(_))
    }
}

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }

        match self.kind {
            ErrorKind::IOError(ref reason) => write!(f, "IO Error: {}", reason),
            ErrorKind::CommandError(ref reason) => write!(f, "Command error: {}", reason),
            ErrorKind::UnboundName(ref name) => write!(f, "Name '{}' is not bound", name),
            ErrorKind::Heap(ref e) => write!(f, "Heap error: {}", e),
        }
    }
}

impl Error for ExplorerError {}

/// Convert from io::Error
impl From<io::Error> for ExplorerError {
    fn from(other: io::Error) -> ExplorerError {
        ExplorerError::new(ErrorKind::IOError(format!("{}", other)))
    }
}

/// Convert from ReadlineError
impl From<ReadlineError> for ExplorerError {
    fn from(other: ReadlineError) -> ExplorerError {
        ExplorerError::new(ErrorKind::IOError(format!("{}", other)))
    }
}

/// Convert from HeapError
impl From<HeapError> for ExplorerError {
    fn from(other: HeapError) -> ExplorerError {
        ExplorerError::new(ErrorKind::Heap(other))
    }
}

/// Convenience shorthand function for building a command error
pub fn err_command(reason: &str) -> ExplorerError {
    ExplorerError::new(ErrorKind::CommandError(String::from(reason)))
}

/// Convenience shorthand function for building an unbound name error
pub fn err_unbound(name: &str) -> ExplorerError {
    ExplorerError::new(ErrorKind::UnboundName(String::from(name)))
}
