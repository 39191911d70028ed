use thiserror::Error;

use blockalloc::BlockError;

use crate::types::Tag;

/// Errors surfaced by heap operations. Allocation failures leave the heap in
/// the state it had before the failing call; the remaining kinds are raised
/// before any mutation happens.
#[derive(Debug, Error, PartialEq)]
pub enum HeapError {
    #[error("Out of memory!")]
    OutOfMemory,

    #[error("An invalid memory size allocation was requested!")]
    BadAllocationRequest,

    #[error("Type error: expected {expected}, found tag {found}")]
    TypeError { expected: &'static str, found: Tag },

    #[error("Attempt to unroot a cons that is not rooted")]
    NotRooted,

    #[error("Cons handle does not belong to this heap")]
    ForeignCons,

    #[error("Sweep requested while grey cells remain unscanned")]
    ScanIncomplete,

    #[error("Heap invariant violated: {0}")]
    Corrupt(String),
}

impl HeapError {
    /// True for the kinds a caller might recover from by freeing memory
    pub fn is_allocation_error(&self) -> bool {
        matches!(self, HeapError::OutOfMemory | HeapError::BadAllocationRequest)
    }
}

/// Convert from BlockError
impl From<BlockError> for HeapError {
    fn from(other: BlockError) -> HeapError {
        match other {
            BlockError::OOM | BlockError::LimitReached => HeapError::OutOfMemory,
            BlockError::BadRequest => HeapError::BadAllocationRequest,
        }
    }
}

/// Convenience shorthand function for building a type error
pub fn err_type(expected: &'static str, found: Tag) -> HeapError {
    HeapError::TypeError { expected, found }
}

/// Convenience shorthand function for building an invariant violation
pub fn err_corrupt(reason: String) -> HeapError {
    HeapError::Corrupt(reason)
}
