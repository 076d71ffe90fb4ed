//! Error types for lowering and execution.
//!
//! Diagnostics here are flat and single-line by design: unlike the windowed,
//! ANSI-highlighted lints a source-level compiler would want, a lowering or
//! execution failure here carries just enough position information for the
//! caller to print one line and exit.

use thiserror::Error;

/// Failure while lowering source bytes into IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LowerError {
    /// A `]` was encountered with no matching open `[`.
    #[error("unbalanced ']' at byte {at}")]
    UnbalancedClose { at: usize },
    /// Source ended with one or more `[` left unmatched.
    #[error("unclosed '[' (ir index {at})")]
    UnclosedOpen { at: usize },
}

/// Failure while executing IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The tape pointer moved outside `[0, T)`.
    #[error("tape pointer out of bounds at pc {pc}, sp {sp}")]
    OutOfBounds { pc: usize, sp: i64 },
}
