//! Compilation error model.
//!
//! Three kinds of failure can end a compilation, all local to the method
//! being compiled (see the concurrency notes in `lib.rs`):
//!
//! - **Bailout**: the method is deliberately abandoned (unsupported
//!   lowering, type instability at a loop header). Callers fall back to
//!   the interpreter; nothing is wrong with the compiler.
//! - **Internal**: a "should not reach here" defect — a node kind arrived
//!   at a path that assumes it is impossible, or an invariant broke.
//! - **StackOverflow**: the abstract operand stack exceeded the method's
//!   declared maximum. Always a block-construction defect, never a
//!   property of legitimate input, so it carries full context.
//!
//! None of these are retried; none escape the compilation that raised
//! them.

use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type CompileResult<T> = Result<T, CompileError>;

/// Why a method compilation ended without producing LIR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Deliberate abandonment; the caller falls back to interpretation.
    #[error("bailed out of compilation: {reason}")]
    Bailout { reason: String },

    /// Compiler-logic defect: an impossible case was reached.
    #[error("internal compiler error: {0}")]
    Internal(String),

    /// The abstract operand stack exceeded its declared bound.
    #[error("operand stack exceeded {limit} entries in block #{block} at bci {bci}")]
    StackOverflow { limit: usize, block: u32, bci: u32 },
}

impl CompileError {
    /// Construct a bailout with the given reason.
    pub fn bailout(reason: impl Into<String>) -> Self {
        CompileError::Bailout {
            reason: reason.into(),
        }
    }

    /// Construct an internal invariant violation.
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }

    /// True if this error is a recoverable bailout rather than a defect.
    pub fn is_bailout(&self) -> bool {
        matches!(self, CompileError::Bailout { .. })
    }
}

/// Shorthand for `Err(CompileError::bailout(..))`.
pub fn bail_out<T>(reason: impl Into<String>) -> CompileResult<T> {
    Err(CompileError::bailout(reason))
}
