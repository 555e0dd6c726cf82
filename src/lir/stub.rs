//! Out-of-line slow paths and the runtime interface.
//!
//! Fast-path code jumps to a [`CodeStub`] when it needs the runtime
//! (allocation, cast failure) and resumes at the stub's continuation
//! label. Stubs are arena-allocated per compilation and emitted after
//! the method body.
//!
//! The [`RuntimeStubs`] trait is the selector's only view of the VM:
//! stub entry points, class metadata addresses, and object layout
//! constants all come through it, which keeps tests runnable against a
//! plain mock.

use smallvec::SmallVec;
use std::fmt;

use crate::arena::Id;
use crate::hir::types::{ClassId, ValueKind};
use crate::lir::operand::LirOperand;

/// Which runtime entry a stub calls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubKind {
    NewInstance,
    NewArray,
    NewMultiArray,
    ClassCastException,
}

impl fmt::Display for StubKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StubKind::NewInstance => "new_instance",
            StubKind::NewArray => "new_array",
            StubKind::NewMultiArray => "new_multi_array",
            StubKind::ClassCastException => "class_cast_exception",
        };
        f.write_str(s)
    }
}

/// A fast-path resume point, unique within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Identifier of an arena-allocated stub.
pub type StubId = Id<CodeStub>;

/// One out-of-line slow path.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeStub {
    pub kind: StubKind,
    /// Runtime entry point the stub calls.
    pub address: u64,
    /// Where fast-path execution resumes.
    pub continuation: Label,
    /// Operands the stub hands to the runtime.
    pub operands: SmallVec<[LirOperand; 3]>,
}

impl fmt::Display for CodeStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stub {} @{:#x} resume {}",
            self.kind, self.address, self.continuation
        )?;
        for op in &self.operands {
            write!(f, " {}", op)?;
        }
        Ok(())
    }
}

// =============================================================================
// Runtime interface
// =============================================================================

/// The selector's window into the VM runtime.
pub trait RuntimeStubs {
    /// Entry point address of a runtime stub.
    fn stub_address(&self, kind: StubKind) -> u64;

    /// Address of the class metadata for `class`, passed to allocation
    /// stubs in a register.
    fn klass_pointer(&self, class: ClassId) -> u64;

    /// Byte offset of the length field in an array object.
    fn array_length_offset(&self) -> i32;

    /// Byte offset of the first element for arrays of `elem`.
    fn array_base_offset(&self, elem: ValueKind) -> i32;
}
