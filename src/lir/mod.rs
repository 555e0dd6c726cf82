//! Low-level IR: pseudo-x64 over virtual registers.
//!
//! Instruction selection ([`builder`]) destructs SSA and lowers each HIR
//! node to instructions from a closed catalog ([`instr`]), producing a
//! per-block [`Lir`] ([`program`]). Slow paths go out of line as stubs
//! ([`stub`]); all values live in virtual registers until allocation
//! ([`operand`]).

pub mod builder;
pub mod instr;
pub mod operand;
pub mod program;
pub mod stub;

pub use builder::select;
pub use instr::{BinOp, Condition, JumpTarget, LirInstr};
pub use operand::{Address, CpuRegister, Gpr, LirOperand, VirtualRegister, Xmm};
pub use program::Lir;
pub use stub::{CodeStub, Label, RuntimeStubs, StubId, StubKind};
