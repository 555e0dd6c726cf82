//! LIR instruction set.
//!
//! A small x64-flavored pseudo-instruction vocabulary over virtual
//! registers. The catalog is a closed enum, so the emitter downstream
//! dispatches with an exhaustive `match`. Binary arithmetic is
//! two-operand (`dest op= src`); the selector materializes the extra
//! `Mov` when the destination is a fresh register.

use smallvec::SmallVec;
use std::fmt;

use crate::bytecode::{self, *};
use crate::hir::node::{BarrierKind, BlockId};
use crate::hir::types::{ClassRef, MethodRef, ValueKind};
use crate::lir::operand::LirOperand;
use crate::lir::stub::{Label, StubId};

// =============================================================================
// Branch plumbing
// =============================================================================

/// Where a jump lands: another block's code, or an out-of-line stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    Block(BlockId),
    Stub(StubId),
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Block(b) => write!(f, "B{}", b.index()),
            JumpTarget::Stub(s) => write!(f, "stub{}", s.index()),
        }
    }
}

/// Condition code for conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    /// Condition implied by a branch opcode, if it is one.
    pub fn from_branch(op: u16) -> Option<Condition> {
        Some(match op {
            IFEQ | IF_ICMPEQ | IF_ACMPEQ | IFNULL => Condition::Eq,
            IFNE | IF_ICMPNE | IF_ACMPNE | IFNONNULL => Condition::Ne,
            IFLT | IF_ICMPLT => Condition::Lt,
            IFGE | IF_ICMPGE => Condition::Ge,
            IFGT | IF_ICMPGT => Condition::Gt,
            IFLE | IF_ICMPLE => Condition::Le,
            _ => return None,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Lt => "lt",
            Condition::Ge => "ge",
            Condition::Gt => "gt",
            Condition::Le => "le",
        };
        f.write_str(s)
    }
}

/// Two-operand integer/float ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
            BinOp::Ushr => "ushr",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// One LIR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum LirInstr {
    /// Method prologue marker at the entry block.
    NormalEntry,

    /// Continuation point for a stub's resume jump.
    Label { label: Label },

    Jmp { target: JumpTarget },

    Branch { cond: Condition, target: JumpTarget },

    Cmp { left: LirOperand, right: LirOperand },

    Mov { dest: LirOperand, src: LirOperand },

    /// `dest op= src`; `dest` is both input and output.
    Op2 {
        op: BinOp,
        dest: LirOperand,
        src: LirOperand,
    },

    Neg { dest: LirOperand },

    /// Three-way float compare with explicit NaN bias.
    Fcmp {
        dest: LirOperand,
        left: LirOperand,
        right: LirOperand,
        /// NaN compares as less-than (fcmpl/dcmpl) rather than greater.
        unordered_less: bool,
    },

    /// Three-way long compare.
    Lcmp {
        dest: LirOperand,
        left: LirOperand,
        right: LirOperand,
    },

    /// Primitive conversion, tagged with the originating opcode.
    TypeCast {
        op: u16,
        dest: LirOperand,
        src: LirOperand,
    },

    InstanceOf {
        dest: LirOperand,
        object: LirOperand,
        class: ClassRef,
    },

    /// Checked cast; branches to `stub` on failure.
    CheckCast {
        object: LirOperand,
        class: ClassRef,
        stub: StubId,
    },

    TableSwitch {
        index: LirOperand,
        low: i32,
        high: i32,
        targets: Vec<BlockId>,
        default: BlockId,
    },

    Membar { kind: BarrierKind },

    /// Direct call into the runtime.
    CallRt {
        dest: LirOperand,
        address: u64,
        args: SmallVec<[LirOperand; 4]>,
    },

    /// Array allocation fast path with its slow-path stub.
    AllocateArray {
        stub: StubId,
        klass: LirOperand,
        result: LirOperand,
        length: LirOperand,
        temps: [LirOperand; 4],
        elem: ValueKind,
    },

    /// Java-level method call.
    Call {
        dest: LirOperand,
        method: MethodRef,
        args: Vec<LirOperand>,
    },

    MonitorEnter { object: LirOperand },

    MonitorExit { object: LirOperand },

    Throw { exception: LirOperand },

    /// Method return; `value` is `Illegal` for void.
    Return { value: LirOperand },
}

impl LirInstr {
    /// Short mnemonic for dumps.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            LirInstr::NormalEntry => "normal_entry",
            LirInstr::Label { .. } => "label",
            LirInstr::Jmp { .. } => "jmp",
            LirInstr::Branch { .. } => "br",
            LirInstr::Cmp { .. } => "cmp",
            LirInstr::Mov { .. } => "mov",
            LirInstr::Op2 { .. } => "op2",
            LirInstr::Neg { .. } => "neg",
            LirInstr::Fcmp { .. } => "fcmp",
            LirInstr::Lcmp { .. } => "lcmp",
            LirInstr::TypeCast { .. } => "typecast",
            LirInstr::InstanceOf { .. } => "instanceof",
            LirInstr::CheckCast { .. } => "checkcast",
            LirInstr::TableSwitch { .. } => "tableswitch",
            LirInstr::Membar { .. } => "membar",
            LirInstr::CallRt { .. } => "call_rt",
            LirInstr::AllocateArray { .. } => "allocate_array",
            LirInstr::Call { .. } => "call",
            LirInstr::MonitorEnter { .. } => "monitor_enter",
            LirInstr::MonitorExit { .. } => "monitor_exit",
            LirInstr::Throw { .. } => "throw",
            LirInstr::Return { .. } => "return",
        }
    }
}

impl fmt::Display for LirInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LirInstr::NormalEntry => f.write_str("normal_entry"),
            LirInstr::Label { label } => write!(f, "{}:", label),
            LirInstr::Jmp { target } => write!(f, "jmp {}", target),
            LirInstr::Branch { cond, target } => write!(f, "br.{} {}", cond, target),
            LirInstr::Cmp { left, right } => write!(f, "cmp {}, {}", left, right),
            LirInstr::Mov { dest, src } => write!(f, "mov {}, {}", dest, src),
            LirInstr::Op2 { op, dest, src } => write!(f, "{} {}, {}", op, dest, src),
            LirInstr::Neg { dest } => write!(f, "neg {}", dest),
            LirInstr::Fcmp {
                dest,
                left,
                right,
                unordered_less,
            } => write!(
                f,
                "fcmp{} {}, {}, {}",
                if *unordered_less { "l" } else { "g" },
                dest,
                left,
                right
            ),
            LirInstr::Lcmp { dest, left, right } => {
                write!(f, "lcmp {}, {}, {}", dest, left, right)
            }
            LirInstr::TypeCast { op, dest, src } => {
                write!(f, "{} {}, {}", bytecode::name(*op), dest, src)
            }
            LirInstr::InstanceOf {
                dest,
                object,
                class,
            } => write!(f, "instanceof {}, {}, {}", dest, object, class.name),
            LirInstr::CheckCast {
                object,
                class,
                stub,
            } => write!(f, "checkcast {}, {} (stub{})", object, class.name, stub.index()),
            LirInstr::TableSwitch {
                index,
                low,
                high,
                targets,
                default,
            } => {
                write!(f, "tableswitch {} [{}..{}]", index, low, high)?;
                for t in targets {
                    write!(f, " B{}", t.index())?;
                }
                write!(f, " default B{}", default.index())
            }
            LirInstr::Membar { kind } => write!(f, "membar {:?}", kind),
            LirInstr::CallRt {
                dest,
                address,
                args,
            } => {
                write!(f, "call_rt {:#x}", address)?;
                for a in args {
                    write!(f, " {}", a)?;
                }
                if !dest.is_illegal() {
                    write!(f, " -> {}", dest)?;
                }
                Ok(())
            }
            LirInstr::AllocateArray {
                stub,
                klass,
                result,
                length,
                elem,
                ..
            } => write!(
                f,
                "allocate_array[{}] {}, len={}, klass={} (stub{})",
                elem,
                result,
                length,
                klass,
                stub.index()
            ),
            LirInstr::Call { dest, method, args } => {
                write!(f, "call {}", method.name)?;
                for a in args {
                    write!(f, " {}", a)?;
                }
                if !dest.is_illegal() {
                    write!(f, " -> {}", dest)?;
                }
                Ok(())
            }
            LirInstr::MonitorEnter { object } => write!(f, "monitor_enter {}", object),
            LirInstr::MonitorExit { object } => write!(f, "monitor_exit {}", object),
            LirInstr::Throw { exception } => write!(f, "throw {}", exception),
            LirInstr::Return { value } => {
                if value.is_illegal() {
                    f.write_str("return")
                } else {
                    write!(f, "return {}", value)
                }
            }
        }
    }
}
