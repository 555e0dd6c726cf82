//! LIR operands: virtual registers, constants, and addresses.
//!
//! Register allocation happens later, so every computed value lives in a
//! [`VirtualRegister`]. A virtual register may be *pinned* to a physical
//! register when an instruction or calling convention demands one (shift
//! counts in RCX, allocation inputs, return values); the allocator must
//! honor the pin.

use std::fmt;

use crate::hir::types::{ConstValue, ValueKind};

// =============================================================================
// Physical registers
// =============================================================================

/// x64 general-purpose register with hardware encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

/// SSE register for floating-point values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
    Xmm3 = 3,
    Xmm4 = 4,
    Xmm5 = 5,
    Xmm6 = 6,
    Xmm7 = 7,
}

/// Either register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuRegister {
    Gpr(Gpr),
    Xmm(Xmm),
}

impl fmt::Display for CpuRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuRegister::Gpr(r) => write!(f, "{}", format!("{:?}", r).to_lowercase()),
            CpuRegister::Xmm(r) => write!(f, "{}", format!("{:?}", r).to_lowercase()),
        }
    }
}

/// Register that carries a method's return value, by kind.
pub fn return_register(kind: ValueKind) -> CpuRegister {
    if kind.is_float() {
        CpuRegister::Xmm(Xmm::Xmm0)
    } else {
        CpuRegister::Gpr(Gpr::Rax)
    }
}

// =============================================================================
// Virtual registers
// =============================================================================

/// A placeholder register named by the selector and bound by the
/// allocator. `pinned` records a hard physical-register requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualRegister {
    pub id: u32,
    pub kind: ValueKind,
    pub pinned: Option<CpuRegister>,
}

impl VirtualRegister {
    pub fn new(id: u32, kind: ValueKind) -> Self {
        VirtualRegister {
            id,
            kind,
            pinned: None,
        }
    }

    pub fn pinned_to(id: u32, kind: ValueKind, reg: CpuRegister) -> Self {
        VirtualRegister {
            id,
            kind,
            pinned: Some(reg),
        }
    }
}

impl fmt::Display for VirtualRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}|{}", self.id, self.kind)?;
        if let Some(reg) = self.pinned {
            write!(f, "({})", reg)?;
        }
        Ok(())
    }
}

// =============================================================================
// Operands
// =============================================================================

/// A memory operand: `[base + index*scale + disp]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub base: Box<LirOperand>,
    pub index: Option<Box<LirOperand>>,
    /// Element scale: 1, 2, 4 or 8.
    pub scale: u8,
    pub disp: i32,
    pub kind: ValueKind,
}

impl Address {
    /// `[base + disp]`
    pub fn offset(base: LirOperand, disp: i32, kind: ValueKind) -> Self {
        Address {
            base: Box::new(base),
            index: None,
            scale: 1,
            disp,
            kind,
        }
    }

    /// `[base + index*scale + disp]`
    pub fn indexed(base: LirOperand, index: LirOperand, scale: u8, disp: i32, kind: ValueKind) -> Self {
        Address {
            base: Box::new(base),
            index: Some(Box::new(index)),
            scale,
            disp,
            kind,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.base)?;
        if let Some(index) = &self.index {
            write!(f, " + {}*{}", index, self.scale)?;
        }
        if self.disp != 0 {
            write!(f, " + {}", self.disp)?;
        }
        write!(f, "]")
    }
}

/// Any value an LIR instruction can name.
#[derive(Debug, Clone, PartialEq)]
pub enum LirOperand {
    /// No value (void returns, unused result slots).
    Illegal,
    Reg(VirtualRegister),
    Const(ConstValue),
    Addr(Address),
}

impl LirOperand {
    #[inline]
    pub fn is_illegal(&self) -> bool {
        matches!(self, LirOperand::Illegal)
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, LirOperand::Const(_))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            LirOperand::Illegal => ValueKind::Illegal,
            LirOperand::Reg(r) => r.kind,
            LirOperand::Const(c) => c.kind(),
            LirOperand::Addr(a) => a.kind,
        }
    }

    /// The virtual register, if this operand is one.
    pub fn as_reg(&self) -> Option<VirtualRegister> {
        match self {
            LirOperand::Reg(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for LirOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LirOperand::Illegal => f.write_str("-"),
            LirOperand::Reg(r) => write!(f, "{}", r),
            LirOperand::Const(c) => write!(f, "{}", c),
            LirOperand::Addr(a) => write!(f, "{}", a),
        }
    }
}
