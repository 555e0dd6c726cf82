//! One-shot local simplification of freshly built nodes.
//!
//! Every node is offered exactly one rewrite opportunity at construction
//! time: it may fold to a constant, collapse to an existing node
//! (identity elimination), or stay as-is. The transform never fails and
//! never returns an absent result — "no improvement" is [`Outcome::Keep`].
//!
//! Folding follows JVM evaluation rules: 32/64-bit wrapping arithmetic,
//! masked shift counts, and the NaN bias of fcmpl/fcmpg.

use crate::arena::Arena;
use crate::bytecode::*;
use crate::hir::node::{HirNode, NodeId, NodeKind};
use crate::hir::types::ConstValue;

/// Result of the one-shot rewrite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Outcome {
    /// No improvement; build the node as given.
    Keep,
    /// The node is equivalent to an already-existing node.
    Replace(NodeId),
    /// The node folds to a constant.
    Fold(ConstValue),
}

/// Offer a node-to-be its single local-rewrite opportunity.
pub(crate) fn apply(nodes: &Arena<HirNode>, kind: &NodeKind) -> Outcome {
    match *kind {
        NodeKind::Arith { op, left, right } => arith(nodes, op, left, right),
        NodeKind::Shift { op, left, right } => shift(nodes, op, left, right),
        NodeKind::Logic { op, left, right } => logic(nodes, op, left, right),
        NodeKind::Negate { operand } => negate(nodes, operand),
        NodeKind::Compare { op, left, right } => compare(nodes, op, left, right),
        NodeKind::Convert { op, operand } => convert(nodes, op, operand),
        _ => Outcome::Keep,
    }
}

fn constant_of(nodes: &Arena<HirNode>, id: NodeId) -> Option<ConstValue> {
    nodes.get(id).and_then(|n| n.value.as_constant())
}

// =============================================================================
// Arithmetic
// =============================================================================

fn arith(nodes: &Arena<HirNode>, op: u16, left: NodeId, right: NodeId) -> Outcome {
    let lc = constant_of(nodes, left);
    let rc = constant_of(nodes, right);

    if let (Some(l), Some(r)) = (lc, rc) {
        if let Some(folded) = fold_arith(op, l, r) {
            return Outcome::Fold(folded);
        }
    }

    // Identity elimination on one constant operand.
    match op {
        IADD | LADD => {
            if is_zero(rc) {
                return Outcome::Replace(left);
            }
            if is_zero(lc) {
                return Outcome::Replace(right);
            }
        }
        ISUB | LSUB => {
            if is_zero(rc) {
                return Outcome::Replace(left);
            }
        }
        IMUL | LMUL => {
            if is_one(rc) {
                return Outcome::Replace(left);
            }
            if is_one(lc) {
                return Outcome::Replace(right);
            }
            if is_zero(rc) || is_zero(lc) {
                return Outcome::Fold(zero_like(op));
            }
        }
        _ => {}
    }

    Outcome::Keep
}

fn fold_arith(op: u16, l: ConstValue, r: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match (op, l, r) {
        (IADD, Int(a), Int(b)) => Int(a.wrapping_add(b)),
        (ISUB, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
        (IMUL, Int(a), Int(b)) => Int(a.wrapping_mul(b)),
        // Division by a zero constant must trap at runtime, never fold.
        (IDIV, Int(a), Int(b)) if b != 0 => Int(a.wrapping_div(b)),
        (IREM, Int(a), Int(b)) if b != 0 => Int(a.wrapping_rem(b)),
        (LADD, Long(a), Long(b)) => Long(a.wrapping_add(b)),
        (LSUB, Long(a), Long(b)) => Long(a.wrapping_sub(b)),
        (LMUL, Long(a), Long(b)) => Long(a.wrapping_mul(b)),
        (LDIV, Long(a), Long(b)) if b != 0 => Long(a.wrapping_div(b)),
        (LREM, Long(a), Long(b)) if b != 0 => Long(a.wrapping_rem(b)),
        (FADD, Float(a), Float(b)) => Float(a + b),
        (FSUB, Float(a), Float(b)) => Float(a - b),
        (FMUL, Float(a), Float(b)) => Float(a * b),
        (FDIV, Float(a), Float(b)) => Float(a / b),
        (DADD, Double(a), Double(b)) => Double(a + b),
        (DSUB, Double(a), Double(b)) => Double(a - b),
        (DMUL, Double(a), Double(b)) => Double(a * b),
        (DDIV, Double(a), Double(b)) => Double(a / b),
        _ => return None,
    })
}

fn is_zero(c: Option<ConstValue>) -> bool {
    matches!(c, Some(ConstValue::Int(0)) | Some(ConstValue::Long(0)))
}

fn is_one(c: Option<ConstValue>) -> bool {
    matches!(c, Some(ConstValue::Int(1)) | Some(ConstValue::Long(1)))
}

fn zero_like(op: u16) -> ConstValue {
    match op {
        LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR => ConstValue::Long(0),
        _ => ConstValue::Int(0),
    }
}

// =============================================================================
// Shift / Logic / Negate
// =============================================================================

fn shift(nodes: &Arena<HirNode>, op: u16, left: NodeId, right: NodeId) -> Outcome {
    let lc = constant_of(nodes, left);
    let rc = constant_of(nodes, right);

    if let Some(ConstValue::Int(0)) = rc {
        return Outcome::Replace(left);
    }

    if let (Some(l), Some(ConstValue::Int(count))) = (lc, rc) {
        use ConstValue::*;
        let folded = match (op, l) {
            // Shift counts are masked per JVM semantics.
            (ISHL, Int(a)) => Some(Int(a.wrapping_shl(count as u32 & 0x1f))),
            (ISHR, Int(a)) => Some(Int(a.wrapping_shr(count as u32 & 0x1f))),
            (IUSHR, Int(a)) => Some(Int(((a as u32) >> (count as u32 & 0x1f)) as i32)),
            (LSHL, Long(a)) => Some(Long(a.wrapping_shl(count as u32 & 0x3f))),
            (LSHR, Long(a)) => Some(Long(a.wrapping_shr(count as u32 & 0x3f))),
            (LUSHR, Long(a)) => Some(Long(((a as u64) >> (count as u32 & 0x3f)) as i64)),
            _ => None,
        };
        if let Some(c) = folded {
            return Outcome::Fold(c);
        }
    }

    Outcome::Keep
}

fn logic(nodes: &Arena<HirNode>, op: u16, left: NodeId, right: NodeId) -> Outcome {
    if left == right {
        return match op {
            IAND | LAND | IOR | LOR => Outcome::Replace(left),
            IXOR | LXOR => Outcome::Fold(zero_like(op)),
            _ => Outcome::Keep,
        };
    }

    let lc = constant_of(nodes, left);
    let rc = constant_of(nodes, right);
    if let (Some(l), Some(r)) = (lc, rc) {
        use ConstValue::*;
        let folded = match (op, l, r) {
            (IAND, Int(a), Int(b)) => Some(Int(a & b)),
            (IOR, Int(a), Int(b)) => Some(Int(a | b)),
            (IXOR, Int(a), Int(b)) => Some(Int(a ^ b)),
            (LAND, Long(a), Long(b)) => Some(Long(a & b)),
            (LOR, Long(a), Long(b)) => Some(Long(a | b)),
            (LXOR, Long(a), Long(b)) => Some(Long(a ^ b)),
            _ => None,
        };
        if let Some(c) = folded {
            return Outcome::Fold(c);
        }
    }

    Outcome::Keep
}

fn negate(nodes: &Arena<HirNode>, operand: NodeId) -> Outcome {
    match constant_of(nodes, operand) {
        Some(ConstValue::Int(a)) => Outcome::Fold(ConstValue::Int(a.wrapping_neg())),
        Some(ConstValue::Long(a)) => Outcome::Fold(ConstValue::Long(a.wrapping_neg())),
        Some(ConstValue::Float(a)) => Outcome::Fold(ConstValue::Float(-a)),
        Some(ConstValue::Double(a)) => Outcome::Fold(ConstValue::Double(-a)),
        _ => Outcome::Keep,
    }
}

// =============================================================================
// Three-way compares and conversions
// =============================================================================

fn compare(nodes: &Arena<HirNode>, op: u16, left: NodeId, right: NodeId) -> Outcome {
    let (l, r) = match (constant_of(nodes, left), constant_of(nodes, right)) {
        (Some(l), Some(r)) => (l, r),
        _ => return Outcome::Keep,
    };

    use ConstValue::*;
    let result = match (op, l, r) {
        (LCMP, Long(a), Long(b)) => a.cmp(&b) as i32,
        (FCMPL, Float(a), Float(b)) | (FCMPG, Float(a), Float(b)) => {
            match a.partial_cmp(&b) {
                Some(ord) => ord as i32,
                // NaN biases toward -1 (fcmpl) or +1 (fcmpg).
                None if op == FCMPL => -1,
                None => 1,
            }
        }
        (DCMPL, Double(a), Double(b)) | (DCMPG, Double(a), Double(b)) => {
            match a.partial_cmp(&b) {
                Some(ord) => ord as i32,
                None if op == DCMPL => -1,
                None => 1,
            }
        }
        _ => return Outcome::Keep,
    };
    Outcome::Fold(ConstValue::Int(result))
}

fn convert(nodes: &Arena<HirNode>, op: u16, operand: NodeId) -> Outcome {
    let c = match constant_of(nodes, operand) {
        Some(c) => c,
        None => return Outcome::Keep,
    };

    use ConstValue::*;
    let folded = match (op, c) {
        (I2L, Int(a)) => Long(a as i64),
        (I2F, Int(a)) => Float(a as f32),
        (I2D, Int(a)) => Double(a as f64),
        (L2I, Long(a)) => Int(a as i32),
        (L2F, Long(a)) => Float(a as f32),
        (L2D, Long(a)) => Double(a as f64),
        (F2I, Float(a)) => Int(a as i32),
        (F2L, Float(a)) => Long(a as i64),
        (F2D, Float(a)) => Double(a as f64),
        (D2I, Double(a)) => Int(a as i32),
        (D2L, Double(a)) => Long(a as i64),
        (D2F, Double(a)) => Float(a as f32),
        (I2B, Int(a)) => Int(a as i8 as i32),
        (I2C, Int(a)) => Int(a as u16 as i32),
        (I2S, Int(a)) => Int(a as i16 as i32),
        _ => return Outcome::Keep,
    };
    Outcome::Fold(folded)
}
