//! SSA node definitions for the high-level IR.
//!
//! Each node is a typed SSA value owned by exactly one basic block; its
//! arena index is its process-unique-within-the-compilation id. Node
//! kinds form a closed tagged union so the instruction selector can
//! dispatch with an exhaustive `match` — impossible cases are compile
//! errors, not runtime assertions.
//!
//! Terminators are ordinary node kinds; the successor edges they imply
//! are stored once, on the owning block (see `graph.rs`).

use smallvec::SmallVec;

use super::types::{ClassRef, FieldRef, MethodRef, Value, ValueKind};
use crate::arena::Id;

/// Unique identifier for an SSA node.
pub type NodeId = Id<HirNode>;

/// Block identifier, defined here to avoid a module cycle with `graph.rs`.
pub type BlockId = Id<super::graph::Block>;

// =============================================================================
// Node
// =============================================================================

/// A single SSA node: its value and operation.
#[derive(Debug, Clone)]
pub struct HirNode {
    /// Typed result slot, immutable once attached.
    pub value: Value,

    /// Bytecode offset this node was materialized at.
    pub bci: u32,

    /// What the node computes.
    pub kind: NodeKind,
}

impl HirNode {
    /// Kind tag of the node's value.
    #[inline]
    pub fn value_kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Check if this node is a phi.
    #[inline]
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, NodeKind::Phi { .. })
    }

    /// Check if this node kind terminates a block.
    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.kind.is_terminator()
    }
}

// =============================================================================
// Phi slot index
// =============================================================================

/// Which abstract-machine slot a phi merges.
///
/// The original encoding used a signed index (negative for stack); a
/// two-variant enum says the same thing without the sign trick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhiSlot {
    Stack(u16),
    Local(u16),
}

// =============================================================================
// Memory barriers
// =============================================================================

/// Ordering constraint emitted around volatile accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    LoadLoad,
    LoadStore,
    StoreStore,
    StoreLoad,
}

// =============================================================================
// Node kinds
// =============================================================================

/// The closed catalog of SSA operation kinds.
///
/// Binary operations carry the raw bytecode opcode so the selector can
/// pick the exact mnemonic (iadd vs fadd, fcmpl vs fcmpg) without a
/// parallel enum.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Compile-time constant; payload lives in the node's `Value`.
    Constant,

    /// Incoming method parameter.
    Param { index: u16 },

    /// Binary arithmetic (iadd..drem family).
    Arith { op: u16, left: NodeId, right: NodeId },

    /// Shift (ishl..lushr family).
    Shift { op: u16, left: NodeId, right: NodeId },

    /// Bitwise logic (iand..lxor family).
    Logic { op: u16, left: NodeId, right: NodeId },

    /// Arithmetic negation.
    Negate { operand: NodeId },

    /// Three-way compare (lcmp, fcmpl/g, dcmpl/g).
    Compare { op: u16, left: NodeId, right: NodeId },

    /// Primitive conversion (i2l..i2s family).
    Convert { op: u16, operand: NodeId },

    /// Field read; `object` is `None` for statics.
    LoadField {
        object: Option<NodeId>,
        field: FieldRef,
    },

    /// Field write; `object` is `None` for statics.
    StoreField {
        object: Option<NodeId>,
        field: FieldRef,
        value: NodeId,
    },

    /// Array element read.
    LoadIndex {
        array: NodeId,
        index: NodeId,
        elem: ValueKind,
    },

    /// Array element write.
    StoreIndex {
        array: NodeId,
        index: NodeId,
        elem: ValueKind,
        value: NodeId,
    },

    /// Array length read.
    ArrayLength { array: NodeId },

    /// Object allocation (slow path via runtime stub).
    NewInstance { class: ClassRef },

    /// Primitive array allocation.
    NewTypeArray { elem: ValueKind, length: NodeId },

    /// Reference array allocation.
    NewObjectArray { class: ClassRef, length: NodeId },

    /// Multi-dimensional array allocation.
    NewMultiArray { class: ClassRef, sizes: Vec<NodeId> },

    /// Checked reference cast; always linked to a cast-failure stub.
    CheckCast { class: ClassRef, object: NodeId },

    /// Dynamic type test producing an int.
    InstanceOf { class: ClassRef, object: NodeId },

    /// Method invocation; `receiver` is `None` for static calls.
    Call {
        target: MethodRef,
        receiver: Option<NodeId>,
        args: Vec<NodeId>,
    },

    MonitorEnter { object: NodeId },

    MonitorExit { object: NodeId },

    /// Explicit memory ordering point.
    MemBarrier { kind: BarrierKind },

    /// Merge-point placeholder; inputs accumulate one per predecessor
    /// edge as merges are processed.
    Phi {
        slot: PhiSlot,
        block: BlockId,
        inputs: SmallVec<[NodeId; 2]>,
    },

    // -------------------------------------------------------------------------
    // Terminators. Successor edges live on the owning block.
    // -------------------------------------------------------------------------
    /// Unconditional jump to the sole successor.
    Goto,

    /// Conditional branch; successor 0 is taken, successor 1 falls
    /// through. Single-operand bytecode forms compare against a
    /// materialized zero/null constant in `right`.
    If { op: u16, left: NodeId, right: NodeId },

    /// Dense switch; successors are `[low..=high]` targets then default.
    TableSwitch { index: NodeId, low: i32, high: i32 },

    /// Sparse switch; successors parallel `keys`, then default.
    LookupSwitch { key: NodeId, keys: Vec<i32> },

    /// Method return; `None` for void.
    Return { value: Option<NodeId> },

    /// Exception throw.
    Throw { exception: NodeId },
}

impl NodeKind {
    /// Check if this kind terminates a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            NodeKind::Goto
                | NodeKind::If { .. }
                | NodeKind::TableSwitch { .. }
                | NodeKind::LookupSwitch { .. }
                | NodeKind::Return { .. }
                | NodeKind::Throw { .. }
        )
    }

    /// Short mnemonic for dumps.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            NodeKind::Constant => "const",
            NodeKind::Param { .. } => "param",
            NodeKind::Arith { .. } => "arith",
            NodeKind::Shift { .. } => "shift",
            NodeKind::Logic { .. } => "logic",
            NodeKind::Negate { .. } => "neg",
            NodeKind::Compare { .. } => "cmp3",
            NodeKind::Convert { .. } => "convert",
            NodeKind::LoadField { .. } => "load_field",
            NodeKind::StoreField { .. } => "store_field",
            NodeKind::LoadIndex { .. } => "load_index",
            NodeKind::StoreIndex { .. } => "store_index",
            NodeKind::ArrayLength { .. } => "array_len",
            NodeKind::NewInstance { .. } => "new",
            NodeKind::NewTypeArray { .. } => "new_type_array",
            NodeKind::NewObjectArray { .. } => "new_obj_array",
            NodeKind::NewMultiArray { .. } => "new_multi_array",
            NodeKind::CheckCast { .. } => "checkcast",
            NodeKind::InstanceOf { .. } => "instanceof",
            NodeKind::Call { .. } => "call",
            NodeKind::MonitorEnter { .. } => "monitor_enter",
            NodeKind::MonitorExit { .. } => "monitor_exit",
            NodeKind::MemBarrier { .. } => "membar",
            NodeKind::Phi { .. } => "phi",
            NodeKind::Goto => "goto",
            NodeKind::If { .. } => "if",
            NodeKind::TableSwitch { .. } => "tableswitch",
            NodeKind::LookupSwitch { .. } => "lookupswitch",
            NodeKind::Return { .. } => "return",
            NodeKind::Throw { .. } => "throw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode;

    #[test]
    fn test_terminator_classification() {
        assert!(NodeKind::Goto.is_terminator());
        assert!(NodeKind::Return { value: None }.is_terminator());
        assert!(NodeKind::If {
            op: bytecode::IFEQ,
            left: NodeId::new(0),
            right: NodeId::new(1),
        }
        .is_terminator());

        assert!(!NodeKind::Constant.is_terminator());
        assert!(!NodeKind::Param { index: 0 }.is_terminator());
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(NodeKind::Constant.mnemonic(), "const");
        assert_eq!(NodeKind::Goto.mnemonic(), "goto");
    }
}
