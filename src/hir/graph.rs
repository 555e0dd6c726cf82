//! Basic blocks and the SSA graph.
//!
//! A [`Block`] owns its nodes, its terminator, and both edge directions:
//! - **Edges stored once**: successors are fixed by [`HirGraph::seal`],
//!   which also registers the reverse edge; no separate jump nodes
//! - **Terminator as part of the record**: a block is complete exactly
//!   when its terminator is set, and sealing twice is an internal error
//! - **Entry states**: each block remembers the abstract frame at its
//!   entry; [`HirGraph::merge_into`] reconciles incoming frames and
//!   inserts phis where values disagree
//!
//! Loop headers get eager phis on the first (forward) merge so the back
//! edge can always append its input without re-walking the body.

use smallvec::SmallVec;

use crate::error::{CompileError, CompileResult};
use crate::hir::ideal;
use crate::hir::node::{BlockId, HirNode, NodeId, NodeKind, PhiSlot};
use crate::hir::state::VmState;
use crate::hir::types::{ClassRef, Value, ValueKind};
use crate::arena::Arena;

bitflags::bitflags! {
    /// Per-block property bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Target of at least one back edge.
        const LOOP_HEADER = 1 << 0;
        /// Contains an instruction that may raise an exception.
        const MAY_THROW = 1 << 1;
    }
}

/// Exception handler covering a block, pre-resolved by the scope pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub handler_bci: u32,
    /// `None` catches everything (finally ranges).
    pub catch_type: Option<ClassRef>,
}

// =============================================================================
// Block
// =============================================================================

/// A basic block: node list, phi list, terminator, and both edge sets.
#[derive(Debug, Clone)]
pub struct Block {
    pub start_bci: u32,
    pub end_bci: u32,
    pub flags: BlockFlags,
    pub handler: Option<ExceptionHandler>,

    /// Non-phi nodes in evaluation order.
    pub nodes: Vec<NodeId>,
    /// Phis owned by this block, kept apart from the body.
    pub phis: Vec<NodeId>,
    /// Set exactly once, by `seal`.
    pub terminator: Option<NodeId>,

    pub successors: SmallVec<[BlockId; 2]>,
    pub predecessors: SmallVec<[BlockId; 2]>,

    /// Abstract frame at block entry; populated by the first merge.
    pub entry_state: Option<VmState>,
    /// How many predecessor edges have been merged so far.
    merged_preds: u32,
}

impl Block {
    fn new(start_bci: u32, end_bci: u32) -> Self {
        Block {
            start_bci,
            end_bci,
            flags: BlockFlags::empty(),
            handler: None,
            nodes: Vec::new(),
            phis: Vec::new(),
            terminator: None,
            successors: SmallVec::new(),
            predecessors: SmallVec::new(),
            entry_state: None,
            merged_preds: 0,
        }
    }

    #[inline]
    pub fn is_loop_header(&self) -> bool {
        self.flags.contains(BlockFlags::LOOP_HEADER)
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.terminator.is_some()
    }
}

// =============================================================================
// Graph
// =============================================================================

/// The whole method in SSA form: node arena, block arena, entry block.
#[derive(Debug, Clone)]
pub struct HirGraph {
    pub nodes: Arena<HirNode>,
    pub blocks: Arena<Block>,
    entry: BlockId,
}

impl HirGraph {
    pub fn new() -> Self {
        let mut blocks = Arena::new();
        let entry = blocks.alloc(Block::new(0, 0));
        HirGraph {
            nodes: Arena::new(),
            blocks,
            entry,
        }
    }

    #[inline]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn new_block(&mut self, start_bci: u32, end_bci: u32) -> BlockId {
        self.blocks.alloc(Block::new(start_bci, end_bci))
    }

    pub fn node(&self, id: NodeId) -> &HirNode {
        &self.nodes[id]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    /// Kind tag of a node's value.
    #[inline]
    pub fn kind_of(&self, id: NodeId) -> ValueKind {
        self.nodes[id].value_kind()
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    /// Append a node to a block, after offering it its one local-rewrite
    /// opportunity. Folded or replaced nodes never enter the block body.
    pub fn append(&mut self, block: BlockId, bci: u32, result: ValueKind, kind: NodeKind) -> NodeId {
        match ideal::apply(&self.nodes, &kind) {
            ideal::Outcome::Replace(existing) => existing,
            ideal::Outcome::Fold(c) => self.append_raw(
                block,
                HirNode {
                    value: Value::constant(c),
                    bci,
                    kind: NodeKind::Constant,
                },
            ),
            ideal::Outcome::Keep => self.append_raw(
                block,
                HirNode {
                    value: Value::of(result),
                    bci,
                    kind,
                },
            ),
        }
    }

    /// Materialize a constant into a block.
    pub fn append_const(&mut self, block: BlockId, bci: u32, c: crate::hir::types::ConstValue) -> NodeId {
        self.append_raw(
            block,
            HirNode {
                value: Value::constant(c),
                bci,
                kind: NodeKind::Constant,
            },
        )
    }

    fn append_raw(&mut self, block: BlockId, node: HirNode) -> NodeId {
        let id = self.nodes.alloc(node);
        self.blocks[block].nodes.push(id);
        id
    }

    /// Materialize a parameter node into the entry block.
    pub fn append_param(&mut self, index: u16, kind: ValueKind) -> NodeId {
        let entry = self.entry;
        self.append_raw(
            entry,
            HirNode {
                value: Value::of(kind),
                bci: 0,
                kind: NodeKind::Param { index },
            },
        )
    }

    /// Set a block's terminator and its successor edges, exactly once.
    /// Reverse edges are registered on each successor.
    pub fn seal(
        &mut self,
        block: BlockId,
        bci: u32,
        kind: NodeKind,
        successors: &[BlockId],
    ) -> CompileResult<NodeId> {
        if !kind.is_terminator() {
            return Err(CompileError::internal(format!(
                "sealing block {:?} with non-terminator {}",
                block,
                kind.mnemonic()
            )));
        }
        if self.blocks[block].is_sealed() {
            return Err(CompileError::internal(format!(
                "block {:?} sealed twice",
                block
            )));
        }

        let id = self.nodes.alloc(HirNode {
            value: Value::ILLEGAL,
            bci,
            kind,
        });
        let b = &mut self.blocks[block];
        b.terminator = Some(id);
        b.successors = SmallVec::from_slice(successors);
        for &succ in successors {
            self.blocks[succ].predecessors.push(block);
        }
        Ok(id)
    }

    // =========================================================================
    // State merging / phi insertion
    // =========================================================================

    /// Reconcile an incoming abstract frame with `target`'s entry state.
    ///
    /// First merge adopts a deep copy; at loop headers it additionally
    /// replaces every stack slot and every live local with an eager phi
    /// so back edges only ever append inputs. Later merges create a phi
    /// at the first point of divergence (seeded with the previously
    /// agreed value for every edge already merged) or append to phis
    /// this block already owns. Kind disagreement on a stack slot is a
    /// bailout; on a local it kills the slot, except at loop headers
    /// where a killed or retyped local also bails out.
    pub fn merge_into(&mut self, target: BlockId, incoming: &VmState) -> CompileResult<()> {
        let loop_header = self.blocks[target].is_loop_header();

        let existing = self.blocks[target].entry_state.take();
        let mut state = match existing {
            None => {
                let mut adopted = incoming.copy();
                if loop_header {
                    self.install_header_phis(target, &mut adopted);
                }
                self.blocks[target].entry_state = Some(adopted);
                self.blocks[target].merged_preds = 1;
                return Ok(());
            }
            Some(state) => state,
        };

        if state.stack_depth() != incoming.stack_depth() {
            let depth = state.stack_depth();
            self.blocks[target].entry_state = Some(state);
            return Err(CompileError::bailout(format!(
                "operand stack depth mismatch at block {:?} ({} vs {})",
                target,
                depth,
                incoming.stack_depth()
            )));
        }

        let merged = self.blocks[target].merged_preds;
        let result = self.merge_slots(target, &mut state, incoming, merged, loop_header);
        self.blocks[target].merged_preds = merged + 1;
        self.blocks[target].entry_state = Some(state);
        result
    }

    fn merge_slots(
        &mut self,
        target: BlockId,
        state: &mut VmState,
        incoming: &VmState,
        merged: u32,
        loop_header: bool,
    ) -> CompileResult<()> {
        for i in 0..state.stack_depth() {
            let cur = match state.stack_at(i) {
                Some(n) => n,
                None => continue,
            };
            let inc = match incoming.stack_at(i) {
                Some(n) => n,
                None => continue,
            };
            if self.kind_of(cur) != self.kind_of(inc) {
                return Err(CompileError::bailout(format!(
                    "stack slot {} changes kind at block {:?} ({} vs {})",
                    i,
                    target,
                    self.kind_of(cur),
                    self.kind_of(inc)
                )));
            }
            if let Some(phi) = self.owned_phi(target, cur) {
                self.push_phi_input(phi, inc);
            } else if cur != inc {
                if loop_header {
                    // Header slots were all phi-ed on the first merge.
                    return Err(CompileError::internal(format!(
                        "loop header {:?} stack slot {} is not a phi",
                        target, i
                    )));
                }
                let phi = self.new_phi(target, PhiSlot::Stack(i as u16), cur, inc, merged);
                state.set_stack_at(i, phi);
            }
        }

        for slot in 0..state.local_count() {
            let cur = match state.local(slot) {
                Some(n) => n,
                None => continue,
            };
            let inc = match incoming.local(slot) {
                Some(n) => n,
                None => {
                    if loop_header {
                        return Err(CompileError::bailout(format!(
                            "local {} dies on a back edge of block {:?}",
                            slot, target
                        )));
                    }
                    self.retire_phi(target, cur);
                    state.set_local_raw(slot, None);
                    continue;
                }
            };
            if self.kind_of(cur) != self.kind_of(inc) {
                if loop_header {
                    return Err(CompileError::bailout(format!(
                        "local {} changes kind on a back edge of block {:?}",
                        slot, target
                    )));
                }
                self.retire_phi(target, cur);
                state.set_local_raw(slot, None);
                continue;
            }
            if let Some(phi) = self.owned_phi(target, cur) {
                self.push_phi_input(phi, inc);
            } else if cur != inc {
                if loop_header {
                    return Err(CompileError::internal(format!(
                        "loop header {:?} local {} is not a phi",
                        target, slot
                    )));
                }
                let phi = self.new_phi(target, PhiSlot::Local(slot as u16), cur, inc, merged);
                state.set_local_raw(slot, Some(phi));
            }
        }

        Ok(())
    }

    /// Eager phis for a loop header's first merge: one per stack slot and
    /// one per live local, each seeded with the forward-edge value.
    fn install_header_phis(&mut self, target: BlockId, state: &mut VmState) {
        for i in 0..state.stack_depth() {
            if let Some(cur) = state.stack_at(i) {
                let phi = self.alloc_phi(target, PhiSlot::Stack(i as u16), cur);
                state.set_stack_at(i, phi);
            }
        }
        for slot in 0..state.local_count() {
            if let Some(cur) = state.local(slot) {
                let phi = self.alloc_phi(target, PhiSlot::Local(slot as u16), cur);
                state.set_local_raw(slot, Some(phi));
            }
        }
    }

    /// A phi for a join discovered on the `merged`-th edge: all earlier
    /// edges agreed on `agreed`, the new edge brings `diverging`.
    fn new_phi(
        &mut self,
        target: BlockId,
        slot: PhiSlot,
        agreed: NodeId,
        diverging: NodeId,
        merged: u32,
    ) -> NodeId {
        let phi = self.alloc_phi(target, slot, agreed);
        if let NodeKind::Phi { inputs, .. } = &mut self.nodes[phi].kind {
            for _ in 1..merged {
                inputs.push(agreed);
            }
            inputs.push(diverging);
        }
        phi
    }

    fn alloc_phi(&mut self, target: BlockId, slot: PhiSlot, first: NodeId) -> NodeId {
        let kind = self.kind_of(first);
        let bci = self.blocks[target].start_bci;
        let mut inputs = SmallVec::new();
        inputs.push(first);
        let id = self.nodes.alloc(HirNode {
            value: Value::of(kind),
            bci,
            kind: NodeKind::Phi {
                slot,
                block: target,
                inputs,
            },
        });
        self.blocks[target].phis.push(id);
        id
    }

    /// `node` if it is a phi owned by `block`, else `None`.
    fn owned_phi(&self, block: BlockId, node: NodeId) -> Option<NodeId> {
        match &self.nodes[node].kind {
            NodeKind::Phi { block: owner, .. } if *owner == block => Some(node),
            _ => None,
        }
    }

    /// Drops a phi this block owns when its slot is killed mid-merge, so
    /// later passes never see it with fewer inputs than predecessors.
    fn retire_phi(&mut self, block: BlockId, node: NodeId) {
        if self.owned_phi(block, node).is_some() {
            self.blocks[block].phis.retain(|&p| p != node);
        }
    }

    fn push_phi_input(&mut self, phi: NodeId, input: NodeId) {
        if let NodeKind::Phi { inputs, .. } = &mut self.nodes[phi].kind {
            inputs.push(input);
        }
    }

    // =========================================================================
    // Dumps
    // =========================================================================

    /// Graphviz rendering of the control flow graph.
    pub fn to_dot(&self) -> String {
        use std::fmt::Write;
        let mut out = String::from("digraph hir {\n  node [shape=box];\n");
        for (id, block) in self.blocks.iter() {
            let mut label = format!("B{} [bci {}..{}]", id.index(), block.start_bci, block.end_bci);
            if block.is_loop_header() {
                label.push_str("\\nloop header");
            }
            let _ = writeln!(out, "  b{} [label=\"{}\"];", id.index(), label);
            for succ in &block.successors {
                let _ = writeln!(out, "  b{} -> b{};", id.index(), succ.index());
            }
        }
        out.push_str("}\n");
        out
    }

    fn fmt_node(&self, f: &mut std::fmt::Formatter<'_>, id: NodeId) -> std::fmt::Result {
        let node = &self.nodes[id];
        write!(f, "    {:?} {} {}", id, node.value_kind(), node.kind.mnemonic())?;
        if let Some(c) = node.value.as_constant() {
            write!(f, " {}", c)?;
        }
        match &node.kind {
            NodeKind::Arith { left, right, .. }
            | NodeKind::Shift { left, right, .. }
            | NodeKind::Logic { left, right, .. }
            | NodeKind::Compare { left, right, .. }
            | NodeKind::If { left, right, .. } => write!(f, " {:?} {:?}", left, right)?,
            NodeKind::Negate { operand } | NodeKind::Convert { operand, .. } => {
                write!(f, " {:?}", operand)?
            }
            NodeKind::Phi { inputs, .. } => {
                write!(f, " [")?;
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", input)?;
                }
                write!(f, "]")?;
            }
            NodeKind::Return { value: Some(v) } => write!(f, " {:?}", v)?,
            _ => {}
        }
        writeln!(f)
    }
}

impl Default for HirGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HirGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (id, block) in self.blocks.iter() {
            write!(
                f,
                "B{} [bci {}..{}] preds={:?} succs={:?}",
                id.index(),
                block.start_bci,
                block.end_bci,
                block.predecessors,
                block.successors
            )?;
            if block.is_loop_header() {
                write!(f, " loop-header")?;
            }
            writeln!(f)?;
            for &phi in &block.phis {
                self.fmt_node(f, phi)?;
            }
            for &node in &block.nodes {
                self.fmt_node(f, node)?;
            }
            if let Some(term) = block.terminator {
                self.fmt_node(f, term)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode;
    use crate::hir::types::ConstValue;

    fn int_const(g: &mut HirGraph, block: BlockId, v: i32) -> NodeId {
        let id = g.nodes.alloc(HirNode {
            value: Value::constant(ConstValue::Int(v)),
            bci: 0,
            kind: NodeKind::Constant,
        });
        g.blocks[block].nodes.push(id);
        id
    }

    #[test]
    fn test_seal_sets_both_edge_directions() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let next = g.new_block(4, 8);

        g.seal(entry, 0, NodeKind::Goto, &[next]).unwrap();

        assert_eq!(g.block(entry).successors.as_slice(), &[next]);
        assert_eq!(g.block(next).predecessors.as_slice(), &[entry]);
    }

    #[test]
    fn test_seal_twice_is_internal_error() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let next = g.new_block(4, 8);

        g.seal(entry, 0, NodeKind::Goto, &[next]).unwrap();
        let err = g.seal(entry, 0, NodeKind::Goto, &[next]).unwrap_err();
        assert!(!err.is_bailout());
    }

    #[test]
    fn test_join_same_value_makes_no_phi() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let v = int_const(&mut g, entry, 5);
        let mut a = VmState::new(4, 1);
        a.store_local(0, v);
        let b = a.copy();

        g.merge_into(join, &a).unwrap();
        g.merge_into(join, &b).unwrap();

        assert!(g.block(join).phis.is_empty());
        let state = g.block(join).entry_state.as_ref().unwrap();
        assert_eq!(state.local(0), Some(v));
    }

    #[test]
    fn test_join_differing_value_makes_phi_with_both_inputs() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let v1 = int_const(&mut g, entry, 1);
        let v2 = int_const(&mut g, entry, 2);
        let mut a = VmState::new(4, 1);
        a.store_local(0, v1);
        let mut b = VmState::new(4, 1);
        b.store_local(0, v2);

        g.merge_into(join, &a).unwrap();
        g.merge_into(join, &b).unwrap();

        assert_eq!(g.block(join).phis.len(), 1);
        let phi = g.block(join).phis[0];
        match &g.node(phi).kind {
            NodeKind::Phi { slot, inputs, .. } => {
                assert_eq!(*slot, PhiSlot::Local(0));
                assert_eq!(inputs.as_slice(), &[v1, v2]);
            }
            other => panic!("expected phi, got {}", other.mnemonic()),
        }
    }

    #[test]
    fn test_late_divergence_seeds_agreed_value() {
        // Three predecessors: the first two agree, the third diverges.
        // The phi must carry two copies of the agreed value.
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let v1 = int_const(&mut g, entry, 1);
        let v2 = int_const(&mut g, entry, 2);
        let mut a = VmState::new(4, 1);
        a.store_local(0, v1);
        let b = a.copy();
        let mut c = VmState::new(4, 1);
        c.store_local(0, v2);

        g.merge_into(join, &a).unwrap();
        g.merge_into(join, &b).unwrap();
        g.merge_into(join, &c).unwrap();

        let phi = g.block(join).phis[0];
        match &g.node(phi).kind {
            NodeKind::Phi { inputs, .. } => {
                assert_eq!(inputs.as_slice(), &[v1, v1, v2]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_loop_header_gets_eager_phis_for_live_locals() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let header = g.new_block(4, 10);
        g.block_mut(header).flags |= BlockFlags::LOOP_HEADER;

        let v = int_const(&mut g, entry, 0);
        let mut forward = VmState::new(4, 2);
        forward.store_local(0, v);
        // Local 1 stays dead; no phi for it.

        g.merge_into(header, &forward).unwrap();

        assert_eq!(g.block(header).phis.len(), 1);
        let state = g.block(header).entry_state.as_ref().unwrap();
        let phi = state.local(0).unwrap();
        assert!(g.node(phi).is_phi());
        assert_eq!(state.local(1), None);

        // Back edge appends its input to the existing phi.
        let v9 = int_const(&mut g, entry, 9);
        let mut back = VmState::new(4, 2);
        back.store_local(0, v9);
        g.merge_into(header, &back).unwrap();

        match &g.node(phi).kind {
            NodeKind::Phi { inputs, .. } => assert_eq!(inputs.as_slice(), &[v, v9]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_stack_kind_instability_bails_out() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let vi = int_const(&mut g, entry, 1);
        let vf = g.nodes.alloc(HirNode {
            value: Value::constant(ConstValue::Float(1.0)),
            bci: 0,
            kind: NodeKind::Constant,
        });
        g.blocks[entry].nodes.push(vf);

        let mut a = VmState::new(4, 0);
        a.push(vi).unwrap();
        let mut b = VmState::new(4, 0);
        b.push(vf).unwrap();

        g.merge_into(join, &a).unwrap();
        let err = g.merge_into(join, &b).unwrap_err();
        assert!(err.is_bailout());
    }

    #[test]
    fn test_local_kind_mismatch_kills_slot_at_join() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let vi = int_const(&mut g, entry, 1);
        let vl = g.nodes.alloc(HirNode {
            value: Value::constant(ConstValue::Long(1)),
            bci: 0,
            kind: NodeKind::Constant,
        });
        g.blocks[entry].nodes.push(vl);

        let mut a = VmState::new(4, 1);
        a.store_local(0, vi);
        let mut b = VmState::new(4, 1);
        b.store_local(0, vl);

        g.merge_into(join, &a).unwrap();
        g.merge_into(join, &b).unwrap();

        let state = g.block(join).entry_state.as_ref().unwrap();
        assert_eq!(state.local(0), None);
        assert!(g.block(join).phis.is_empty());
    }

    #[test]
    fn test_stack_depth_mismatch_bails_out() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let v = int_const(&mut g, entry, 1);
        let mut a = VmState::new(4, 0);
        a.push(v).unwrap();
        let b = VmState::new(4, 0);

        g.merge_into(join, &a).unwrap();
        let err = g.merge_into(join, &b).unwrap_err();
        assert!(err.is_bailout());
    }

    #[test]
    fn test_late_dead_local_retires_phi() {
        // Three predecessors: the first two diverge on local 0 and make a
        // phi, then the third arrives with the slot dead. The phi must go
        // away with the slot, or it would be left with two inputs for
        // three predecessors.
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let v1 = int_const(&mut g, entry, 1);
        let v2 = int_const(&mut g, entry, 2);
        let mut a = VmState::new(4, 1);
        a.store_local(0, v1);
        let mut b = VmState::new(4, 1);
        b.store_local(0, v2);
        let c = VmState::new(4, 1);

        g.merge_into(join, &a).unwrap();
        g.merge_into(join, &b).unwrap();
        assert_eq!(g.block(join).phis.len(), 1);

        g.merge_into(join, &c).unwrap();

        let state = g.block(join).entry_state.as_ref().unwrap();
        assert_eq!(state.local(0), None);
        assert!(g.block(join).phis.is_empty());
    }

    #[test]
    fn test_late_kind_mismatch_retires_phi() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(8, 12);

        let v1 = int_const(&mut g, entry, 1);
        let v2 = int_const(&mut g, entry, 2);
        let vl = g.nodes.alloc(HirNode {
            value: Value::constant(ConstValue::Long(3)),
            bci: 0,
            kind: NodeKind::Constant,
        });
        g.blocks[entry].nodes.push(vl);

        let mut a = VmState::new(4, 1);
        a.store_local(0, v1);
        let mut b = VmState::new(4, 1);
        b.store_local(0, v2);
        let mut c = VmState::new(4, 1);
        c.store_local(0, vl);

        g.merge_into(join, &a).unwrap();
        g.merge_into(join, &b).unwrap();
        g.merge_into(join, &c).unwrap();

        let state = g.block(join).entry_state.as_ref().unwrap();
        assert_eq!(state.local(0), None);
        assert!(g.block(join).phis.is_empty());
    }

    #[test]
    fn test_fold_through_append() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let a = int_const(&mut g, entry, 2);
        let b = int_const(&mut g, entry, 3);

        let sum = g.append(
            entry,
            4,
            ValueKind::Int,
            NodeKind::Arith {
                op: bytecode::IADD,
                left: a,
                right: b,
            },
        );

        let node = g.node(sum);
        assert!(matches!(node.kind, NodeKind::Constant));
        assert_eq!(node.value.as_constant(), Some(ConstValue::Int(5)));
    }
}
