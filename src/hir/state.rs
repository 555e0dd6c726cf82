//! Abstract interpretation frame: operand stack plus local variable slots.
//!
//! A [`VmState`] tracks which SSA node currently occupies each stack slot
//! and each local. Locals are optional: a `None` slot is dead (never
//! written on this path, or the high half of a wide value) and merging a
//! dead slot with anything keeps it dead.
//!
//! The stack is bounded by the method's declared maximum. Exceeding it is
//! a hard failure surfaced by the caller with block/bci context.

use crate::hir::node::NodeId;

/// Raised by [`VmState::push`] when the operand stack would exceed the
/// declared maximum. The builder attaches location context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub limit: usize,
}

/// One abstract frame: the operand stack and local slots at a program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmState {
    max_stack: usize,
    stack: Vec<NodeId>,
    locals: Vec<Option<NodeId>>,
}

impl VmState {
    pub fn new(max_stack: usize, max_locals: usize) -> Self {
        Self {
            max_stack,
            stack: Vec::with_capacity(max_stack),
            locals: vec![None; max_locals],
        }
    }

    // =========================================================================
    // Operand stack
    // =========================================================================

    pub fn push(&mut self, node: NodeId) -> Result<(), CapacityExceeded> {
        if self.stack.len() >= self.max_stack {
            return Err(CapacityExceeded {
                limit: self.max_stack,
            });
        }
        self.stack.push(node);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<NodeId> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn stack_at(&self, index: usize) -> Option<NodeId> {
        self.stack.get(index).copied()
    }

    pub(crate) fn set_stack_at(&mut self, index: usize, node: NodeId) {
        self.stack[index] = node;
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    // =========================================================================
    // Locals
    // =========================================================================

    pub fn store_local(&mut self, slot: usize, node: NodeId) {
        self.locals[slot] = Some(node);
    }

    /// Kill a local slot, used for the high half of wide values.
    pub fn kill_local(&mut self, slot: usize) {
        self.locals[slot] = None;
    }

    pub fn local(&self, slot: usize) -> Option<NodeId> {
        self.locals.get(slot).copied().flatten()
    }

    pub(crate) fn set_local_raw(&mut self, slot: usize, node: Option<NodeId>) {
        self.locals[slot] = node;
    }

    #[inline]
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Deep copy for block-entry snapshots. Successor states must never
    /// alias a predecessor's frame.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Id;

    fn node(n: u32) -> NodeId {
        Id::new(n)
    }

    #[test]
    fn test_push_pop_lifo() {
        let mut state = VmState::new(4, 0);
        state.push(node(1)).unwrap();
        state.push(node(2)).unwrap();
        assert_eq!(state.pop(), Some(node(2)));
        assert_eq!(state.pop(), Some(node(1)));
        assert_eq!(state.pop(), None);
    }

    #[test]
    fn test_push_beyond_max_fails() {
        let mut state = VmState::new(1, 0);
        state.push(node(1)).unwrap();
        assert_eq!(state.push(node(2)), Err(CapacityExceeded { limit: 1 }));
        // The failed push must not corrupt the stack.
        assert_eq!(state.stack_depth(), 1);
    }

    #[test]
    fn test_locals_start_dead() {
        let state = VmState::new(0, 3);
        assert_eq!(state.local(0), None);
        assert_eq!(state.local(2), None);
    }

    #[test]
    fn test_store_and_kill_local() {
        let mut state = VmState::new(0, 2);
        state.store_local(0, node(7));
        assert_eq!(state.local(0), Some(node(7)));
        state.kill_local(0);
        assert_eq!(state.local(0), None);
    }

    #[test]
    fn test_copy_is_deep() {
        let mut state = VmState::new(2, 1);
        state.push(node(1)).unwrap();
        state.store_local(0, node(2));

        let snapshot = state.copy();
        state.pop();
        state.store_local(0, node(9));

        assert_eq!(snapshot.stack_depth(), 1);
        assert_eq!(snapshot.local(0), Some(node(2)));
    }
}
