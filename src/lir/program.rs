//! The lowered method: per-block instruction lists plus stubs.

use rustc_hash::FxHashMap;
use std::fmt;

use crate::arena::Arena;
use crate::hir::node::BlockId;
use crate::lir::instr::LirInstr;
use crate::lir::stub::{CodeStub, Label, StubId};

/// LIR for one method, keyed by the HIR block ids it was selected from.
#[derive(Debug, Clone, Default)]
pub struct Lir {
    blocks: FxHashMap<BlockId, Vec<LirInstr>>,
    stubs: Arena<CodeStub>,
    next_label: u32,
}

impl Lir {
    pub fn new() -> Self {
        Lir {
            blocks: FxHashMap::default(),
            stubs: Arena::new(),
            next_label: 0,
        }
    }

    /// Append an instruction to a block's list.
    pub fn append(&mut self, block: BlockId, instr: LirInstr) {
        self.blocks.entry(block).or_default().push(instr);
    }

    /// The instruction list for a block, empty if nothing was selected.
    pub fn instructions(&self, block: BlockId) -> &[LirInstr] {
        self.blocks.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Register an out-of-line slow path.
    pub fn add_stub(&mut self, stub: CodeStub) -> StubId {
        self.stubs.alloc(stub)
    }

    pub fn stub(&self, id: StubId) -> &CodeStub {
        &self.stubs[id]
    }

    pub fn stubs(&self) -> impl Iterator<Item = (StubId, &CodeStub)> {
        self.stubs.iter()
    }

    pub fn stub_count(&self) -> usize {
        self.stubs.len()
    }

    /// Fresh continuation label, unique within this compilation.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }
}

impl fmt::Display for Lir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<BlockId> = self.blocks.keys().copied().collect();
        ids.sort();
        for id in ids {
            writeln!(f, "B{}:", id.index())?;
            for instr in &self.blocks[&id] {
                writeln!(f, "  {}", instr)?;
            }
        }
        for (id, stub) in self.stubs.iter() {
            writeln!(f, "stub{}: {}", id.index(), stub)?;
        }
        Ok(())
    }
}
