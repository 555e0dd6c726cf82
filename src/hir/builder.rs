//! HIR construction by abstract interpretation.
//!
//! The builder walks pre-decoded basic blocks in reverse post-order,
//! carrying a [`VmState`] through each block:
//! - **One pass per block**: a block is interpreted exactly once, after
//!   every forward predecessor has merged its exit frame into it
//! - **Loop headers**: eager phis installed on the first merge mean back
//!   edges only append phi inputs, never force a re-walk
//! - **Irreducible flow**: a back edge into a block that is not a marked
//!   loop header is a bailout, not an error
//!
//! The bytecode stream arrives pre-decoded and pre-resolved: constant
//! pool entries are already [`ClassRef`]/[`FieldRef`]/[`MethodRef`]
//! values, so the builder never touches raw class file bytes.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bytecode::{self, *};
use crate::error::{bail_out, CompileError, CompileResult};
use crate::hir::graph::{BlockFlags, ExceptionHandler, HirGraph};
use crate::hir::node::{BarrierKind, BlockId, NodeId, NodeKind};
use crate::hir::state::VmState;
use crate::hir::types::{ClassRef, ConstValue, FieldRef, MethodRef, ValueKind};

// =============================================================================
// Method input
// =============================================================================

/// Resolved shape of the method under compilation.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub max_stack: usize,
    pub max_locals: usize,
    /// Parameter kinds in slot order; the receiver, if any, is params[0].
    pub params: Vec<ValueKind>,
    pub return_kind: ValueKind,
}

/// How a call site dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Special,
    Virtual,
    Interface,
}

/// One pre-decoded basic block. The slice handed to [`build`] must be in
/// reverse post-order with loop headers marked.
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub start: u32,
    /// One past the last bci; also the fall-through target.
    pub end: u32,
    pub loop_header: bool,
    pub handler: Option<ExceptionHandler>,
    pub code: Vec<(u32, DecodedInstr)>,
}

/// A single pre-decoded, pre-resolved bytecode instruction.
#[derive(Debug, Clone)]
pub enum DecodedInstr {
    Nop,
    ConstInt(i32),
    ConstLong(i64),
    ConstFloat(f32),
    ConstDouble(f64),
    ConstNull,
    Load(ValueKind, u16),
    Store(ValueKind, u16),
    Iinc(u16, i32),
    Pop,
    Pop2,
    Dup,
    Swap,
    Arith(u16),
    Shift(u16),
    Logic(u16),
    Negate(u16),
    Convert(u16),
    Compare(u16),
    If { op: u16, target: u32 },
    Goto { target: u32 },
    TableSwitch { low: i32, high: i32, targets: Vec<u32>, default: u32 },
    LookupSwitch { pairs: Vec<(i32, u32)>, default: u32 },
    Return(ValueKind),
    GetField(FieldRef),
    PutField(FieldRef),
    ArrayLoad(ValueKind),
    ArrayStore(ValueKind),
    ArrayLength,
    New(ClassRef),
    NewTypeArray(ValueKind),
    NewObjArray(ClassRef),
    MultiNewArray { class: ClassRef, dims: u8 },
    CheckCast(ClassRef),
    InstanceOf(ClassRef),
    Invoke { kind: InvokeKind, method: MethodRef },
    MonitorEnter,
    MonitorExit,
    Throw,
}

// =============================================================================
// Builder
// =============================================================================

/// Build the SSA graph for a method.
pub fn build(method: &MethodDescriptor, blocks: &[DecodedBlock]) -> CompileResult<HirGraph> {
    log::debug!(
        "building hir for {} ({} blocks, max_stack={}, max_locals={})",
        method.name,
        blocks.len(),
        method.max_stack,
        method.max_locals
    );
    HirBuilder::new(method, blocks)?.run()
}

struct HirBuilder<'a> {
    method: &'a MethodDescriptor,
    decoded: &'a [DecodedBlock],
    graph: HirGraph,
    /// Start bci to block id.
    block_map: FxHashMap<u32, BlockId>,
    interpreted: FxHashSet<BlockId>,
}

impl<'a> HirBuilder<'a> {
    fn new(method: &'a MethodDescriptor, decoded: &'a [DecodedBlock]) -> CompileResult<Self> {
        let mut graph = HirGraph::new();
        let mut block_map = FxHashMap::default();
        for db in decoded {
            let id = graph.new_block(db.start, db.end);
            if db.loop_header {
                graph.block_mut(id).flags |= BlockFlags::LOOP_HEADER;
            }
            graph.block_mut(id).handler = db.handler.clone();
            if block_map.insert(db.start, id).is_some() {
                return Err(CompileError::internal(format!(
                    "two blocks start at bci {}",
                    db.start
                )));
            }
        }
        Ok(HirBuilder {
            method,
            decoded,
            graph,
            block_map,
            interpreted: FxHashSet::default(),
        })
    }

    fn run(mut self) -> CompileResult<HirGraph> {
        self.build_entry()?;

        let decoded = self.decoded;
        for db in decoded {
            let id = self.block_map[&db.start];
            if self.graph.block(id).entry_state.is_none() {
                // Never merged into: unreachable under this ordering.
                log::trace!("skipping unreachable block {:?} at bci {}", id, db.start);
                continue;
            }
            self.interpret_block(id, db)?;
        }

        Ok(self.graph)
    }

    /// Synthetic entry: materialize parameters into locals, then jump to
    /// the block at bci 0.
    fn build_entry(&mut self) -> CompileResult<()> {
        let mut state = VmState::new(self.method.max_stack, self.method.max_locals);
        let mut slot = 0usize;
        for (index, &kind) in self.method.params.iter().enumerate() {
            let node = self.graph.append_param(index as u16, kind);
            state.store_local(slot, node);
            slot += if kind.is_wide() { 2 } else { 1 };
        }

        let entry = self.graph.entry();
        let first = self.target(0)?;
        self.graph.seal(entry, 0, NodeKind::Goto, &[first])?;
        self.interpreted.insert(entry);
        self.merge(first, &state)
    }

    fn target(&self, bci: u32) -> CompileResult<BlockId> {
        self.block_map.get(&bci).copied().ok_or_else(|| {
            CompileError::internal(format!("branch target bci {} starts no block", bci))
        })
    }

    /// Merge an exit frame into a successor, rejecting back edges into
    /// blocks that were not marked as loop headers.
    fn merge(&mut self, succ: BlockId, state: &VmState) -> CompileResult<()> {
        if self.interpreted.contains(&succ) && !self.graph.block(succ).is_loop_header() {
            return bail_out(format!(
                "irreducible control flow: back edge into non-header block {:?}",
                succ
            ));
        }
        self.graph.merge_into(succ, state)
    }

    // =========================================================================
    // Per-block interpretation
    // =========================================================================

    fn interpret_block(&mut self, id: BlockId, db: &DecodedBlock) -> CompileResult<()> {
        log::trace!("interpreting block {:?} [bci {}..{}]", id, db.start, db.end);
        self.interpreted.insert(id);

        let mut state = match self.graph.block(id).entry_state.as_ref() {
            Some(s) => s.copy(),
            None => return Err(CompileError::internal("interpreting unmerged block")),
        };

        for (bci, instr) in &db.code {
            if may_trap(instr) {
                self.graph.block_mut(id).flags |= BlockFlags::MAY_THROW;
            }
            if self.interpret(id, *bci, instr, &mut state)? {
                // Terminator sealed the block; anything after is dead.
                return Ok(());
            }
        }

        // Fall through into the next block.
        let next = self.target(db.end)?;
        self.graph.seal(id, db.end, NodeKind::Goto, &[next])?;
        self.merge(next, &state)
    }

    /// Interpret one instruction. Returns `true` if it sealed the block.
    fn interpret(
        &mut self,
        block: BlockId,
        bci: u32,
        instr: &DecodedInstr,
        state: &mut VmState,
    ) -> CompileResult<bool> {
        use DecodedInstr::*;
        match instr {
            Nop => {}

            ConstInt(v) => self.push_const(block, bci, state, ConstValue::Int(*v))?,
            ConstLong(v) => self.push_const(block, bci, state, ConstValue::Long(*v))?,
            ConstFloat(v) => self.push_const(block, bci, state, ConstValue::Float(*v))?,
            ConstDouble(v) => self.push_const(block, bci, state, ConstValue::Double(*v))?,
            ConstNull => self.push_const(block, bci, state, ConstValue::Null)?,

            Load(_, slot) => {
                let node = state.local(*slot as usize).ok_or_else(|| {
                    CompileError::internal(format!("load of dead local {} at bci {}", slot, bci))
                })?;
                self.push(block, bci, state, node)?;
            }
            Store(kind, slot) => {
                let node = self.pop(bci, state)?;
                state.store_local(*slot as usize, node);
                if kind.is_wide() {
                    state.kill_local(*slot as usize + 1);
                }
            }
            Iinc(slot, delta) => {
                let cur = state.local(*slot as usize).ok_or_else(|| {
                    CompileError::internal(format!("iinc of dead local {} at bci {}", slot, bci))
                })?;
                let d = self.graph.append_const(block, bci, ConstValue::Int(*delta));
                let sum = self.graph.append(
                    block,
                    bci,
                    ValueKind::Int,
                    NodeKind::Arith {
                        op: IADD,
                        left: cur,
                        right: d,
                    },
                );
                state.store_local(*slot as usize, sum);
            }

            Pop => {
                self.pop(bci, state)?;
            }
            Pop2 => {
                let top = self.pop(bci, state)?;
                if !self.graph.kind_of(top).is_wide() {
                    self.pop(bci, state)?;
                }
            }
            Dup => {
                let top = state.peek().ok_or_else(|| self.underflow(bci))?;
                self.push(block, bci, state, top)?;
            }
            Swap => {
                let a = self.pop(bci, state)?;
                let b = self.pop(bci, state)?;
                self.push(block, bci, state, a)?;
                self.push(block, bci, state, b)?;
            }

            Arith(op) => {
                let right = self.pop(bci, state)?;
                let left = self.pop(bci, state)?;
                let result = op_result_kind(*op);
                let node = self.graph.append(
                    block,
                    bci,
                    result,
                    NodeKind::Arith {
                        op: *op,
                        left,
                        right,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            Shift(op) => {
                let count = self.pop(bci, state)?;
                let value = self.pop(bci, state)?;
                let result = op_result_kind(*op);
                let node = self.graph.append(
                    block,
                    bci,
                    result,
                    NodeKind::Shift {
                        op: *op,
                        left: value,
                        right: count,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            Logic(op) => {
                let right = self.pop(bci, state)?;
                let left = self.pop(bci, state)?;
                let result = op_result_kind(*op);
                let node = self.graph.append(
                    block,
                    bci,
                    result,
                    NodeKind::Logic {
                        op: *op,
                        left,
                        right,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            Negate(op) => {
                let operand = self.pop(bci, state)?;
                let result = op_result_kind(*op);
                let node = self
                    .graph
                    .append(block, bci, result, NodeKind::Negate { operand });
                self.push(block, bci, state, node)?;
            }
            Convert(op) => {
                let operand = self.pop(bci, state)?;
                let result = convert_result_kind(*op);
                let node = self
                    .graph
                    .append(block, bci, result, NodeKind::Convert { op: *op, operand });
                self.push(block, bci, state, node)?;
            }
            Compare(op) => {
                let right = self.pop(bci, state)?;
                let left = self.pop(bci, state)?;
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Int,
                    NodeKind::Compare {
                        op: *op,
                        left,
                        right,
                    },
                );
                self.push(block, bci, state, node)?;
            }

            If { op, target } => {
                let (left, right) = self.if_operands(block, bci, *op, state)?;
                let taken = self.target(*target)?;
                let fallthrough = self.fallthrough(block)?;
                self.graph.seal(
                    block,
                    bci,
                    NodeKind::If {
                        op: *op,
                        left,
                        right,
                    },
                    &[taken, fallthrough],
                )?;
                self.merge(taken, state)?;
                self.merge(fallthrough, state)?;
                return Ok(true);
            }
            Goto { target } => {
                let succ = self.target(*target)?;
                self.graph.seal(block, bci, NodeKind::Goto, &[succ])?;
                self.merge(succ, state)?;
                return Ok(true);
            }
            TableSwitch {
                low,
                high,
                targets,
                default,
            } => {
                let index = self.pop(bci, state)?;
                let mut succs = Vec::with_capacity(targets.len() + 1);
                for &t in targets {
                    succs.push(self.target(t)?);
                }
                succs.push(self.target(*default)?);
                self.graph.seal(
                    block,
                    bci,
                    NodeKind::TableSwitch {
                        index,
                        low: *low,
                        high: *high,
                    },
                    &succs,
                )?;
                for succ in succs {
                    self.merge(succ, state)?;
                }
                return Ok(true);
            }
            LookupSwitch { pairs, default } => {
                let key = self.pop(bci, state)?;
                let keys: Vec<i32> = pairs.iter().map(|&(k, _)| k).collect();
                let mut succs = Vec::with_capacity(pairs.len() + 1);
                for &(_, t) in pairs {
                    succs.push(self.target(t)?);
                }
                succs.push(self.target(*default)?);
                self.graph
                    .seal(block, bci, NodeKind::LookupSwitch { key, keys }, &succs)?;
                for succ in succs {
                    self.merge(succ, state)?;
                }
                return Ok(true);
            }
            Return(kind) => {
                let value = if *kind == ValueKind::Void {
                    None
                } else {
                    Some(self.pop(bci, state)?)
                };
                self.graph.seal(block, bci, NodeKind::Return { value }, &[])?;
                return Ok(true);
            }
            Throw => {
                let exception = self.pop(bci, state)?;
                self.graph
                    .seal(block, bci, NodeKind::Throw { exception }, &[])?;
                return Ok(true);
            }

            GetField(field) => {
                let object = if field.is_static {
                    None
                } else {
                    Some(self.pop(bci, state)?)
                };
                let node = self.graph.append(
                    block,
                    bci,
                    field.kind,
                    NodeKind::LoadField {
                        object,
                        field: field.clone(),
                    },
                );
                self.push(block, bci, state, node)?;
                if field.is_volatile {
                    self.barrier(block, bci, BarrierKind::LoadLoad);
                    self.barrier(block, bci, BarrierKind::LoadStore);
                }
            }
            PutField(field) => {
                if field.is_volatile {
                    self.barrier(block, bci, BarrierKind::StoreStore);
                }
                let value = self.pop(bci, state)?;
                let object = if field.is_static {
                    None
                } else {
                    Some(self.pop(bci, state)?)
                };
                self.graph.append(
                    block,
                    bci,
                    ValueKind::Illegal,
                    NodeKind::StoreField {
                        object,
                        field: field.clone(),
                        value,
                    },
                );
                if field.is_volatile {
                    self.barrier(block, bci, BarrierKind::StoreLoad);
                }
            }

            ArrayLoad(elem) => {
                let index = self.pop(bci, state)?;
                let array = self.pop(bci, state)?;
                let node = self.graph.append(
                    block,
                    bci,
                    *elem,
                    NodeKind::LoadIndex {
                        array,
                        index,
                        elem: *elem,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            ArrayStore(elem) => {
                let value = self.pop(bci, state)?;
                let index = self.pop(bci, state)?;
                let array = self.pop(bci, state)?;
                self.graph.append(
                    block,
                    bci,
                    ValueKind::Illegal,
                    NodeKind::StoreIndex {
                        array,
                        index,
                        elem: *elem,
                        value,
                    },
                );
            }
            ArrayLength => {
                let array = self.pop(bci, state)?;
                let node =
                    self.graph
                        .append(block, bci, ValueKind::Int, NodeKind::ArrayLength { array });
                self.push(block, bci, state, node)?;
            }

            New(class) => {
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Object,
                    NodeKind::NewInstance {
                        class: class.clone(),
                    },
                );
                self.push(block, bci, state, node)?;
            }
            NewTypeArray(elem) => {
                let length = self.pop(bci, state)?;
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Object,
                    NodeKind::NewTypeArray {
                        elem: *elem,
                        length,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            NewObjArray(class) => {
                let length = self.pop(bci, state)?;
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Object,
                    NodeKind::NewObjectArray {
                        class: class.clone(),
                        length,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            MultiNewArray { class, dims } => {
                let mut sizes = vec![NodeId::new(0); *dims as usize];
                for i in (0..*dims as usize).rev() {
                    sizes[i] = self.pop(bci, state)?;
                }
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Object,
                    NodeKind::NewMultiArray {
                        class: class.clone(),
                        sizes,
                    },
                );
                self.push(block, bci, state, node)?;
            }

            CheckCast(class) => {
                let object = self.pop(bci, state)?;
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Object,
                    NodeKind::CheckCast {
                        class: class.clone(),
                        object,
                    },
                );
                self.push(block, bci, state, node)?;
            }
            InstanceOf(class) => {
                let object = self.pop(bci, state)?;
                let node = self.graph.append(
                    block,
                    bci,
                    ValueKind::Int,
                    NodeKind::InstanceOf {
                        class: class.clone(),
                        object,
                    },
                );
                self.push(block, bci, state, node)?;
            }

            Invoke { kind, method } => {
                let mut args = vec![NodeId::new(0); method.params.len()];
                for i in (0..method.params.len()).rev() {
                    args[i] = self.pop(bci, state)?;
                }
                let receiver = if *kind == InvokeKind::Static {
                    None
                } else {
                    Some(self.pop(bci, state)?)
                };
                let result = method.return_kind;
                let node = self.graph.append(
                    block,
                    bci,
                    result,
                    NodeKind::Call {
                        target: method.clone(),
                        receiver,
                        args,
                    },
                );
                if result != ValueKind::Void {
                    self.push(block, bci, state, node)?;
                }
            }

            MonitorEnter => {
                let object = self.pop(bci, state)?;
                self.graph.append(
                    block,
                    bci,
                    ValueKind::Illegal,
                    NodeKind::MonitorEnter { object },
                );
            }
            MonitorExit => {
                let object = self.pop(bci, state)?;
                self.graph.append(
                    block,
                    bci,
                    ValueKind::Illegal,
                    NodeKind::MonitorExit { object },
                );
            }
        }
        Ok(false)
    }

    // =========================================================================
    // Small helpers
    // =========================================================================

    fn push(
        &self,
        block: BlockId,
        bci: u32,
        state: &mut VmState,
        node: NodeId,
    ) -> CompileResult<()> {
        state.push(node).map_err(|e| CompileError::StackOverflow {
            limit: e.limit,
            block: block.index(),
            bci,
        })
    }

    fn push_const(
        &mut self,
        block: BlockId,
        bci: u32,
        state: &mut VmState,
        c: ConstValue,
    ) -> CompileResult<()> {
        let node = self.graph.append_const(block, bci, c);
        self.push(block, bci, state, node)
    }

    fn pop(&self, bci: u32, state: &mut VmState) -> CompileResult<NodeId> {
        state.pop().ok_or_else(|| self.underflow(bci))
    }

    fn underflow(&self, bci: u32) -> CompileError {
        CompileError::internal(format!("operand stack underflow at bci {}", bci))
    }

    fn barrier(&mut self, block: BlockId, bci: u32, kind: BarrierKind) {
        self.graph
            .append(block, bci, ValueKind::Illegal, NodeKind::MemBarrier { kind });
    }

    /// Branch operands. Two-operand forms pop both; single-operand forms
    /// compare against a materialized zero or null.
    fn if_operands(
        &mut self,
        block: BlockId,
        bci: u32,
        op: u16,
        state: &mut VmState,
    ) -> CompileResult<(NodeId, NodeId)> {
        match op {
            IF_ICMPEQ | IF_ICMPNE | IF_ICMPLT | IF_ICMPGE | IF_ICMPGT | IF_ICMPLE | IF_ACMPEQ
            | IF_ACMPNE => {
                let right = self.pop(bci, state)?;
                let left = self.pop(bci, state)?;
                Ok((left, right))
            }
            IFEQ | IFNE | IFLT | IFGE | IFGT | IFLE => {
                let left = self.pop(bci, state)?;
                let right = self.graph.append_const(block, bci, ConstValue::Int(0));
                Ok((left, right))
            }
            IFNULL | IFNONNULL => {
                let left = self.pop(bci, state)?;
                let right = self.graph.append_const(block, bci, ConstValue::Null);
                Ok((left, right))
            }
            _ => Err(CompileError::internal(format!(
                "unexpected branch opcode {}",
                bytecode::name(op)
            ))),
        }
    }

    fn fallthrough(&self, block: BlockId) -> CompileResult<BlockId> {
        self.target(self.graph.block(block).end_bci)
    }
}

// =============================================================================
// Instruction properties
// =============================================================================

fn may_trap(instr: &DecodedInstr) -> bool {
    use DecodedInstr::*;
    match instr {
        Arith(op) | Shift(op) | Logic(op) | Negate(op) | Convert(op) | Compare(op) => {
            bytecode::can_trap(*op)
        }
        GetField(_) | PutField(_) | ArrayLoad(_) | ArrayStore(_) | ArrayLength | New(_)
        | NewTypeArray(_) | NewObjArray(_) | MultiNewArray { .. } | CheckCast(_)
        | InstanceOf(_) | Invoke { .. } | MonitorEnter | MonitorExit | Throw => true,
        _ => false,
    }
}

fn op_result_kind(op: u16) -> ValueKind {
    match op {
        IADD | ISUB | IMUL | IDIV | IREM | INEG | ISHL | ISHR | IUSHR | IAND | IOR | IXOR => {
            ValueKind::Int
        }
        LADD | LSUB | LMUL | LDIV | LREM | LNEG | LSHL | LSHR | LUSHR | LAND | LOR | LXOR => {
            ValueKind::Long
        }
        FADD | FSUB | FMUL | FDIV | FREM | FNEG => ValueKind::Float,
        DADD | DSUB | DMUL | DDIV | DREM | DNEG => ValueKind::Double,
        _ => ValueKind::Illegal,
    }
}

fn convert_result_kind(op: u16) -> ValueKind {
    match op {
        L2I | F2I | D2I | I2B | I2C | I2S => ValueKind::Int,
        I2L | F2L | D2L => ValueKind::Long,
        I2F | L2F | D2F => ValueKind::Float,
        I2D | L2D | F2D => ValueKind::Double,
        _ => ValueKind::Illegal,
    }
}

// =============================================================================
// Tests
// =============================================================================
