//! Instruction selection: HIR to LIR.
//!
//! One pass over the graph, breadth-first from the entry block,
//! lowering each node to pseudo-x64 over virtual registers:
//! - **Two-operand arithmetic**: `mov dest, left` then `op dest, right`
//! - **Pinned registers** where the machine demands them: shift counts
//!   in RCX, allocation inputs in fixed registers, return values in
//!   RAX/XMM0
//! - **SSA destruction**: every phi gets a virtual register up front;
//!   predecessor blocks copy their input into it before jumping. A
//!   conditional taken-edge that would need copies is a bailout.
//! - **Slow paths**: allocations and checked casts get out-of-line
//!   stubs with continuation labels
//!
//! Integer division and remainder bail out: they need deoptimization
//! metadata this tier does not carry.

use crate::arena::SecondaryMap;
use crate::bytecode::*;
use crate::error::{bail_out, CompileError, CompileResult};
use crate::hir::graph::HirGraph;
use crate::hir::node::{BlockId, NodeId, NodeKind};
use crate::hir::types::{ClassRef, ConstValue, ValueKind};
use crate::lir::instr::{BinOp, Condition, JumpTarget, LirInstr};
use crate::lir::operand::{
    return_register, CpuRegister, Gpr, LirOperand, VirtualRegister,
};
use crate::lir::program::Lir;
use crate::lir::stub::{CodeStub, RuntimeStubs, StubId, StubKind};

/// Select LIR for a verified HIR graph.
pub fn select<R: RuntimeStubs>(graph: &HirGraph, runtime: &R) -> CompileResult<Lir> {
    log::debug!("selecting lir for {} blocks", graph.blocks.len());
    LirBuilder::new(graph, runtime).run()
}

struct LirBuilder<'a, R: RuntimeStubs> {
    graph: &'a HirGraph,
    runtime: &'a R,
    lir: Lir,
    /// Lowered operand of each HIR node, filled in definition order.
    operands: SecondaryMap<crate::hir::node::HirNode, Option<LirOperand>>,
    next_vreg: u32,
}

impl<'a, R: RuntimeStubs> LirBuilder<'a, R> {
    fn new(graph: &'a HirGraph, runtime: &'a R) -> Self {
        LirBuilder {
            graph,
            runtime,
            lir: Lir::new(),
            operands: SecondaryMap::with_capacity(graph.nodes.len()),
            next_vreg: 0,
        }
    }

    fn run(mut self) -> CompileResult<Lir> {
        // Phis get their registers before any block is visited so every
        // predecessor knows where to put its copy.
        for id in self.graph.blocks.ids() {
            for i in 0..self.graph.block(id).phis.len() {
                let phi = self.graph.block(id).phis[i];
                let reg = self.new_vreg(self.graph.kind_of(phi));
                self.operands.set(phi, Some(LirOperand::Reg(reg)));
            }
        }

        // Breadth-first over reachable blocks; each visited exactly once,
        // successors enqueued only after the block is fully lowered.
        let mut worklist = std::collections::VecDeque::new();
        let mut queued = rustc_hash::FxHashSet::default();
        worklist.push_back(self.graph.entry());
        queued.insert(self.graph.entry());

        while let Some(id) = worklist.pop_front() {
            let block = self.graph.block(id);
            if id == self.graph.entry() {
                self.lir.append(id, LirInstr::NormalEntry);
            }
            for &node in &block.nodes {
                self.lower_node(id, node)?;
            }
            let term = block.terminator.ok_or_else(|| {
                CompileError::internal(format!("reachable block {:?} has no terminator", id))
            })?;
            self.lower_terminator(id, term)?;

            for &succ in &block.successors {
                if queued.insert(succ) {
                    worklist.push_back(succ);
                }
            }
        }

        Ok(self.lir)
    }

    // =========================================================================
    // Registers and operands
    // =========================================================================

    fn new_vreg(&mut self, kind: ValueKind) -> VirtualRegister {
        let id = self.next_vreg;
        self.next_vreg += 1;
        VirtualRegister::new(id, kind)
    }

    fn pinned_vreg(&mut self, kind: ValueKind, reg: CpuRegister) -> VirtualRegister {
        let id = self.next_vreg;
        self.next_vreg += 1;
        VirtualRegister::pinned_to(id, kind, reg)
    }

    fn pinned_gpr(&mut self, kind: ValueKind, reg: Gpr) -> VirtualRegister {
        self.pinned_vreg(kind, CpuRegister::Gpr(reg))
    }

    /// Lowered operand of a node. Constants materialize lazily; anything
    /// else must have been defined by an earlier block or instruction.
    fn operand_of(&mut self, node: NodeId) -> CompileResult<LirOperand> {
        if let Some(Some(op)) = self.operands.get(node) {
            return Ok(op.clone());
        }
        let hir = self.graph.node(node);
        if let Some(c) = hir.value.as_constant() {
            let op = LirOperand::Const(c);
            self.operands.set(node, Some(op.clone()));
            return Ok(op);
        }
        Err(CompileError::internal(format!(
            "node {:?} ({}) used before it was lowered",
            node,
            hir.kind.mnemonic()
        )))
    }

    /// Like [`operand_of`], but guaranteed to land in a register.
    fn load_to_reg(&mut self, block: BlockId, node: NodeId) -> CompileResult<LirOperand> {
        let op = self.operand_of(node)?;
        Ok(self.force_reg(block, op))
    }

    fn force_reg(&mut self, block: BlockId, op: LirOperand) -> LirOperand {
        match op {
            LirOperand::Reg(_) => op,
            other => {
                let reg = LirOperand::Reg(self.new_vreg(other.kind()));
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: reg.clone(),
                        src: other,
                    },
                );
                reg
            }
        }
    }

    fn define(&mut self, node: NodeId, op: LirOperand) {
        self.operands.set(node, Some(op));
    }

    fn klass_const(&self, class: &ClassRef) -> LirOperand {
        LirOperand::Const(ConstValue::Long(self.runtime.klass_pointer(class.id) as i64))
    }

    // =========================================================================
    // Node lowering
    // =========================================================================

    fn lower_node(&mut self, block: BlockId, id: NodeId) -> CompileResult<()> {
        let node = self.graph.node(id);
        match &node.kind {
            NodeKind::Constant => {
                // Materialized at use sites.
            }
            NodeKind::Param { .. } => {
                let reg = LirOperand::Reg(self.new_vreg(node.value_kind()));
                self.define(id, reg);
            }

            NodeKind::Arith { op, left, right } => {
                self.lower_arith(block, id, *op, *left, *right)?
            }
            NodeKind::Shift { op, left, right } => {
                self.lower_shift(block, id, *op, *left, *right)?
            }
            NodeKind::Logic { op, left, right } => {
                let bin = match *op {
                    IAND | LAND => BinOp::And,
                    IOR | LOR => BinOp::Or,
                    IXOR | LXOR => BinOp::Xor,
                    other => {
                        return Err(CompileError::internal(format!(
                            "not a logic opcode: {}",
                            name(other)
                        )))
                    }
                };
                self.two_operand(block, id, bin, *left, *right)?;
            }
            NodeKind::Negate { operand } => {
                let src = self.operand_of(*operand)?;
                let dest = LirOperand::Reg(self.new_vreg(node.value_kind()));
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: dest.clone(),
                        src,
                    },
                );
                self.lir.append(block, LirInstr::Neg { dest: dest.clone() });
                self.define(id, dest);
            }
            NodeKind::Compare { op, left, right } => {
                self.lower_compare(block, id, *op, *left, *right)?
            }
            NodeKind::Convert { op, operand } => {
                let src = self.operand_of(*operand)?;
                let dest = LirOperand::Reg(self.new_vreg(node.value_kind()));
                self.lir.append(
                    block,
                    LirInstr::TypeCast {
                        op: *op,
                        dest: dest.clone(),
                        src,
                    },
                );
                self.define(id, dest);
            }

            NodeKind::LoadField { object, field } => {
                let base = match object {
                    Some(obj) => self.load_to_reg(block, *obj)?,
                    None => self.klass_const(&field.holder),
                };
                let addr = crate::lir::operand::Address::offset(base, field.offset, field.kind);
                let dest = LirOperand::Reg(self.new_vreg(field.kind));
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: dest.clone(),
                        src: LirOperand::Addr(addr),
                    },
                );
                self.define(id, dest);
            }
            NodeKind::StoreField {
                object,
                field,
                value,
            } => {
                let base = match object {
                    Some(obj) => self.load_to_reg(block, *obj)?,
                    None => self.klass_const(&field.holder),
                };
                let src = self.operand_of(*value)?;
                let addr = crate::lir::operand::Address::offset(base, field.offset, field.kind);
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: LirOperand::Addr(addr),
                        src,
                    },
                );
            }

            NodeKind::LoadIndex { array, index, elem } => {
                let addr = self.element_address(block, *array, *index, *elem)?;
                let dest = LirOperand::Reg(self.new_vreg(*elem));
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: dest.clone(),
                        src: LirOperand::Addr(addr),
                    },
                );
                self.define(id, dest);
            }
            NodeKind::StoreIndex {
                array,
                index,
                elem,
                value,
            } => {
                let addr = self.element_address(block, *array, *index, *elem)?;
                let src = self.operand_of(*value)?;
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: LirOperand::Addr(addr),
                        src,
                    },
                );
            }
            NodeKind::ArrayLength { array } => {
                let base = self.load_to_reg(block, *array)?;
                let addr = crate::lir::operand::Address::offset(
                    base,
                    self.runtime.array_length_offset(),
                    ValueKind::Int,
                );
                let dest = LirOperand::Reg(self.new_vreg(ValueKind::Int));
                self.lir.append(
                    block,
                    LirInstr::Mov {
                        dest: dest.clone(),
                        src: LirOperand::Addr(addr),
                    },
                );
                self.define(id, dest);
            }

            NodeKind::NewInstance { class } => self.lower_new_instance(block, id, class)?,
            NodeKind::NewTypeArray { elem, length } => {
                let class = ClassRef {
                    id: crate::hir::types::ClassId(u32::MAX),
                    name: format!("[{}", elem),
                };
                self.lower_new_array(block, id, &class, *length, *elem)?
            }
            NodeKind::NewObjectArray { class, length } => {
                self.lower_new_array(block, id, class, *length, ValueKind::Object)?
            }
            NodeKind::NewMultiArray { class, sizes } => {
                self.lower_new_multi_array(block, id, class, sizes.clone())?
            }

            NodeKind::CheckCast { class, object } => {
                let obj = self.load_to_reg(block, *object)?;
                let continuation = self.lir.new_label();
                let stub = self.lir.add_stub(CodeStub {
                    kind: StubKind::ClassCastException,
                    address: self.runtime.stub_address(StubKind::ClassCastException),
                    continuation,
                    operands: smallvec::smallvec![obj.clone()],
                });
                self.lir.append(
                    block,
                    LirInstr::CheckCast {
                        object: obj.clone(),
                        class: class.clone(),
                        stub,
                    },
                );
                self.lir.append(block, LirInstr::Label { label: continuation });
                self.define(id, obj);
            }
            NodeKind::InstanceOf { class, object } => {
                let obj = self.load_to_reg(block, *object)?;
                let dest = LirOperand::Reg(self.new_vreg(ValueKind::Int));
                self.lir.append(
                    block,
                    LirInstr::InstanceOf {
                        dest: dest.clone(),
                        object: obj,
                        class: class.clone(),
                    },
                );
                self.define(id, dest);
            }

            NodeKind::Call {
                target,
                receiver,
                args,
            } => {
                let mut lowered = Vec::with_capacity(args.len() + 1);
                if let Some(r) = receiver {
                    lowered.push(self.load_to_reg(block, *r)?);
                }
                for &a in args {
                    lowered.push(self.operand_of(a)?);
                }
                let kind = target.return_kind;
                if kind == ValueKind::Void {
                    self.lir.append(
                        block,
                        LirInstr::Call {
                            dest: LirOperand::Illegal,
                            method: target.clone(),
                            args: lowered,
                        },
                    );
                } else {
                    let ret = LirOperand::Reg(self.pinned_vreg(kind, return_register(kind)));
                    self.lir.append(
                        block,
                        LirInstr::Call {
                            dest: ret.clone(),
                            method: target.clone(),
                            args: lowered,
                        },
                    );
                    // Move out of the fixed register right away to keep
                    // its live range short.
                    let dest = LirOperand::Reg(self.new_vreg(kind));
                    self.lir.append(
                        block,
                        LirInstr::Mov {
                            dest: dest.clone(),
                            src: ret,
                        },
                    );
                    self.define(id, dest);
                }
            }

            NodeKind::MonitorEnter { object } => {
                let obj = self.load_to_reg(block, *object)?;
                self.lir.append(block, LirInstr::MonitorEnter { object: obj });
            }
            NodeKind::MonitorExit { object } => {
                let obj = self.load_to_reg(block, *object)?;
                self.lir.append(block, LirInstr::MonitorExit { object: obj });
            }
            NodeKind::MemBarrier { kind } => {
                self.lir.append(block, LirInstr::Membar { kind: *kind });
            }

            NodeKind::Phi { .. } => {
                // Pre-assigned; predecessors fill the register.
            }

            other => {
                return Err(CompileError::internal(format!(
                    "terminator {} in block body",
                    other.mnemonic()
                )))
            }
        }
        Ok(())
    }

    fn lower_arith(
        &mut self,
        block: BlockId,
        id: NodeId,
        op: u16,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<()> {
        let bin = match op {
            IADD | LADD | FADD | DADD => BinOp::Add,
            ISUB | LSUB | FSUB | DSUB => BinOp::Sub,
            IMUL | LMUL | FMUL | DMUL => BinOp::Mul,
            FDIV | DDIV => BinOp::Div,
            FREM | DREM => BinOp::Rem,
            IDIV | LDIV | IREM | LREM => {
                return bail_out(format!(
                    "{} needs deoptimization support",
                    name(op)
                ))
            }
            other => {
                return Err(CompileError::internal(format!(
                    "not an arithmetic opcode: {}",
                    name(other)
                )))
            }
        };
        self.two_operand(block, id, bin, left, right)
    }

    /// `mov dest, left` then `op dest, right`.
    fn two_operand(
        &mut self,
        block: BlockId,
        id: NodeId,
        op: BinOp,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<()> {
        let left_op = self.operand_of(left)?;
        let right_op = self.operand_of(right)?;
        let dest = LirOperand::Reg(self.new_vreg(self.graph.kind_of(id)));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: dest.clone(),
                src: left_op,
            },
        );
        self.lir.append(
            block,
            LirInstr::Op2 {
                op,
                dest: dest.clone(),
                src: right_op,
            },
        );
        self.define(id, dest);
        Ok(())
    }

    fn lower_shift(
        &mut self,
        block: BlockId,
        id: NodeId,
        op: u16,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<()> {
        let bin = match op {
            ISHL | LSHL => BinOp::Shl,
            ISHR | LSHR => BinOp::Shr,
            IUSHR | LUSHR => BinOp::Ushr,
            other => {
                return Err(CompileError::internal(format!(
                    "not a shift opcode: {}",
                    name(other)
                )))
            }
        };

        let value_op = self.operand_of(left)?;
        let count_op = self.operand_of(right)?;
        let dest = LirOperand::Reg(self.new_vreg(self.graph.kind_of(id)));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: dest.clone(),
                src: value_op,
            },
        );

        // Immediate counts encode directly; variable counts live in RCX.
        let src = if count_op.is_constant() {
            count_op
        } else {
            let rcx = LirOperand::Reg(self.pinned_gpr(ValueKind::Int, Gpr::Rcx));
            self.lir.append(
                block,
                LirInstr::Mov {
                    dest: rcx.clone(),
                    src: count_op,
                },
            );
            rcx
        };
        self.lir.append(
            block,
            LirInstr::Op2 {
                op: bin,
                dest: dest.clone(),
                src,
            },
        );
        self.define(id, dest);
        Ok(())
    }

    fn lower_compare(
        &mut self,
        block: BlockId,
        id: NodeId,
        op: u16,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<()> {
        let left_op = self.load_to_reg(block, left)?;
        let right_op = self.load_to_reg(block, right)?;
        let dest = LirOperand::Reg(self.new_vreg(ValueKind::Int));
        let instr = match op {
            LCMP => LirInstr::Lcmp {
                dest: dest.clone(),
                left: left_op,
                right: right_op,
            },
            FCMPL | DCMPL => LirInstr::Fcmp {
                dest: dest.clone(),
                left: left_op,
                right: right_op,
                unordered_less: true,
            },
            FCMPG | DCMPG => LirInstr::Fcmp {
                dest: dest.clone(),
                left: left_op,
                right: right_op,
                unordered_less: false,
            },
            other => {
                return Err(CompileError::internal(format!(
                    "not a three-way compare: {}",
                    name(other)
                )))
            }
        };
        self.lir.append(block, instr);
        self.define(id, dest);
        Ok(())
    }

    fn element_address(
        &mut self,
        block: BlockId,
        array: NodeId,
        index: NodeId,
        elem: ValueKind,
    ) -> CompileResult<crate::lir::operand::Address> {
        let base = self.load_to_reg(block, array)?;
        let scale = elem.element_size();
        let disp = self.runtime.array_base_offset(elem);
        let index_op = self.operand_of(index)?;
        Ok(match index_op {
            // Constant indices fold into the displacement when it still fits
            // in 32 bits; otherwise fall back to the register-indexed form.
            LirOperand::Const(ConstValue::Int(i)) => {
                let full = disp as i64 + i as i64 * scale as i64;
                match i32::try_from(full) {
                    Ok(folded) => crate::lir::operand::Address::offset(base, folded, elem),
                    Err(_) => {
                        let index_reg =
                            self.force_reg(block, LirOperand::Const(ConstValue::Int(i)));
                        crate::lir::operand::Address::indexed(base, index_reg, scale, disp, elem)
                    }
                }
            }
            other => {
                let index_reg = self.force_reg(block, other);
                crate::lir::operand::Address::indexed(base, index_reg, scale, disp, elem)
            }
        })
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    fn lower_new_instance(
        &mut self,
        block: BlockId,
        id: NodeId,
        class: &ClassRef,
    ) -> CompileResult<()> {
        // Slow path wants the klass pointer in RDX and returns in RAX.
        let klass = LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rdx));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: klass.clone(),
                src: self.klass_const(class),
            },
        );
        let ret = LirOperand::Reg(self.pinned_gpr(ValueKind::Object, Gpr::Rax));

        let continuation = self.lir.new_label();
        let stub = self.lir.add_stub(CodeStub {
            kind: StubKind::NewInstance,
            address: self.runtime.stub_address(StubKind::NewInstance),
            continuation,
            operands: smallvec::smallvec![klass, ret.clone()],
        });
        self.lir.append(
            block,
            LirInstr::Jmp {
                target: JumpTarget::Stub(stub),
            },
        );
        self.lir.append(block, LirInstr::Label { label: continuation });

        let dest = LirOperand::Reg(self.new_vreg(ValueKind::Object));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: dest.clone(),
                src: ret,
            },
        );
        self.define(id, dest);
        Ok(())
    }

    fn lower_new_array(
        &mut self,
        block: BlockId,
        id: NodeId,
        class: &ClassRef,
        length: NodeId,
        elem: ValueKind,
    ) -> CompileResult<()> {
        // Fixed conventions: length in RBX, klass in RDX, temps in
        // RCX/RSI/RDI, result in RAX.
        let len_op = self.operand_of(length)?;
        let len = LirOperand::Reg(self.pinned_gpr(ValueKind::Int, Gpr::Rbx));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: len.clone(),
                src: len_op,
            },
        );
        let klass = LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rdx));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: klass.clone(),
                src: self.klass_const(class),
            },
        );
        let ret = LirOperand::Reg(self.pinned_gpr(ValueKind::Object, Gpr::Rax));
        let temps = [
            LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rcx)),
            LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rsi)),
            LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rdi)),
            ret.clone(),
        ];

        let continuation = self.lir.new_label();
        let stub = self.lir.add_stub(CodeStub {
            kind: StubKind::NewArray,
            address: self.runtime.stub_address(StubKind::NewArray),
            continuation,
            operands: smallvec::smallvec![klass.clone(), len.clone(), ret.clone()],
        });
        self.lir.append(
            block,
            LirInstr::AllocateArray {
                stub,
                klass,
                result: ret.clone(),
                length: len,
                temps,
                elem,
            },
        );
        self.lir.append(block, LirInstr::Label { label: continuation });

        let dest = LirOperand::Reg(self.new_vreg(ValueKind::Object));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: dest.clone(),
                src: ret,
            },
        );
        self.define(id, dest);
        Ok(())
    }

    fn lower_new_multi_array(
        &mut self,
        block: BlockId,
        id: NodeId,
        class: &ClassRef,
        sizes: Vec<NodeId>,
    ) -> CompileResult<()> {
        // Dimension sizes spill to the stack; the runtime reads them
        // through a varargs pointer in RCX. Klass rides in RBX so it
        // cannot clash with the varargs setup, rank in RDX.
        let rsp = LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rsp));
        for (i, &size) in sizes.iter().enumerate() {
            let src = self.operand_of(size)?;
            let slot = crate::lir::operand::Address::offset(
                rsp.clone(),
                (i * 8) as i32,
                ValueKind::Int,
            );
            self.lir.append(
                block,
                LirInstr::Mov {
                    dest: LirOperand::Addr(slot),
                    src,
                },
            );
        }

        let klass = LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rbx));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: klass.clone(),
                src: self.klass_const(class),
            },
        );
        let rank = LirOperand::Reg(self.pinned_gpr(ValueKind::Int, Gpr::Rdx));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: rank.clone(),
                src: LirOperand::Const(ConstValue::Int(sizes.len() as i32)),
            },
        );
        let varargs = LirOperand::Reg(self.pinned_gpr(ValueKind::Long, Gpr::Rcx));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: varargs.clone(),
                src: rsp,
            },
        );

        let ret = LirOperand::Reg(self.pinned_gpr(ValueKind::Object, Gpr::Rax));
        self.lir.append(
            block,
            LirInstr::CallRt {
                dest: ret.clone(),
                address: self.runtime.stub_address(StubKind::NewMultiArray),
                args: smallvec::smallvec![klass, rank, varargs],
            },
        );

        let dest = LirOperand::Reg(self.new_vreg(ValueKind::Object));
        self.lir.append(
            block,
            LirInstr::Mov {
                dest: dest.clone(),
                src: ret,
            },
        );
        self.define(id, dest);
        Ok(())
    }

    // =========================================================================
    // Terminators
    // =========================================================================

    fn lower_terminator(&mut self, block: BlockId, term: NodeId) -> CompileResult<()> {
        let node = self.graph.node(term);
        let successors: Vec<BlockId> = self.graph.block(block).successors.to_vec();
        match &node.kind {
            NodeKind::Goto => {
                let succ = successors[0];
                self.emit_phi_moves(block, succ)?;
                self.lir.append(
                    block,
                    LirInstr::Jmp {
                        target: JumpTarget::Block(succ),
                    },
                );
            }
            NodeKind::If { op, left, right } => {
                let cond = Condition::from_branch(*op).ok_or_else(|| {
                    CompileError::internal(format!("not a branch opcode: {}", name(*op)))
                })?;
                let left_op = self.load_to_reg(block, *left)?;
                let right_op = self.operand_of(*right)?;
                self.lir.append(
                    block,
                    LirInstr::Cmp {
                        left: left_op,
                        right: right_op,
                    },
                );

                let taken = successors[0];
                let fallthrough = successors[1];
                if self.edge_needs_moves(block, taken) {
                    // Copies on the taken edge would need an extra block.
                    return bail_out(format!(
                        "critical edge from {:?} to {:?} carries phi inputs",
                        block, taken
                    ));
                }
                self.lir.append(
                    block,
                    LirInstr::Branch {
                        cond,
                        target: JumpTarget::Block(taken),
                    },
                );
                self.emit_phi_moves(block, fallthrough)?;
                self.lir.append(
                    block,
                    LirInstr::Jmp {
                        target: JumpTarget::Block(fallthrough),
                    },
                );
            }
            NodeKind::TableSwitch { index, low, high } => {
                for &succ in &successors {
                    if self.edge_needs_moves(block, succ) {
                        return bail_out(format!(
                            "critical edge from {:?} to {:?} carries phi inputs",
                            block, succ
                        ));
                    }
                }
                let index_op = self.load_to_reg(block, *index)?;
                let (targets, default) = successors
                    .split_last()
                    .map(|(d, t)| (t.to_vec(), *d))
                    .ok_or_else(|| {
                        CompileError::internal("tableswitch without successors")
                    })?;
                self.lir.append(
                    block,
                    LirInstr::TableSwitch {
                        index: index_op,
                        low: *low,
                        high: *high,
                        targets,
                        default,
                    },
                );
            }
            NodeKind::LookupSwitch { key, keys } => {
                for &succ in &successors {
                    if self.edge_needs_moves(block, succ) {
                        return bail_out(format!(
                            "critical edge from {:?} to {:?} carries phi inputs",
                            block, succ
                        ));
                    }
                }
                // Sparse keys lower to a compare chain.
                let key_op = self.load_to_reg(block, *key)?;
                let (default, targets) = successors.split_last().ok_or_else(|| {
                    CompileError::internal("lookupswitch without successors")
                })?;
                for (&k, &succ) in keys.iter().zip(targets) {
                    self.lir.append(
                        block,
                        LirInstr::Cmp {
                            left: key_op.clone(),
                            right: LirOperand::Const(ConstValue::Int(k)),
                        },
                    );
                    self.lir.append(
                        block,
                        LirInstr::Branch {
                            cond: Condition::Eq,
                            target: JumpTarget::Block(succ),
                        },
                    );
                }
                self.lir.append(
                    block,
                    LirInstr::Jmp {
                        target: JumpTarget::Block(*default),
                    },
                );
            }
            NodeKind::Return { value } => match value {
                None => self.lir.append(
                    block,
                    LirInstr::Return {
                        value: LirOperand::Illegal,
                    },
                ),
                Some(v) => {
                    let kind = self.graph.kind_of(*v);
                    let src = self.operand_of(*v)?;
                    let ret = LirOperand::Reg(self.pinned_vreg(kind, return_register(kind)));
                    self.lir.append(
                        block,
                        LirInstr::Mov {
                            dest: ret.clone(),
                            src,
                        },
                    );
                    self.lir.append(block, LirInstr::Return { value: ret });
                }
            },
            NodeKind::Throw { exception } => {
                let obj = self.load_to_reg(block, *exception)?;
                self.lir.append(block, LirInstr::Throw { exception: obj });
            }
            other => {
                return Err(CompileError::internal(format!(
                    "{} cannot terminate a block",
                    other.mnemonic()
                )))
            }
        }
        Ok(())
    }

    // =========================================================================
    // SSA destruction
    // =========================================================================

    /// Copies the edge `from -> to` must perform into `to`'s phi
    /// registers, as (phi register, input operand-source) pairs.
    fn edge_moves(&self, from: BlockId, to: BlockId) -> Vec<(LirOperand, NodeId)> {
        let to_block = self.graph.block(to);
        let edge_index = match to_block.predecessors.iter().position(|&p| p == from) {
            Some(i) => i,
            None => return Vec::new(),
        };

        let mut moves = Vec::new();
        for &phi in &to_block.phis {
            if let NodeKind::Phi { inputs, .. } = &self.graph.node(phi).kind {
                let input = inputs[edge_index];
                if input == phi {
                    // Self-input; the register already holds the value.
                    continue;
                }
                if let Some(Some(reg)) = self.operands.get(phi) {
                    moves.push((reg.clone(), input));
                }
            }
        }
        moves
    }

    fn edge_needs_moves(&self, from: BlockId, to: BlockId) -> bool {
        !self.edge_moves(from, to).is_empty()
    }

    fn emit_phi_moves(&mut self, from: BlockId, to: BlockId) -> CompileResult<()> {
        for (dest, input) in self.edge_moves(from, to) {
            let src = self.operand_of(input)?;
            if src == dest {
                continue;
            }
            self.lir.append(from, LirInstr::Mov { dest, src });
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::graph::HirGraph;
    use crate::hir::node::NodeKind;
    use crate::hir::state::VmState;
    use crate::hir::types::ClassId;

    /// Fixed-layout mock runtime for selection tests.
    pub(crate) struct MockRuntime;

    impl RuntimeStubs for MockRuntime {
        fn stub_address(&self, kind: StubKind) -> u64 {
            0x7000_0000 + kind as u64 * 0x100
        }

        fn klass_pointer(&self, class: ClassId) -> u64 {
            0x8000_0000 + class.0 as u64 * 0x1000
        }

        fn array_length_offset(&self) -> i32 {
            16
        }

        fn array_base_offset(&self, _elem: ValueKind) -> i32 {
            24
        }
    }

    fn has_mnemonic(lir: &Lir, block: BlockId, mnemonic: &str) -> bool {
        lir.instructions(block).iter().any(|i| i.mnemonic() == mnemonic)
    }

    #[test]
    fn test_arith_is_mov_then_op() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let a = g.append_param(0, ValueKind::Int);
        let b = g.append_param(1, ValueKind::Int);
        let sum = g.append(
            entry,
            0,
            ValueKind::Int,
            NodeKind::Arith {
                op: IADD,
                left: a,
                right: b,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(sum) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let instrs = lir.instructions(entry);
        let add_at = instrs
            .iter()
            .position(|i| matches!(i, LirInstr::Op2 { op: BinOp::Add, .. }))
            .unwrap();
        // The instruction before the add copies the left operand into
        // the result register.
        match (&instrs[add_at - 1], &instrs[add_at]) {
            (LirInstr::Mov { dest: mov_dest, .. }, LirInstr::Op2 { dest: op_dest, .. }) => {
                assert_eq!(mov_dest, op_dest);
            }
            _ => panic!("expected mov feeding op2"),
        }
    }

    #[test]
    fn test_integer_division_bails_out() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let a = g.append_param(0, ValueKind::Int);
        let b = g.append_param(1, ValueKind::Int);
        let q = g.append(
            entry,
            0,
            ValueKind::Int,
            NodeKind::Arith {
                op: IDIV,
                left: a,
                right: b,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(q) }, &[])
            .unwrap();

        let err = select(&g, &MockRuntime).unwrap_err();
        assert!(err.is_bailout());
    }

    #[test]
    fn test_variable_shift_count_pins_rcx() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let v = g.append_param(0, ValueKind::Int);
        let c = g.append_param(1, ValueKind::Int);
        let shifted = g.append(
            entry,
            0,
            ValueKind::Int,
            NodeKind::Shift {
                op: ISHL,
                left: v,
                right: c,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(shifted) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let pinned_rcx = lir.instructions(entry).iter().any(|i| match i {
            LirInstr::Mov { dest: LirOperand::Reg(r), .. } => {
                r.pinned == Some(CpuRegister::Gpr(Gpr::Rcx))
            }
            _ => false,
        });
        assert!(pinned_rcx);
    }

    #[test]
    fn test_constant_shift_count_stays_immediate() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let v = g.append_param(0, ValueKind::Int);
        let c = g.append_const(entry, 0, ConstValue::Int(3));
        let shifted = g.append(
            entry,
            0,
            ValueKind::Int,
            NodeKind::Shift {
                op: ISHL,
                left: v,
                right: c,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(shifted) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let shift_src_is_const = lir.instructions(entry).iter().any(|i| {
            matches!(
                i,
                LirInstr::Op2 {
                    op: BinOp::Shl,
                    src: LirOperand::Const(ConstValue::Int(3)),
                    ..
                }
            )
        });
        assert!(shift_src_is_const);
    }

    #[test]
    fn test_checkcast_always_creates_stub() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let obj = g.append_param(0, ValueKind::Object);
        let class = ClassRef {
            id: ClassId(7),
            name: "Widget".into(),
        };
        let cast = g.append(
            entry,
            0,
            ValueKind::Object,
            NodeKind::CheckCast {
                class,
                object: obj,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(cast) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        assert_eq!(lir.stub_count(), 1);
        let (_, stub) = lir.stubs().next().unwrap();
        assert_eq!(stub.kind, StubKind::ClassCastException);
        assert!(has_mnemonic(&lir, entry, "checkcast"));
        assert!(has_mnemonic(&lir, entry, "label"));
    }

    #[test]
    fn test_new_instance_pins_rdx_and_rax() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let class = ClassRef {
            id: ClassId(3),
            name: "Widget".into(),
        };
        let obj = g.append(entry, 0, ValueKind::Object, NodeKind::NewInstance { class });
        g.seal(entry, 0, NodeKind::Return { value: Some(obj) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        assert_eq!(lir.stub_count(), 1);
        let (_, stub) = lir.stubs().next().unwrap();
        assert_eq!(stub.kind, StubKind::NewInstance);
        match (&stub.operands[0], &stub.operands[1]) {
            (LirOperand::Reg(klass), LirOperand::Reg(ret)) => {
                assert_eq!(klass.pinned, Some(CpuRegister::Gpr(Gpr::Rdx)));
                assert_eq!(ret.pinned, Some(CpuRegister::Gpr(Gpr::Rax)));
            }
            _ => panic!("stub operands should be registers"),
        }
        // The fast path jumps straight to the stub and resumes after.
        assert!(has_mnemonic(&lir, entry, "jmp"));
        assert!(has_mnemonic(&lir, entry, "label"));
    }

    #[test]
    fn test_new_array_register_convention() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let len = g.append_const(entry, 0, ConstValue::Int(8));
        let arr = g.append(
            entry,
            0,
            ValueKind::Object,
            NodeKind::NewTypeArray {
                elem: ValueKind::Int,
                length: len,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(arr) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let alloc = lir
            .instructions(entry)
            .iter()
            .find_map(|i| match i {
                LirInstr::AllocateArray { length, klass, result, .. } => {
                    Some((length.clone(), klass.clone(), result.clone()))
                }
                _ => None,
            })
            .unwrap();
        let (length, klass, result) = alloc;
        assert_eq!(length.as_reg().unwrap().pinned, Some(CpuRegister::Gpr(Gpr::Rbx)));
        assert_eq!(klass.as_reg().unwrap().pinned, Some(CpuRegister::Gpr(Gpr::Rdx)));
        assert_eq!(result.as_reg().unwrap().pinned, Some(CpuRegister::Gpr(Gpr::Rax)));
    }

    #[test]
    fn test_goto_edge_copies_phi_input() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let a = g.new_block(4, 8);
        let b = g.new_block(8, 12);
        let join = g.new_block(12, 16);

        let v1 = g.append_const(a, 4, ConstValue::Int(1));
        let v2 = g.append_const(b, 8, ConstValue::Int(2));
        let p = g.append_param(0, ValueKind::Int);

        g.seal(
            entry,
            0,
            NodeKind::If {
                op: IFEQ,
                left: p,
                right: v1,
            },
            &[a, b],
        )
        .unwrap();
        g.seal(a, 7, NodeKind::Goto, &[join]).unwrap();
        g.seal(b, 11, NodeKind::Goto, &[join]).unwrap();

        let mut sa = VmState::new(2, 1);
        sa.store_local(0, v1);
        let mut sb = VmState::new(2, 1);
        sb.store_local(0, v2);
        g.merge_into(join, &sa).unwrap();
        g.merge_into(join, &sb).unwrap();

        let phi = g.block(join).phis[0];
        let ret = g.block(join).entry_state.as_ref().unwrap().local(0).unwrap();
        assert_eq!(phi, ret);
        g.seal(join, 12, NodeKind::Return { value: Some(ret) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        // Each predecessor ends with a copy into the phi register, then
        // the jump.
        for pred in [a, b] {
            let instrs = lir.instructions(pred);
            assert!(matches!(instrs[0], LirInstr::Mov { .. }));
            assert!(matches!(instrs[1], LirInstr::Jmp { .. }));
        }
    }

    #[test]
    fn test_phi_copies_on_taken_edge_bail_out() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(4, 8);

        let v1 = g.append_const(entry, 0, ConstValue::Int(1));
        let v2 = g.append_const(entry, 0, ConstValue::Int(2));
        let p = g.append_param(0, ValueKind::Int);

        // Both edges of the branch land on the same join with differing
        // local values, so the taken edge needs a copy.
        g.seal(
            entry,
            0,
            NodeKind::If {
                op: IFEQ,
                left: p,
                right: v1,
            },
            &[join, join],
        )
        .unwrap();

        let mut sa = VmState::new(2, 1);
        sa.store_local(0, v1);
        let mut sb = VmState::new(2, 1);
        sb.store_local(0, v2);
        g.merge_into(join, &sa).unwrap();
        g.merge_into(join, &sb).unwrap();

        let ret = g.block(join).entry_state.as_ref().unwrap().local(0).unwrap();
        g.seal(join, 4, NodeKind::Return { value: Some(ret) }, &[])
            .unwrap();

        let err = select(&g, &MockRuntime).unwrap_err();
        assert!(err.is_bailout());
    }

    #[test]
    fn test_dense_switch_keeps_targets_and_default_apart() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let b0 = g.new_block(4, 8);
        let b1 = g.new_block(8, 12);
        let b2 = g.new_block(12, 16);
        let d = g.new_block(16, 20);

        let p = g.append_param(0, ValueKind::Int);
        g.seal(
            entry,
            0,
            NodeKind::TableSwitch {
                index: p,
                low: 0,
                high: 2,
            },
            &[b0, b1, b2, d],
        )
        .unwrap();
        for blk in [b0, b1, b2, d] {
            g.seal(blk, 4, NodeKind::Return { value: None }, &[]).unwrap();
        }

        let lir = select(&g, &MockRuntime).unwrap();
        let switches: Vec<_> = lir
            .instructions(entry)
            .iter()
            .filter_map(|i| match i {
                LirInstr::TableSwitch {
                    low,
                    high,
                    targets,
                    default,
                    ..
                } => Some((*low, *high, targets.clone(), *default)),
                _ => None,
            })
            .collect();
        assert_eq!(switches.len(), 1);
        let (low, high, targets, default) = &switches[0];
        assert_eq!((*low, *high), (0, 2));
        assert_eq!(targets.as_slice(), &[b0, b1, b2]);
        assert_eq!(*default, d);
    }

    #[test]
    fn test_sparse_switch_is_a_compare_chain() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let b0 = g.new_block(4, 8);
        let b1 = g.new_block(8, 12);
        let d = g.new_block(12, 16);

        let p = g.append_param(0, ValueKind::Int);
        g.seal(
            entry,
            0,
            NodeKind::LookupSwitch {
                key: p,
                keys: vec![10, 20],
            },
            &[b0, b1, d],
        )
        .unwrap();
        for blk in [b0, b1, d] {
            g.seal(blk, 4, NodeKind::Return { value: None }, &[]).unwrap();
        }

        let lir = select(&g, &MockRuntime).unwrap();
        let instrs = lir.instructions(entry);
        // One Cmp/Branch pair per key, then the default jump.
        let cmp_keys: Vec<_> = instrs
            .iter()
            .filter_map(|i| match i {
                LirInstr::Cmp {
                    right: LirOperand::Const(ConstValue::Int(k)),
                    ..
                } => Some(*k),
                _ => None,
            })
            .collect();
        assert_eq!(cmp_keys, vec![10, 20]);
        let branch_targets: Vec<_> = instrs
            .iter()
            .filter_map(|i| match i {
                LirInstr::Branch {
                    cond: Condition::Eq,
                    target: JumpTarget::Block(b),
                } => Some(*b),
                _ => None,
            })
            .collect();
        assert_eq!(branch_targets, vec![b0, b1]);
        assert!(matches!(
            instrs.last(),
            Some(LirInstr::Jmp {
                target: JumpTarget::Block(blk),
            }) if *blk == d
        ));
    }

    #[test]
    fn test_small_constant_index_folds_into_displacement() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let arr = g.append_param(0, ValueKind::Object);
        let idx = g.append_const(entry, 0, ConstValue::Int(2));
        let loaded = g.append(
            entry,
            0,
            ValueKind::Int,
            NodeKind::LoadIndex {
                array: arr,
                index: idx,
                elem: ValueKind::Int,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(loaded) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let addr = lir
            .instructions(entry)
            .iter()
            .find_map(|i| match i {
                LirInstr::Mov {
                    src: LirOperand::Addr(a),
                    ..
                } => Some(a.clone()),
                _ => None,
            })
            .unwrap();
        assert!(addr.index.is_none());
        assert_eq!(addr.disp, 24 + 2 * 4);
    }

    #[test]
    fn test_huge_constant_index_keeps_register_form() {
        // Folding i32::MAX * 4 into the displacement would wrap, so the
        // index has to stay in a register.
        let mut g = HirGraph::new();
        let entry = g.entry();
        let arr = g.append_param(0, ValueKind::Object);
        let idx = g.append_const(entry, 0, ConstValue::Int(i32::MAX));
        let loaded = g.append(
            entry,
            0,
            ValueKind::Int,
            NodeKind::LoadIndex {
                array: arr,
                index: idx,
                elem: ValueKind::Int,
            },
        );
        g.seal(entry, 0, NodeKind::Return { value: Some(loaded) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let addr = lir
            .instructions(entry)
            .iter()
            .find_map(|i| match i {
                LirInstr::Mov {
                    src: LirOperand::Addr(a),
                    ..
                } => Some(a.clone()),
                _ => None,
            })
            .unwrap();
        assert!(addr.index.is_some());
        assert_eq!(addr.disp, 24);
        assert_eq!(addr.scale, 4);
    }

    #[test]
    fn test_float_return_uses_xmm0() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let v = g.append_param(0, ValueKind::Double);
        g.seal(entry, 0, NodeKind::Return { value: Some(v) }, &[])
            .unwrap();

        let lir = select(&g, &MockRuntime).unwrap();
        let ret_pinned = lir.instructions(entry).iter().any(|i| match i {
            LirInstr::Return {
                value: LirOperand::Reg(r),
            } => r.pinned == Some(CpuRegister::Xmm(crate::lir::operand::Xmm::Xmm0)),
            _ => false,
        });
        assert!(ret_pinned);
    }
}
