//! Phi verification pass.
//!
//! Runs between graph construction and instruction selection. Every phi
//! must carry exactly one input per predecessor edge, positionally
//! aligned with the owning block's predecessor list, and all inputs must
//! agree with the phi's kind. A violation is a compiler defect, never a
//! property of the input program.

use crate::error::{CompileError, CompileResult};
use crate::hir::graph::HirGraph;
use crate::hir::node::NodeKind;

/// Check phi arity and kind agreement across the whole graph.
pub fn resolve_phis(graph: &HirGraph) -> CompileResult<()> {
    for (block_id, block) in graph.blocks.iter() {
        for &phi in &block.phis {
            let node = graph.node(phi);
            let inputs = match &node.kind {
                NodeKind::Phi { inputs, block: owner, .. } => {
                    if *owner != block_id {
                        return Err(CompileError::internal(format!(
                            "phi {:?} listed in block {:?} but owned by {:?}",
                            phi, block_id, owner
                        )));
                    }
                    inputs
                }
                other => {
                    return Err(CompileError::internal(format!(
                        "non-phi node {:?} ({}) in phi list of block {:?}",
                        phi,
                        other.mnemonic(),
                        block_id
                    )))
                }
            };

            if inputs.len() != block.predecessors.len() {
                return Err(CompileError::internal(format!(
                    "phi {:?} in block {:?} has {} inputs for {} predecessors",
                    phi,
                    block_id,
                    inputs.len(),
                    block.predecessors.len()
                )));
            }

            let kind = node.value_kind();
            for &input in inputs {
                if graph.kind_of(input) != kind {
                    return Err(CompileError::internal(format!(
                        "phi {:?} ({}) has input {:?} of kind {}",
                        phi,
                        kind,
                        input,
                        graph.kind_of(input)
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::node::{HirNode, NodeKind, PhiSlot};
    use crate::hir::state::VmState;
    use crate::hir::types::{ConstValue, Value};

    #[test]
    fn test_well_formed_join_passes() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let a = g.new_block(4, 8);
        let b = g.new_block(8, 12);
        let join = g.new_block(12, 16);

        let v1 = g.append_const(a, 4, ConstValue::Int(1));
        let v2 = g.append_const(b, 8, ConstValue::Int(2));

        g.seal(
            entry,
            0,
            NodeKind::If {
                op: crate::bytecode::IFEQ,
                left: v1,
                right: v2,
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

        resolve_phis(&g).unwrap();
    }

    #[test]
    fn test_arity_mismatch_is_internal_error() {
        let mut g = HirGraph::new();
        let entry = g.entry();
        let join = g.new_block(4, 8);

        // Two predecessor edges, but a phi with a single input.
        g.seal(
            entry,
            0,
            NodeKind::If {
                op: crate::bytecode::IFEQ,
                left: crate::hir::node::NodeId::new(0),
                right: crate::hir::node::NodeId::new(0),
            },
            &[join, join],
        )
        .unwrap();

        let v = g.append_const(entry, 0, ConstValue::Int(1));
        let phi = g.nodes.alloc(HirNode {
            value: Value::of(crate::hir::types::ValueKind::Int),
            bci: 4,
            kind: NodeKind::Phi {
                slot: PhiSlot::Local(0),
                block: join,
                inputs: smallvec::smallvec![v],
            },
        });
        g.block_mut(join).phis.push(phi);

        let err = resolve_phis(&g).unwrap_err();
        assert!(!err.is_bailout());
    }
}
