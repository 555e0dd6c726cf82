//! Method-at-a-time JIT middle end.
//!
//! Two lowering stages per method:
//! - Bytecode to SSA HIR by abstract interpretation, with phi insertion
//!   at merge points and loop headers
//! - HIR to pseudo-x64 LIR over virtual registers, with out-of-line
//!   slow-path stubs for allocation and cast failure
//!
//! Each compilation owns its arenas and side tables outright; nothing
//! here is shared between concurrently compiled methods, so the whole
//! pipeline is `Send` without locks. Unsupported shapes bail out with a
//! [`CompileError::Bailout`] and the caller stays in the interpreter.
#![deny(unsafe_op_in_unsafe_fn)]
pub mod arena;
pub mod bytecode;
pub mod error;
pub mod hir;
pub mod lir;

pub use error::{CompileError, CompileResult};
pub use hir::{DecodedBlock, DecodedInstr, HirGraph, InvokeKind, MethodDescriptor};
pub use lir::{Lir, RuntimeStubs};

/// Compile one method: build HIR, verify its phis, select LIR.
pub fn compile<R: RuntimeStubs>(
    method: &MethodDescriptor,
    blocks: &[DecodedBlock],
    runtime: &R,
) -> CompileResult<Lir> {
    log::info!("compiling {}", method.name);

    let graph = hir::build(method, blocks)?;
    log::trace!("hir for {}:\n{}", method.name, graph);

    hir::resolve_phis(&graph)?;

    let lir = lir::select(&graph, runtime)?;
    log::trace!("lir for {}:\n{}", method.name, lir);
    Ok(lir)
}
