//! High-level IR: SSA over basic blocks.
//!
//! Construction runs by abstract interpretation of pre-decoded bytecode
//! ([`builder`]), producing a [`HirGraph`] whose merge points carry phis
//! ([`graph`]). Each freshly built node gets a single local-rewrite
//! opportunity ([`ideal`]) before entering its block. The [`phi`] pass
//! verifies the graph before instruction selection consumes it.

pub mod builder;
pub mod graph;
mod ideal;
pub mod node;
pub mod phi;
pub mod state;
pub mod types;

pub use builder::{build, DecodedBlock, DecodedInstr, InvokeKind, MethodDescriptor};
pub use graph::{Block, BlockFlags, ExceptionHandler, HirGraph};
pub use node::{BarrierKind, BlockId, HirNode, NodeId, NodeKind, PhiSlot};
pub use phi::resolve_phis;
pub use state::VmState;
pub use types::{ClassId, ClassRef, ConstValue, FieldRef, MethodRef, Value, ValueKind};
