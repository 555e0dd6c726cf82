//! End-to-end pipeline tests: decoded bytecode in, LIR out.

use ember_jit::bytecode::*;
use ember_jit::hir::{self, DecodedBlock, DecodedInstr, MethodDescriptor, NodeKind, PhiSlot};
use ember_jit::hir::types::{ClassId, ClassRef, ValueKind};
use ember_jit::lir::{LirInstr, RuntimeStubs, StubKind};
use ember_jit::{compile, CompileError};

struct FixedRuntime;

impl RuntimeStubs for FixedRuntime {
    fn stub_address(&self, kind: StubKind) -> u64 {
        0x7fff_0000 + kind as u64 * 0x40
    }

    fn klass_pointer(&self, class: ClassId) -> u64 {
        0x1_0000_0000 + class.0 as u64 * 0x800
    }

    fn array_length_offset(&self) -> i32 {
        16
    }

    fn array_base_offset(&self, _elem: ValueKind) -> i32 {
        24
    }
}

fn int_method(name: &str, max_stack: usize, max_locals: usize, params: usize) -> MethodDescriptor {
    MethodDescriptor {
        name: name.into(),
        max_stack,
        max_locals,
        params: vec![ValueKind::Int; params],
        return_kind: ValueKind::Int,
    }
}

fn block(start: u32, end: u32, code: Vec<(u32, DecodedInstr)>) -> DecodedBlock {
    DecodedBlock {
        start,
        end,
        loop_header: false,
        handler: None,
        code,
    }
}

#[test]
fn straight_line_add_compiles_to_mov_add_return() {
    // int add(int a, int b) { return a + b; }
    let method = int_method("add", 2, 2, 2);
    let blocks = vec![block(
        0,
        4,
        vec![
            (0, DecodedInstr::Load(ValueKind::Int, 0)),
            (1, DecodedInstr::Load(ValueKind::Int, 1)),
            (2, DecodedInstr::Arith(IADD)),
            (3, DecodedInstr::Return(ValueKind::Int)),
        ],
    )];

    let lir = compile(&method, &blocks, &FixedRuntime).unwrap();

    let mnemonics: Vec<&str> = (0..)
        .map_while(|i| {
            let b = ember_jit::hir::BlockId::new(i);
            let instrs = lir.instructions(b);
            if instrs.is_empty() {
                None
            } else {
                Some(instrs.iter().map(|x| x.mnemonic()).collect::<Vec<_>>())
            }
        })
        .flatten()
        .collect();

    assert!(mnemonics.contains(&"mov"));
    assert!(mnemonics.iter().any(|&m| m == "op2"));
    assert!(mnemonics.contains(&"return"));
    assert_eq!(lir.stub_count(), 0);
}

#[test]
fn branches_agreeing_on_a_value_need_no_phi() {
    //   0: iload_0; ifeq 5
    //   4: nop
    //   5: iload_0; ireturn
    let method = int_method("same", 2, 1, 1);
    let blocks = vec![
        block(
            0,
            4,
            vec![
                (0, DecodedInstr::Load(ValueKind::Int, 0)),
                (1, DecodedInstr::If { op: IFEQ, target: 5 }),
            ],
        ),
        block(4, 5, vec![(4, DecodedInstr::Nop)]),
        block(
            5,
            7,
            vec![
                (5, DecodedInstr::Load(ValueKind::Int, 0)),
                (6, DecodedInstr::Return(ValueKind::Int)),
            ],
        ),
    ];

    let graph = hir::build(&method, &blocks).unwrap();
    for (_, b) in graph.blocks.iter() {
        assert!(b.phis.is_empty());
    }

    // And the whole pipeline still goes through.
    compile(&method, &blocks, &FixedRuntime).unwrap();
}

#[test]
fn while_loop_gets_one_phi_per_live_local() {
    // int count(int n) { int i = 0; while (i < n) i = i + 1; return i; }
    let method = int_method("count", 2, 2, 1);
    let blocks = vec![
        block(
            0,
            2,
            vec![
                (0, DecodedInstr::ConstInt(0)),
                (1, DecodedInstr::Store(ValueKind::Int, 1)),
            ],
        ),
        DecodedBlock {
            start: 2,
            end: 7,
            loop_header: true,
            handler: None,
            code: vec![
                (2, DecodedInstr::Load(ValueKind::Int, 1)),
                (3, DecodedInstr::Load(ValueKind::Int, 0)),
                (
                    4,
                    DecodedInstr::If {
                        op: IF_ICMPGE,
                        target: 12,
                    },
                ),
            ],
        },
        block(
            7,
            12,
            vec![
                (7, DecodedInstr::Iinc(1, 1)),
                (9, DecodedInstr::Goto { target: 2 }),
            ],
        ),
        block(
            12,
            14,
            vec![
                (12, DecodedInstr::Load(ValueKind::Int, 1)),
                (13, DecodedInstr::Return(ValueKind::Int)),
            ],
        ),
    ];

    let graph = hir::build(&method, &blocks).unwrap();
    let header = graph
        .blocks
        .iter()
        .find(|(_, b)| b.is_loop_header())
        .map(|(id, _)| id)
        .unwrap();

    // Locals 0 (n) and 1 (i) are live at the header; the stack is empty.
    assert_eq!(graph.block(header).phis.len(), 2);
    for &phi in &graph.block(header).phis {
        match &graph.node(phi).kind {
            NodeKind::Phi { slot, inputs, .. } => {
                assert!(matches!(slot, PhiSlot::Local(0) | PhiSlot::Local(1)));
                assert_eq!(inputs.len(), 2);
            }
            _ => panic!("phi list holds a non-phi"),
        }
    }

    let lir = compile(&method, &blocks, &FixedRuntime).unwrap();
    assert!(lir.block_count() >= 4);
}

#[test]
fn checked_cast_always_reaches_a_stub() {
    // Widget w = (Widget) o; return 0;
    let class = ClassRef {
        id: ClassId(11),
        name: "Widget".into(),
    };
    let method = MethodDescriptor {
        name: "cast".into(),
        max_stack: 2,
        max_locals: 2,
        params: vec![ValueKind::Object],
        return_kind: ValueKind::Int,
    };
    let blocks = vec![block(
        0,
        6,
        vec![
            (0, DecodedInstr::Load(ValueKind::Object, 0)),
            (1, DecodedInstr::CheckCast(class)),
            (2, DecodedInstr::Store(ValueKind::Object, 1)),
            (3, DecodedInstr::ConstInt(0)),
            (4, DecodedInstr::Return(ValueKind::Int)),
        ],
    )];

    let lir = compile(&method, &blocks, &FixedRuntime).unwrap();
    assert_eq!(lir.stub_count(), 1);
    let (_, stub) = lir.stubs().next().unwrap();
    assert_eq!(stub.kind, StubKind::ClassCastException);
    assert_eq!(stub.address, FixedRuntime.stub_address(StubKind::ClassCastException));
}

#[test]
fn integer_division_bails_out_of_the_pipeline() {
    let method = int_method("div", 2, 2, 2);
    let blocks = vec![block(
        0,
        4,
        vec![
            (0, DecodedInstr::Load(ValueKind::Int, 0)),
            (1, DecodedInstr::Load(ValueKind::Int, 1)),
            (2, DecodedInstr::Arith(IDIV)),
            (3, DecodedInstr::Return(ValueKind::Int)),
        ],
    )];

    let err = compile(&method, &blocks, &FixedRuntime).unwrap_err();
    assert!(matches!(err, CompileError::Bailout { .. }));
}

#[test]
fn new_array_allocation_carries_stub_and_convention() {
    // int[] a = new int[n]; return a.length;
    let method = MethodDescriptor {
        name: "alloc".into(),
        max_stack: 2,
        max_locals: 1,
        params: vec![ValueKind::Int],
        return_kind: ValueKind::Int,
    };
    let blocks = vec![block(
        0,
        4,
        vec![
            (0, DecodedInstr::Load(ValueKind::Int, 0)),
            (1, DecodedInstr::NewTypeArray(ValueKind::Int)),
            (2, DecodedInstr::ArrayLength),
            (3, DecodedInstr::Return(ValueKind::Int)),
        ],
    )];

    let lir = compile(&method, &blocks, &FixedRuntime).unwrap();
    assert_eq!(lir.stub_count(), 1);
    let (_, stub) = lir.stubs().next().unwrap();
    assert_eq!(stub.kind, StubKind::NewArray);

    let graph = hir::build(&method, &blocks).unwrap();
    let body = graph.block(graph.block(graph.entry()).successors[0]);
    let has_alloc = body.nodes.iter().any(|&n| {
        matches!(graph.node(n).kind, NodeKind::NewTypeArray { .. })
    });
    assert!(has_alloc);
}

#[test]
fn volatile_read_orders_with_membars() {
    let field = ember_jit::hir::types::FieldRef {
        holder: ClassRef {
            id: ClassId(1),
            name: "Holder".into(),
        },
        name: "flag".into(),
        offset: 12,
        kind: ValueKind::Int,
        is_static: false,
        is_volatile: true,
    };
    let method = MethodDescriptor {
        name: "readFlag".into(),
        max_stack: 2,
        max_locals: 1,
        params: vec![ValueKind::Object],
        return_kind: ValueKind::Int,
    };
    let blocks = vec![block(
        0,
        3,
        vec![
            (0, DecodedInstr::Load(ValueKind::Object, 0)),
            (1, DecodedInstr::GetField(field)),
            (2, DecodedInstr::Return(ValueKind::Int)),
        ],
    )];

    let lir = compile(&method, &blocks, &FixedRuntime).unwrap();
    let membar_count: usize = (0..8)
        .map(|i| {
            lir.instructions(ember_jit::hir::BlockId::new(i))
                .iter()
                .filter(|x| matches!(x, LirInstr::Membar { .. }))
                .count()
        })
        .sum();
    assert_eq!(membar_count, 2);
}

#[test]
fn constant_folding_reaches_the_selected_code() {
    // return 2 + 3; folds in HIR, so LIR sees a single constant.
    let method = int_method("five", 2, 0, 0);
    let blocks = vec![block(
        0,
        4,
        vec![
            (0, DecodedInstr::ConstInt(2)),
            (1, DecodedInstr::ConstInt(3)),
            (2, DecodedInstr::Arith(IADD)),
            (3, DecodedInstr::Return(ValueKind::Int)),
        ],
    )];

    let lir = compile(&method, &blocks, &FixedRuntime).unwrap();
    let any_op2 = (0..8).any(|i| {
        lir.instructions(ember_jit::hir::BlockId::new(i))
            .iter()
            .any(|x| matches!(x, LirInstr::Op2 { .. }))
    });
    assert!(!any_op2);
}
