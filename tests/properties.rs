//! Whole-method properties of generated bodies.

mod common;

use common::{
    MarkerFlagBuilder, UnitBuilder, assign, compile, compile_into, header_index, ins, int, local,
    stmt, to,
};
use pretty_assertions::assert_eq;
use unvirt::{CompilationUnit, MethodBody};
use unvirt::ast::{EdgeKind, ExceptionFrame, Expr, NodeId, VmFrameKind};
use unvirt::cil::{OpCode, TypeRef, TypeSig};

/// ```text
/// 0: V_0 = 0
/// 1: if V_0 < 10 goto 2 else 4     loop header
/// 2: try { V_1 = V_0 * 2; leave 3 } catch Exception { leave 3 }   (2 try, 5 handler)
/// 3: V_0 = V_0 + 1; goto 1
/// 4: return V_0
/// ```
fn loop_with_catch() -> CompilationUnit {
    let mut b = UnitBuilder::new().locals(2);
    b.unit.returns_value = true;

    let n = NodeId::new;
    let cmp = Expr::instruction(
        vec![ins(OpCode::Clt)],
        vec![local(0), int(10)],
        TypeSig::Boolean,
    );
    let mul = Expr::instruction(vec![ins(OpCode::Mul)], vec![local(0), int(2)], TypeSig::I4);
    let inc = Expr::instruction(vec![ins(OpCode::Add)], vec![local(0), int(1)], TypeSig::I4);

    let null = Expr::instruction(vec![ins(OpCode::Ldnull)], Vec::new(), TypeSig::Object);

    let init = b.block(vec![assign(0, int(0))]);
    let head = b.block(vec![stmt(to(OpCode::Brfalse, n(4)), vec![cmp])]);
    let body = b.block(vec![assign(1, mul), stmt(to(OpCode::Leave, n(3)), vec![])]);
    let step = b.block(vec![assign(0, inc), stmt(to(OpCode::Br, n(1)), vec![])]);
    let exit = b.block(vec![stmt(ins(OpCode::Ret), vec![local(0)])]);
    let handler = b.block(vec![
        stmt(ins(OpCode::Pop), vec![null]),
        stmt(to(OpCode::Leave, n(3)), vec![]),
    ]);

    b.edge(init, head, EdgeKind::FallThrough);
    b.edge(head, body, EdgeKind::FallThrough);
    b.edge(head, exit, EdgeKind::Branch);
    b.edge(body, handler, EdgeKind::Exceptional);
    b.edge(body, step, EdgeKind::Branch);
    b.edge(handler, step, EdgeKind::Branch);
    b.edge(step, head, EdgeKind::Branch);

    b.unit.frames.push(ExceptionFrame {
        kind: VmFrameKind::CATCH,
        try_body: vec![body],
        handler_body: vec![handler],
        catch_type: Some(TypeRef::class("System", "Exception")),
    });
    b.unit
}

#[test]
fn test_every_block_emitted_once_entry_first() {
    let unit = loop_with_catch();
    let body = compile(&unit).unwrap();

    let headers: Vec<_> = body
        .instructions
        .iter()
        .filter(|instr| instr.opcode == OpCode::Nop && instr.label.is_some())
        .collect();
    assert_eq!(headers.len(), unit.graph.node_count());
    assert_eq!(body.instructions[0].opcode, OpCode::Nop);
    assert_eq!(body.instructions[1].opcode, OpCode::LdcI4);
}

#[test]
fn test_headers_unique_and_branches_resolve() {
    let body = compile(&loop_with_catch()).unwrap();

    let mut labels: Vec<_> = body.instructions.iter().filter_map(|instr| instr.label).collect();
    let total = labels.len();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), total);

    for instr in body.instructions.iter().filter(|instr| instr.opcode.is_branch()) {
        let target = header_index(&body, &instr.operand)
            .unwrap_or_else(|| panic!("unresolved branch `{}`", instr));
        assert_eq!(body.instructions[target].opcode, OpCode::Nop);
    }
}

#[test]
fn test_offsets_are_contiguous() {
    let body = compile(&loop_with_catch()).unwrap();
    let mut expected = 0;
    for instr in &body.instructions {
        assert_eq!(instr.offset, expected);
        expected += instr.size();
    }
    assert_eq!(body.code_size(), expected);
}

#[test]
fn test_exception_region_ordering() {
    let body = compile(&loop_with_catch()).unwrap();
    assert_eq!(body.exception_handlers.len(), 1);
    for handler in &body.exception_handlers {
        assert!(handler.try_start.offset < handler.try_end.offset);
        assert!(handler.try_end.offset <= handler.handler_start.offset);
        assert!(handler.handler_start.offset < handler.handler_end.offset);
        assert_eq!(
            body.label_offset(handler.handler_end.label),
            Some(handler.handler_end.offset)
        );
    }
}

#[test]
fn test_variables_round_trip() {
    let unit = loop_with_catch();
    let body = compile(&unit).unwrap();
    let registered: Vec<_> = body.variables.iter().map(|variable| variable.id).collect();
    let declared: Vec<_> = unit.variables.iter().map(|variable| variable.id).collect();
    assert_eq!(registered, declared);
}

#[test]
fn test_duplicate_variable_rejected() {
    let mut unit = loop_with_catch();
    let again = unit.variables[0].clone();
    unit.variables.push(again);
    let err = compile(&unit).unwrap_err();
    assert_eq!(
        err.cause,
        Some(unvirt::Mismatch::DuplicateVariable(unit.variables[0].id))
    );
}

#[test]
fn test_max_stack_covers_deepest_statement() {
    let body = compile(&loop_with_catch()).unwrap();
    assert_eq!(body.max_stack, 2);
}

#[test]
fn test_listing() {
    let body = compile(&loop_with_catch()).unwrap();
    let listing = body.to_string();
    assert!(listing.starts_with(".maxstack 2\n.locals init (\n    [0] int32 V_0\n    [1] int32 V_1\n)\n"));
    assert!(listing.contains(": brfalse IL_"));
    assert!(listing.contains("catch System.Exception handler"));
}

#[test]
fn test_second_unit_in_same_body_keeps_its_own_labels() {
    // 0: br 1 | 1: ret
    let mut b = UnitBuilder::new();
    let entry = b.block(vec![stmt(to(OpCode::Br, NodeId::new(1)), vec![])]);
    let exit = b.block(vec![stmt(ins(OpCode::Ret), vec![])]);
    b.edge(entry, exit, EdgeKind::Branch);

    let mut body = MethodBody::new();
    let mut flags = MarkerFlagBuilder::default();
    compile_into(&b.unit, &mut body, &mut flags).unwrap();
    compile_into(&b.unit, &mut body, &mut flags).unwrap();

    // nop br | nop ret | nop br | nop ret
    assert_eq!(body.instructions.len(), 8);
    assert_eq!(header_index(&body, &body.instructions[1].operand), Some(2));
    assert_eq!(header_index(&body, &body.instructions[5].operand), Some(6));

    let mut labels: Vec<_> = body.instructions.iter().filter_map(|instr| instr.label).collect();
    let total = labels.len();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), total);
}
