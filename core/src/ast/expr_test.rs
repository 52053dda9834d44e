use pretty_assertions::assert_eq;

use crate::ast::{ExceptionFrame, Expr, ExprKind, FlagUpdate, NodeId, VarId, VmFrameKind};
use crate::cil::{Instruction, OpCode, TypeSig};
use crate::context::VmFlags;

#[test]
fn test_with_flags_marks_instruction_expr() {
    let expr = Expr::instruction(vec![Instruction::simple(OpCode::Neg)], Vec::new(), TypeSig::I4)
        .with_flags(VmFlags::SIGN, true);
    let ExprKind::Instruction(instr) = expr.kind else {
        panic!("not an instruction expression");
    };
    assert_eq!(
        instr.flags,
        Some(FlagUpdate {
            flags: VmFlags::SIGN,
            inverted: true,
        })
    );
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "flag update on a non-instruction expression")]
fn test_with_flags_rejects_variable_read() {
    let _ = Expr::variable(VarId(0), TypeSig::I4).with_flags(VmFlags::ZERO, false);
}

#[test]
fn test_frame_exits() {
    let n = NodeId::new;
    let frame = ExceptionFrame {
        kind: VmFrameKind::FINALLY,
        try_body: vec![n(1), n(2)],
        handler_body: vec![n(3)],
        catch_type: None,
    };
    assert!(!frame.exits(n(1), n(2)));
    assert!(frame.exits(n(2), n(4)));
    assert!(frame.exits(n(3), n(4)));
    assert!(!frame.exits(n(0), n(1)));
}
