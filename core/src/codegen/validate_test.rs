use pretty_assertions::assert_eq;

use crate::ast::NodeId;
use crate::cil::{Instruction, LabelAllocator, OpCode, Operand, OperandKind};
use crate::codegen::Mismatch;
use crate::codegen::validate::{StackChecker, validate_operand};
use crate::testing::{branch, ldc, op};

#[test]
fn test_operand_mismatch_reports_both_kinds() {
    let bad = Instruction::new(OpCode::LdcI4, Operand::String("x".into()));
    assert_eq!(
        validate_operand(&bad, 1),
        Err(Mismatch::OperandKind {
            opcode: OpCode::LdcI4,
            expected: OperandKind::InlineI,
            found: "string `\"x\"`".into(),
        })
    );

    let missing = Instruction::simple(OpCode::Stloc);
    assert_eq!(
        validate_operand(&missing, 1),
        Err(Mismatch::OperandKind {
            opcode: OpCode::Stloc,
            expected: OperandKind::InlineVar,
            found: "none".into(),
        })
    );
}

#[test]
fn test_branch_target_must_be_in_graph() {
    assert_eq!(validate_operand(&branch(OpCode::Br, NodeId::new(1)), 2), Ok(()));
    assert_eq!(
        validate_operand(&branch(OpCode::Br, NodeId::new(2)), 2),
        Err(Mismatch::UnknownBranchTarget {
            opcode: OpCode::Br,
            target: 2,
        })
    );

    let switch = Instruction::new(
        OpCode::Switch,
        Operand::BlockSwitch(vec![NodeId::new(0), NodeId::new(5)]),
    );
    assert_eq!(
        validate_operand(&switch, 3),
        Err(Mismatch::UnknownBranchTarget {
            opcode: OpCode::Switch,
            target: 5,
        })
    );
}

#[test]
fn test_stack_checker_tracks_depth() {
    let mut checker = StackChecker::new(2, false);
    checker.check_all(&[op(OpCode::Add), ldc(3), op(OpCode::Mul)]).unwrap();
    assert_eq!(checker.depth(), 1);
    assert_eq!(checker.max_depth(), 2);
    assert_eq!(checker.finish(1), Ok(()));
    assert_eq!(
        checker.finish(0),
        Err(Mismatch::StackImbalance {
            expected: 0,
            actual: 1,
        })
    );
}

#[test]
fn test_stack_checker_underflow() {
    let mut checker = StackChecker::new(1, false);
    assert_eq!(
        checker.check_all(&[op(OpCode::Add)]),
        Err(Mismatch::StackUnderflow {
            opcode: OpCode::Add,
            position: 0,
            depth: 1,
            pops: 2,
        })
    );
}

#[test]
fn test_measure_peak_depth() {
    let instrs = [ldc(1), ldc(2), ldc(3), op(OpCode::Add), op(OpCode::Add), op(OpCode::Pop)];
    assert_eq!(StackChecker::measure(&instrs, false), 3);
    assert_eq!(StackChecker::measure(&[op(OpCode::Pop)], false), 0);
}

#[test]
fn test_measure_follows_branches() {
    let mut labels = LabelAllocator::new();
    let non_zero = labels.fresh();
    let end = labels.fresh();
    // Both arms peak at two values; walked straight through, the second arm
    // would start on top of the first arm's result.
    let instrs = [
        ldc(0),
        Instruction::new(OpCode::Brtrue, Operand::Label(non_zero)),
        ldc(1),
        ldc(2),
        op(OpCode::Add),
        Instruction::new(OpCode::Br, Operand::Label(end)),
        ldc(3).with_label(non_zero),
        ldc(4),
        op(OpCode::Add),
        op(OpCode::Nop).with_label(end),
        op(OpCode::Pop),
    ];
    assert_eq!(StackChecker::measure(&instrs, false), 2);
}

#[test]
fn test_measure_leave_empties_stack() {
    let mut labels = LabelAllocator::new();
    let target = labels.fresh();
    let instrs = [
        ldc(1),
        ldc(2),
        Instruction::new(OpCode::Leave, Operand::Label(target)),
        op(OpCode::Nop).with_label(target),
        ldc(3),
    ];
    assert_eq!(StackChecker::measure(&instrs, false), 2);
}
