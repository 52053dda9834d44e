//! Fakes and small builders shared by the unit tests.

use crate::ast::{DefaultFormatter, Expr, NodeId, Statement, VarId};
use crate::cil::{Instruction, OpCode, Operand, TypeSig};
use crate::codegen::CilCodeGenerator;
use crate::context::{DescriptorImporter, FlagExpressionBuilder, FlagLayout};

/// One call received by [`RecordingFlagBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum FlagCall {
    Unary {
        argument: Vec<Instruction>,
        template: Vec<Instruction>,
        flag_mask: u8,
        has_result: bool,
    },
    Binary {
        left: Vec<Instruction>,
        right: Vec<Instruction>,
        template: Vec<Instruction>,
        flag_mask: u8,
        inverted: bool,
        has_result: bool,
    },
}

/// Records every request and answers with the arguments, the template and
/// a `ldc.i4 <mask>; pop` marker.
#[derive(Debug, Default)]
pub struct RecordingFlagBuilder {
    pub calls: Vec<FlagCall>,
}

pub fn flag_marker(flag_mask: u8) -> [Instruction; 2] {
    [
        Instruction::new(OpCode::LdcI4, Operand::Int32(i32::from(flag_mask))),
        Instruction::simple(OpCode::Pop),
    ]
}

impl FlagExpressionBuilder for RecordingFlagBuilder {
    fn build_unary(
        &mut self,
        argument: Vec<Instruction>,
        template: &[Instruction],
        flag_mask: u8,
        has_result: bool,
    ) -> Vec<Instruction> {
        self.calls.push(FlagCall::Unary {
            argument: argument.clone(),
            template: template.to_vec(),
            flag_mask,
            has_result,
        });
        let mut out = argument;
        out.extend_from_slice(template);
        out.extend(flag_marker(flag_mask));
        out
    }

    fn build_binary(
        &mut self,
        left: Vec<Instruction>,
        right: Vec<Instruction>,
        template: &[Instruction],
        flag_mask: u8,
        inverted: bool,
        has_result: bool,
    ) -> Vec<Instruction> {
        self.calls.push(FlagCall::Binary {
            left: left.clone(),
            right: right.clone(),
            template: template.to_vec(),
            flag_mask,
            inverted,
            has_result,
        });
        let mut out = left;
        out.extend(right);
        out.extend_from_slice(template);
        out.extend(flag_marker(flag_mask));
        out
    }
}

/// Every service the generator needs, with test defaults.
#[derive(Debug, Default)]
pub struct Services {
    pub importer: DescriptorImporter,
    pub layout: FlagLayout,
    pub flags: RecordingFlagBuilder,
    pub formatter: DefaultFormatter,
}

impl Services {
    pub fn generator(&mut self) -> CilCodeGenerator<'_> {
        CilCodeGenerator::new(
            &mut self.importer,
            &self.layout,
            &mut self.flags,
            &self.formatter,
        )
    }
}

pub fn op(opcode: OpCode) -> Instruction {
    Instruction::simple(opcode)
}

pub fn ldc(value: i32) -> Instruction {
    Instruction::new(OpCode::LdcI4, Operand::Int32(value))
}

pub fn branch(opcode: OpCode, target: NodeId) -> Instruction {
    Instruction::new(opcode, Operand::Block(target))
}

/// `ldc.i4 value` typed `int32`.
pub fn int(value: i32) -> Expr {
    Expr::instruction(vec![ldc(value)], Vec::new(), TypeSig::I4)
}

pub fn var(id: u32) -> Expr {
    Expr::variable(VarId(id), TypeSig::I4)
}

/// A template applied to arguments.
pub fn apply(template: Vec<Instruction>, arguments: Vec<Expr>, ty: TypeSig) -> Expr {
    Expr::instruction(template, arguments, ty)
}

pub fn expr_stmt(expr: Expr) -> Statement {
    Statement::Expression(expr)
}

pub fn assign(target: u32, value: Expr) -> Statement {
    Statement::Assignment {
        target: VarId(target),
        value,
    }
}

/// A statement consisting of a single control-transfer template.
pub fn jump(instr: Instruction, arguments: Vec<Expr>) -> Statement {
    Statement::Expression(Expr::instruction(vec![instr], arguments, TypeSig::Void))
}
