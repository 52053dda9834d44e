#![allow(dead_code)]

use unvirt::ast::{AstBlock, EdgeKind, Expr, NodeId, Statement, VarId, Variable};
use unvirt::cil::{Instruction, OpCode, Operand, TypeSig};
use unvirt::{
    CilCodeGenerator, CodegenError, CompilationUnit, DefaultFormatter, DescriptorImporter,
    FlagExpressionBuilder, FlagLayout, MethodBody,
};

/// Flag builder that wraps the expression in a recognizable frame:
/// `<args> <template> ldc.i4 <mask> pop`.
#[derive(Debug, Default)]
pub struct MarkerFlagBuilder {
    pub unary_calls: usize,
    pub binary_calls: usize,
}

impl MarkerFlagBuilder {
    pub fn marker(flag_mask: u8) -> Vec<Instruction> {
        vec![
            Instruction::new(OpCode::LdcI4, Operand::Int32(i32::from(flag_mask))),
            Instruction::simple(OpCode::Pop),
        ]
    }
}

impl FlagExpressionBuilder for MarkerFlagBuilder {
    fn build_unary(
        &mut self,
        argument: Vec<Instruction>,
        template: &[Instruction],
        flag_mask: u8,
        _has_result: bool,
    ) -> Vec<Instruction> {
        self.unary_calls += 1;
        let mut out = argument;
        out.extend_from_slice(template);
        out.extend(Self::marker(flag_mask));
        out
    }

    fn build_binary(
        &mut self,
        left: Vec<Instruction>,
        right: Vec<Instruction>,
        template: &[Instruction],
        flag_mask: u8,
        _inverted: bool,
        _has_result: bool,
    ) -> Vec<Instruction> {
        self.binary_calls += 1;
        let mut out = left;
        out.extend(right);
        out.extend_from_slice(template);
        out.extend(Self::marker(flag_mask));
        out
    }
}

/// Compile `unit` with default services.
pub fn compile(unit: &CompilationUnit) -> Result<MethodBody, CodegenError> {
    let mut flags = MarkerFlagBuilder::default();
    compile_with(unit, &mut flags)
}

pub fn compile_with(
    unit: &CompilationUnit,
    flags: &mut MarkerFlagBuilder,
) -> Result<MethodBody, CodegenError> {
    let mut body = MethodBody::new();
    compile_into(unit, &mut body, flags)?;
    Ok(body)
}

/// Compile `unit` into a body that may already hold code.
pub fn compile_into(
    unit: &CompilationUnit,
    body: &mut MethodBody,
    flags: &mut MarkerFlagBuilder,
) -> Result<(), CodegenError> {
    let mut importer = DescriptorImporter;
    let layout = FlagLayout::default();
    CilCodeGenerator::new(&mut importer, &layout, flags, &DefaultFormatter).compile(unit, body)
}

/// Opcodes of `body`, in order.
pub fn opcodes(body: &MethodBody) -> Vec<OpCode> {
    body.instructions.iter().map(|instr| instr.opcode).collect()
}

pub fn ins(opcode: OpCode) -> Instruction {
    Instruction::simple(opcode)
}

pub fn to(opcode: OpCode, target: NodeId) -> Instruction {
    Instruction::new(opcode, Operand::Block(target))
}

pub fn int(value: i32) -> Expr {
    Expr::instruction(
        vec![Instruction::new(OpCode::LdcI4, Operand::Int32(value))],
        Vec::new(),
        TypeSig::I4,
    )
}

pub fn local(id: u32) -> Expr {
    Expr::variable(VarId(id), TypeSig::I4)
}

pub fn assign(target: u32, value: Expr) -> Statement {
    Statement::Assignment {
        target: VarId(target),
        value,
    }
}

/// A void statement applying `instr` to `arguments`.
pub fn stmt(instr: Instruction, arguments: Vec<Expr>) -> Statement {
    Statement::Expression(Expr::instruction(vec![instr], arguments, TypeSig::Void))
}

/// Builds a compilation unit node by node.
pub struct UnitBuilder {
    pub unit: CompilationUnit,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self {
            unit: CompilationUnit::new(),
        }
    }

    pub fn locals(mut self, count: u32) -> Self {
        for id in 0..count {
            self.unit.variables.push(Variable::new(id, TypeSig::I4));
        }
        self
    }

    pub fn block(&mut self, statements: Vec<Statement>) -> NodeId {
        self.unit.add_block(AstBlock::new(statements))
    }

    pub fn edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        self.unit.add_edge(from, to, kind);
    }
}

/// Index of the instruction carrying the header label of `node`'s block,
/// i.e. the instruction every branch to `node` targets.
pub fn header_index(body: &MethodBody, branch_operand: &Operand) -> Option<usize> {
    let Operand::Label(label) = branch_operand else {
        return None;
    };
    body.instructions
        .iter()
        .position(|instr| instr.label == Some(*label))
}
