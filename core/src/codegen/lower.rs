//! Lowering of AST blocks, statements and expressions to instructions.
//!
//! Lowering is a recursive walk over the AST sum types. Arguments are always
//! lowered left to right before the template that consumes them, so the
//! result of every expression is exactly the sequence that leaves its value
//! on the evaluation stack.

use tracing::trace;

use crate::ast::{
    AstBlock, AstFormatter, AstNode, Expr, ExprKind, FlagUpdate, InstructionExpr, NodeId,
    Statement, UnboxExpr, VarId,
};
use crate::cil::{Instruction, LabelAllocator, MemberToken, MethodRef, OpCode, Operand, VariableTable};
use crate::codegen::error::{
    INVALID_FLAG_EXPRESSION, INVALID_OPERAND, INVALID_STACK, INVALID_VARIABLE,
};
use crate::codegen::stage::Skeleton;
use crate::codegen::validate::{StackChecker, validate_operand};
use crate::codegen::{CodegenError, CodegenOptions, Mismatch};
use crate::context::{ArchConstants, FlagExpressionBuilder, KnownMember, ReferenceImporter};

/// Lowers the blocks of one compilation unit.
pub(crate) struct Lowering<'a> {
    skeleton: &'a Skeleton,
    variables: &'a VariableTable,
    labels: &'a mut LabelAllocator,
    importer: &'a mut dyn ReferenceImporter,
    constants: &'a dyn ArchConstants,
    flag_builder: &'a mut dyn FlagExpressionBuilder,
    formatter: &'a dyn AstFormatter,
    options: &'a CodegenOptions,
    returns_value: bool,
    max_stack: u32,
}

impl<'a> Lowering<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        skeleton: &'a Skeleton,
        variables: &'a VariableTable,
        labels: &'a mut LabelAllocator,
        importer: &'a mut dyn ReferenceImporter,
        constants: &'a dyn ArchConstants,
        flag_builder: &'a mut dyn FlagExpressionBuilder,
        formatter: &'a dyn AstFormatter,
        options: &'a CodegenOptions,
        returns_value: bool,
    ) -> Self {
        Self {
            skeleton,
            variables,
            labels,
            importer,
            constants,
            flag_builder,
            formatter,
            options,
            returns_value,
            max_stack: 0,
        }
    }

    /// Peak evaluation stack depth over every statement lowered so far.
    pub fn max_stack(&self) -> u32 {
        self.max_stack
    }

    /// The block's header instruction followed by its statements.
    pub fn lower_block(
        &mut self,
        node: NodeId,
        block: &AstBlock,
    ) -> Result<Vec<Instruction>, CodegenError> {
        let header = Instruction::simple(OpCode::Nop).with_label(self.skeleton.header(node));
        let mut out = vec![header];
        for statement in &block.statements {
            let instrs = self.lower_statement(statement)?;
            self.max_stack = self
                .max_stack
                .max(StackChecker::measure(&instrs, self.returns_value));
            out.extend(instrs);
        }
        trace!(
            node = node.index(),
            instructions = out.len(),
            "Lowered block"
        );
        Ok(out)
    }

    /// Explicit jump into `target` for a block that falls through into it
    /// but is not laid out right before it. Leaving a protected or handler
    /// region requires `leave`.
    pub fn fall_through_jump(&self, target: NodeId, leaves_region: bool) -> Instruction {
        let opcode = if leaves_region { OpCode::Leave } else { OpCode::Br };
        Instruction::new(opcode, Operand::Label(self.skeleton.header(target)))
    }

    pub fn lower_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<Instruction>, CodegenError> {
        match statement {
            Statement::Expression(expr) => self.lower_expr(expr),
            Statement::Assignment { target, value } => {
                let slot = self.slot(*target, statement.into())?;
                let mut out = self.lower_expr(value)?;
                out.push(Instruction::new(OpCode::Stloc, Operand::Local(slot)));
                Ok(out)
            }
        }
    }

    pub fn lower_expr(&mut self, expr: &Expr) -> Result<Vec<Instruction>, CodegenError> {
        match &expr.kind {
            ExprKind::Variable(var) => {
                let slot = self.slot(*var, expr.into())?;
                Ok(vec![Instruction::new(OpCode::Ldloc, Operand::Local(slot))])
            }
            ExprKind::Instruction(instr) => match instr.flags {
                Some(update) => self.lower_flag_expr(expr, instr, update),
                None => self.lower_instruction_expr(expr, instr),
            },
            ExprKind::Unbox(unbox) => self.lower_unbox(expr, unbox),
        }
    }

    fn lower_instruction_expr(
        &mut self,
        expr: &Expr,
        instr: &InstructionExpr,
    ) -> Result<Vec<Instruction>, CodegenError> {
        let mut out = Vec::new();
        for argument in &instr.arguments {
            out.extend(self.lower_expr(argument)?);
        }

        let template = self.resolve_template(expr, &instr.template)?;

        let pushed: i64 = instr.arguments.iter().map(Expr::net_stack_effect).sum();
        let mut checker = StackChecker::new(pushed, self.returns_value);
        checker
            .check_all(&template)
            .map_err(|cause| self.error(INVALID_STACK, expr.into(), cause))?;
        if self.options.check_net_stack_effect {
            checker
                .finish(expr.net_stack_effect())
                .map_err(|cause| self.error(INVALID_STACK, expr.into(), cause))?;
        }

        out.extend(template);
        Ok(out)
    }

    fn lower_flag_expr(
        &mut self,
        expr: &Expr,
        instr: &InstructionExpr,
        update: FlagUpdate,
    ) -> Result<Vec<Instruction>, CodegenError> {
        let template = self.resolve_template(expr, &instr.template)?;
        let flag_mask = self.constants.flag_mask(update.flags);
        let has_result = !expr.ty.is_void();

        match instr.arguments.as_slice() {
            [argument] => {
                let argument = self.lower_expr(argument)?;
                Ok(self
                    .flag_builder
                    .build_unary(argument, &template, flag_mask, has_result))
            }
            [left, right] => {
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                Ok(self.flag_builder.build_binary(
                    left,
                    right,
                    &template,
                    flag_mask,
                    update.inverted,
                    has_result,
                ))
            }
            arguments => Err(self.error(
                INVALID_FLAG_EXPRESSION,
                expr.into(),
                Mismatch::FlagArity(arguments.len()),
            )),
        }
    }

    /// Convert a value into the virtualized representation of its target type.
    ///
    /// Objects carry their own runtime type, which is only available for
    /// non-null references:
    ///
    /// ```text
    ///           <value>
    ///           dup
    ///           brtrue NONNULL
    ///           pop
    ///           ldnull
    ///           br END
    /// NONNULL:  dup
    ///           callvirt Object::GetType()
    ///           call ConvertToVmValue(object, Type)
    /// END:      nop
    /// ```
    ///
    /// Any other target type is loaded from its metadata token.
    fn lower_unbox(
        &mut self,
        expr: &Expr,
        unbox: &UnboxExpr,
    ) -> Result<Vec<Instruction>, CodegenError> {
        let mut out = self.lower_expr(&unbox.value)?;
        let convert = self.import(KnownMember::ConvertToVmValue);

        if unbox.target.is_object() {
            let non_null = self.labels.fresh();
            let end = self.labels.fresh();
            let get_type = self.import(KnownMember::ObjectGetType);
            out.extend([
                Instruction::simple(OpCode::Dup),
                Instruction::new(OpCode::Brtrue, Operand::Label(non_null)),
                Instruction::simple(OpCode::Pop),
                Instruction::simple(OpCode::Ldnull),
                Instruction::new(OpCode::Br, Operand::Label(end)),
                Instruction::simple(OpCode::Dup).with_label(non_null),
                Instruction::new(OpCode::Callvirt, Operand::Method(get_type)),
                Instruction::new(OpCode::Call, Operand::Method(convert)),
                Instruction::simple(OpCode::Nop).with_label(end),
            ]);
            return Ok(out);
        }

        let Some(target) = unbox.target.to_type_ref() else {
            return Err(self.error(
                INVALID_OPERAND,
                expr.into(),
                Mismatch::OperandKind {
                    opcode: OpCode::Ldtoken,
                    expected: OpCode::Ldtoken.operand_kind(),
                    found: format!("type signature `{}`", unbox.target),
                },
            ));
        };
        let from_handle = self.import(KnownMember::TypeGetTypeFromHandle);
        out.extend([
            Instruction::new(OpCode::Ldtoken, Operand::Token(MemberToken::Type(target))),
            Instruction::new(OpCode::Call, Operand::Method(from_handle)),
            Instruction::new(OpCode::Call, Operand::Method(convert)),
        ]);
        Ok(out)
    }

    /// Validate every template instruction, rewrite block references to the
    /// referenced block's header label and variables to their local slot.
    fn resolve_template(
        &self,
        expr: &Expr,
        template: &[Instruction],
    ) -> Result<Vec<Instruction>, CodegenError> {
        template
            .iter()
            .map(|instr| {
                validate_operand(instr, self.skeleton.node_count())
                    .map_err(|cause| self.error(INVALID_OPERAND, expr.into(), cause))?;
                let mut resolved = instr.clone();
                match &instr.operand {
                    Operand::Block(node) => {
                        resolved.operand = Operand::Label(self.skeleton.header(*node));
                    }
                    Operand::BlockSwitch(nodes) => {
                        let labels = nodes.iter().map(|node| self.skeleton.header(*node));
                        resolved.operand = Operand::Switch(labels.collect());
                    }
                    Operand::Variable(var) => {
                        resolved.operand = Operand::Local(self.slot(*var, expr.into())?);
                    }
                    _ => {}
                }
                Ok(resolved)
            })
            .collect()
    }

    fn slot(&self, var: VarId, node: AstNode<'_>) -> Result<u16, CodegenError> {
        self.variables
            .slot(var)
            .ok_or_else(|| self.error(INVALID_VARIABLE, node, Mismatch::UndeclaredVariable(var)))
    }

    fn import(&mut self, member: KnownMember) -> MethodRef {
        self.importer.import_method(&member.descriptor())
    }

    fn error(&self, message: &'static str, node: AstNode<'_>, cause: Mismatch) -> CodegenError {
        CodegenError::new(message, self.formatter.format(node), cause)
    }
}
