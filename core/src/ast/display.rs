//! Human-readable rendering of AST nodes for diagnostics.
//!
//! The rendering is compact and single-line per statement:
//!
//! ```text
//! V_0 = add(V_1, ldc.i4 1)
//! unbox<object>(ldarg A_0)
//! {ldc.i4 0; ceq}(V_2) [flags ZERO]
//! ```

use core::fmt;

use super::{AstBlock, AstNode, Expr, ExprKind, InstructionExpr, Statement};

/// Renders AST nodes into text for error messages.
pub trait AstFormatter {
    fn format(&self, node: AstNode<'_>) -> String;
}

/// Formatter backed by the `Display` implementations of the AST.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl AstFormatter for DefaultFormatter {
    fn format(&self, node: AstNode<'_>) -> String {
        node.to_string()
    }
}

impl fmt::Display for AstNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNode::Block(block) => block.fmt(f),
            AstNode::Statement(statement) => statement.fmt(f),
            AstNode::Expr(expr) => expr.fmt(f),
        }
    }
}

impl fmt::Display for AstBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for statement in &self.statements {
            write!(f, " {};", statement)?;
        }
        f.write_str(" }")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expression(expr) => expr.fmt(f),
            Statement::Assignment { target, value } => write!(f, "{} = {}", target, value),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Variable(var) => write!(f, "{}", var),
            ExprKind::Unbox(unbox) => write!(f, "unbox<{}>({})", unbox.target, unbox.value),
            ExprKind::Instruction(instr) => fmt_instruction_expr(instr, f),
        }
    }
}

fn fmt_instruction_expr(expr: &InstructionExpr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match expr.template.as_slice() {
        [single] => write!(f, "{}", single)?,
        template => {
            f.write_str("{")?;
            for (i, instr) in template.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{}", instr)?;
            }
            f.write_str("}")?;
        }
    }

    if !expr.arguments.is_empty() {
        f.write_str("(")?;
        for (i, arg) in expr.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")?;
    }

    if let Some(update) = &expr.flags {
        let bang = if update.inverted { "!" } else { "" };
        write!(f, " [flags {}{}]", bang, update.flags)?;
    }
    Ok(())
}
