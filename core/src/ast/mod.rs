//! The recovered program handed to the code generator.
//!
//! Upstream analysis produces one [`CompilationUnit`] per devirtualized
//! method: its declared variables, a control-flow graph whose nodes each own
//! one [`AstBlock`], and the exception frames recovered from the virtualized
//! code. The unit is read-only from here on.
//!
//! Graph nodes are identified by their dense petgraph [`NodeId`], so
//! per-node data produced during code generation lives in plain vectors
//! indexed by `NodeId::index()`.

mod display;

#[cfg(test)]
mod expr_test;

use core::fmt;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::cil::{Instruction, TypeRef, TypeSig};
use crate::context::VmFlags;

pub use display::{AstFormatter, DefaultFormatter};

/// Identity of a control-flow graph node.
pub type NodeId = NodeIndex;

/// The control-flow graph of one method: every node owns one AST block.
pub type ControlFlowGraph = DiGraph<AstBlock, EdgeKind>;

/// How control reaches a successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Execution continues into the successor without a branch instruction.
    /// When the layout cannot place the successor next, code generation
    /// ends the block with an explicit jump.
    FallThrough,
    /// An explicit branch (conditional or not) or a `leave`.
    Branch,
    /// Entry into a handler from inside its protected region.
    Exceptional,
}

/// Identity of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V_{}", self.0)
    }
}

/// A variable declared by the compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub signature: TypeSig,
}

impl Variable {
    pub fn new(id: u32, signature: TypeSig) -> Self {
        Self {
            id: VarId(id),
            name: format!("V_{}", id),
            signature,
        }
    }
}

/// A basic block: statements in execution order.
///
/// The block's header instruction is not stored here; it is created by the
/// compilation driver before any block is lowered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AstBlock {
    pub statements: Vec<Statement>,
}

impl AstBlock {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Evaluated for side effects. The expression's template discards any
    /// value it leaves.
    Expression(Expr),
    /// Evaluated and stored to a local.
    Assignment { target: VarId, value: Expr },
}

/// A typed expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Static type of the value left on the stack, `Void` if none.
    pub ty: TypeSig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Instruction(InstructionExpr),
    Unbox(UnboxExpr),
    Variable(VarId),
}

/// A fixed instruction template applied to already-evaluated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionExpr {
    pub template: Vec<Instruction>,
    pub arguments: Vec<Expr>,
    /// Set when the expression must also reproduce condition-flag updates.
    pub flags: Option<FlagUpdate>,
}

/// The condition flags a flag-affecting expression publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagUpdate {
    pub flags: VmFlags,
    /// The virtualized flag is the complement of the target flag.
    pub inverted: bool,
}

/// Conversion of a value into the virtualized representation of `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnboxExpr {
    pub value: Box<Expr>,
    pub target: TypeSig,
}

impl Expr {
    pub fn instruction(template: Vec<Instruction>, arguments: Vec<Expr>, ty: TypeSig) -> Self {
        Self {
            kind: ExprKind::Instruction(InstructionExpr {
                template,
                arguments,
                flags: None,
            }),
            ty,
        }
    }

    pub fn variable(id: VarId, ty: TypeSig) -> Self {
        Self {
            kind: ExprKind::Variable(id),
            ty,
        }
    }

    /// Convert `value` to the virtualized representation of `target`.
    /// The result has type `target`.
    pub fn unbox(value: Expr, target: TypeSig) -> Self {
        Self {
            kind: ExprKind::Unbox(UnboxExpr {
                value: Box::new(value),
                target: target.clone(),
            }),
            ty: target,
        }
    }

    /// Mark an instruction expression as flag-affecting.
    ///
    /// Only instruction expressions can publish flags. Debug builds panic on
    /// any other kind; release builds return it unchanged.
    pub fn with_flags(mut self, flags: VmFlags, inverted: bool) -> Self {
        debug_assert!(
            matches!(self.kind, ExprKind::Instruction(_)),
            "flag update on a non-instruction expression"
        );
        if let ExprKind::Instruction(instr) = &mut self.kind {
            instr.flags = Some(FlagUpdate { flags, inverted });
        }
        self
    }

    /// Number of stack slots the expression leaves behind.
    pub fn net_stack_effect(&self) -> i64 {
        if self.ty.is_void() { 0 } else { 1 }
    }
}

/// Virtualized exception-frame kind, as recorded by the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmFrameKind(pub u8);

impl VmFrameKind {
    pub const CATCH: Self = Self(0);
    pub const FILTER: Self = Self(1);
    pub const FAULT: Self = Self(2);
    pub const FINALLY: Self = Self(3);
}

/// A recovered exception-handling region.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionFrame {
    pub kind: VmFrameKind,
    pub try_body: Vec<NodeId>,
    pub handler_body: Vec<NodeId>,
    /// Caught exception type; only meaningful for catch frames.
    pub catch_type: Option<TypeRef>,
}

impl ExceptionFrame {
    /// Whether control passing from `from` to `to` leaves this frame's try
    /// body or handler body.
    pub fn exits(&self, from: NodeId, to: NodeId) -> bool {
        let leaves = |region: &[NodeId]| region.contains(&from) && !region.contains(&to);
        leaves(&self.try_body) || leaves(&self.handler_body)
    }
}

/// Everything needed to generate one method body.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub variables: Vec<Variable>,
    pub graph: ControlFlowGraph,
    pub entry: NodeId,
    pub frames: Vec<ExceptionFrame>,
    /// Whether the method returns a value (`ret` pops one slot).
    pub returns_value: bool,
}

impl CompilationUnit {
    /// A unit with an empty graph. The first node added becomes the entry.
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            graph: ControlFlowGraph::new(),
            entry: NodeId::new(0),
            frames: Vec::new(),
            returns_value: false,
        }
    }

    pub fn add_block(&mut self, block: AstBlock) -> NodeId {
        self.graph.add_node(block)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        self.graph.add_edge(from, to, kind);
    }
}

impl Default for CompilationUnit {
    fn default() -> Self {
        Self::new()
    }
}

/// A borrowed view of any AST node, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub enum AstNode<'a> {
    Block(&'a AstBlock),
    Statement(&'a Statement),
    Expr(&'a Expr),
}

impl<'a> From<&'a AstBlock> for AstNode<'a> {
    fn from(block: &'a AstBlock) -> Self {
        Self::Block(block)
    }
}

impl<'a> From<&'a Statement> for AstNode<'a> {
    fn from(statement: &'a Statement) -> Self {
        Self::Statement(statement)
    }
}

impl<'a> From<&'a Expr> for AstNode<'a> {
    fn from(expr: &'a Expr) -> Self {
        Self::Expr(expr)
    }
}
