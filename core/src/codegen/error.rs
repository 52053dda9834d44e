//! Code generation errors.
//!
//! Every failure is a structural invalidity of the input: the AST or its
//! graph violates a contract the generator relies on. None of them are
//! recoverable; the unit being compiled is abandoned.

use thiserror::Error;

use crate::ast::VarId;
use crate::cil::{OpCode, OperandKind};

pub(crate) const INVALID_OPERAND: &str = "Instruction operand does not match the operand kind of its opcode. \
     This could indicate an error in the recovery of the instruction expression.";

pub(crate) const INVALID_STACK: &str = "Instruction template does not fit the values on the stack. \
     This could indicate an error in the argument count recovered by the data-flow analysis.";

pub(crate) const INVALID_FLAG_EXPRESSION: &str = "Flag-affecting expression has an unsupported shape. \
     This could indicate an error in the recovery of flag data sources.";

pub(crate) const INVALID_VARIABLE: &str = "Invalid variable declaration or reference. \
     This could indicate an error in the variable recovery of the data-flow analysis.";

pub(crate) const INVALID_GRAPH: &str = "Malformed control-flow graph. \
     This could indicate an error in the control-flow graph construction.";

pub(crate) const INVALID_FRAME: &str = "Unsupported or malformed exception handler. \
     This could indicate an error in the recovery of the exception handler sub-graphs.";

/// A structural invalidity found while generating code for one unit.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}\n  at: {node}")]
pub struct CodegenError {
    /// Fixed explanation pointing at the likely upstream cause.
    pub message: &'static str,
    /// Rendering of the offending AST node.
    pub node: String,
    /// The specific mismatch, when there is one.
    #[source]
    pub cause: Option<Mismatch>,
}

impl CodegenError {
    pub fn new(message: &'static str, node: String, cause: Mismatch) -> Self {
        Self {
            message,
            node,
            cause: Some(cause),
        }
    }
}

/// The specific contract a unit violates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Mismatch {
    #[error("`{opcode}` expects {expected}, found {found}")]
    OperandKind {
        opcode: OpCode,
        expected: OperandKind,
        found: String,
    },

    #[error("`{opcode}` targets block {target}, which is not part of the graph")]
    UnknownBranchTarget { opcode: OpCode, target: usize },

    #[error("stack underflow at `{opcode}` (template instruction {position}): depth {depth}, pops {pops}")]
    StackUnderflow {
        opcode: OpCode,
        position: usize,
        depth: i64,
        pops: u32,
    },

    #[error("expression leaves {actual} value(s) on the stack, but declares {expected}")]
    StackImbalance { expected: i64, actual: i64 },

    #[error("flag-affecting expression has {0} argument(s), only 1 or 2 are supported")]
    FlagArity(usize),

    #[error("variable {0} is not declared")]
    UndeclaredVariable(VarId),

    #[error("variable {0} is declared more than once")]
    DuplicateVariable(VarId),

    #[error("more than {} local variables", u16::MAX)]
    TooManyLocals,

    #[error("node {node} is not part of the graph")]
    UnknownNode { node: usize },

    #[error("node {node} is unreachable from the entry node")]
    UnreachableNode { node: usize },

    #[error("block {node} falls through into {count} different blocks")]
    FallThroughSuccessors { node: usize, count: usize },

    #[error("unrecognized virtualized frame kind {0}")]
    UnsupportedFrameKind(u8),

    #[error("{region} region of exception frame {frame} is empty")]
    EmptyRegion { frame: usize, region: &'static str },

    #[error("last handler block {node} has {count} successor(s), exactly one is required")]
    HandlerSuccessors { node: usize, count: usize },

    #[error("no instruction follows the try body ending at block {node}")]
    TryEndPastMethodEnd { node: usize },

    #[error(
        "exception frame {frame} is out of order: try {try_start:#06x} to {try_end:#06x}, \
         handler {handler_start:#06x} to {handler_end:#06x}"
    )]
    RegionOrder {
        frame: usize,
        try_start: u32,
        try_end: u32,
        handler_start: u32,
        handler_end: u32,
    },

    #[error("{region} block {node} of exception frame {frame} is laid out outside its region")]
    BlockOutsideRegion {
        frame: usize,
        region: &'static str,
        node: usize,
    },
}
