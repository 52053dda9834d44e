//! Target bytecode model.
//!
//! Everything the code generator emits lives here: opcodes with their static
//! operand and stack contracts, operands and member references, labelled
//! instructions, and the method body the caller hands in to be filled.

mod body;
mod instruction;
mod opcode;
mod operand;


pub use body::{
    Anchor, ExceptionHandler, HandlerKind, MethodBody, RegisterError, VariableTable,
};
pub use instruction::{Instruction, Label, LabelAllocator};
pub use opcode::{OpCode, OperandKind, StackBehaviour};
pub use operand::{FieldRef, MemberToken, MethodRef, MethodSig, Operand, TypeRef, TypeSig};
