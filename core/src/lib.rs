//! CIL code generation for devirtualized methods.
//!
//! The entry point is [`codegen::CilCodeGenerator`], which turns one
//! recovered [`ast::CompilationUnit`] into a [`cil::MethodBody`]: locals,
//! laid-out instructions with resolved branch labels, and the
//! exception-handler table.

pub mod ast;
pub mod cil;
pub mod codegen;
pub mod context;

#[cfg(test)]
pub(crate) mod testing;
