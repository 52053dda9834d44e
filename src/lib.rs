//! Unvirt - CIL code generation for devirtualized methods
//!
//! # Overview
//!
//! A devirtualizer recovers, for every virtualized method, a control-flow
//! graph of typed AST blocks together with the method's variables and
//! exception frames. This crate turns that recovered program back into a
//! CIL method body:
//!
//! - locals registered in the method's variable table
//! - blocks laid out along the dominator tree, with branch targets resolved
//!   to block header labels
//! - expressions lowered to stack-balanced instruction sequences
//! - the exception-handler table rebuilt from the emitted blocks
//!
//! # Quick Start
//!
//! ```ignore
//! use unvirt::{CilCodeGenerator, DefaultFormatter, DescriptorImporter, FlagLayout, MethodBody};
//!
//! let mut importer = DescriptorImporter;
//! let layout = FlagLayout::default();
//! let mut flags = MyFlagBuilder::new();
//!
//! let mut generator = CilCodeGenerator::new(&mut importer, &layout, &mut flags, &DefaultFormatter);
//! let mut body = MethodBody::new();
//! match generator.compile(&unit, &mut body) {
//!     Ok(()) => println!("{}", body),
//!     Err(e) => unvirt::render_error(&e),
//! }
//! ```

pub mod error_renderer;

// Re-export public API from unvirt_core
pub use unvirt_core::ast::{self, AstFormatter, CompilationUnit, DefaultFormatter};
pub use unvirt_core::cil::{self, MethodBody};
pub use unvirt_core::codegen::{
    CilCodeGenerator, CodegenError, CodegenOptions, Mismatch, TryEndAnchor,
};
pub use unvirt_core::context::{
    self, ArchConstants, DescriptorImporter, FlagExpressionBuilder, FlagLayout, ReferenceImporter,
    VmFlags,
};

pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};
