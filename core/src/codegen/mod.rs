//! Code generation: from a recovered compilation unit to a target method body.
//!
//! [`CilCodeGenerator`] drives the phases; the other modules each own one:
//! block layout (`schedule`), expression lowering (`lower`), template checks
//! (`validate`) and exception-handler reconstruction (`regions`).

mod driver;
mod error;
mod lower;
mod options;
mod regions;
mod schedule;
mod stage;
mod validate;

#[cfg(test)]
mod schedule_test;
#[cfg(test)]
mod validate_test;

pub use driver::CilCodeGenerator;
pub use error::{CodegenError, Mismatch};
pub use options::{CodegenOptions, TryEndAnchor};
pub use regions::handler_kind;
pub use stage::{EmittedBlock, LoweredBody, Skeleton};
pub use validate::{StackChecker, validate_operand};
