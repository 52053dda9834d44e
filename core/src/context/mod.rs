//! Capabilities the code generator consumes from its surroundings.
//!
//! Each service is a narrow trait passed explicitly to the component that
//! needs it, so a component's dependencies are visible in its signature:
//!
//! - [`ReferenceImporter`] turns source-environment member descriptors into
//!   references usable as instruction operands.
//! - [`ArchConstants`] exposes the per-architecture constant table.
//! - [`FlagExpressionBuilder`] expands flag-affecting expressions.

mod flags;


use crate::cil::{Instruction, MethodRef, MethodSig, TypeRef, TypeSig};

pub use flags::{FlagLayout, VmFlags};

/// Runtime members the code generator itself references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownMember {
    /// `System.Object::GetType()`
    ObjectGetType,
    /// `System.Type::GetTypeFromHandle(RuntimeTypeHandle)`
    TypeGetTypeFromHandle,
    /// The virtual machine runtime helper converting a value of a given
    /// runtime type into its virtualized representation.
    ConvertToVmValue,
}

impl KnownMember {
    /// Descriptor of the member in the source environment.
    pub fn descriptor(self) -> MethodRef {
        match self {
            Self::ObjectGetType => MethodRef {
                declaring_type: TypeRef::class("System", "Object"),
                name: "GetType".into(),
                signature: MethodSig {
                    has_this: true,
                    params: Vec::new(),
                    return_type: TypeSig::Class(system_type()),
                },
            },
            Self::TypeGetTypeFromHandle => MethodRef {
                declaring_type: system_type(),
                name: "GetTypeFromHandle".into(),
                signature: MethodSig {
                    has_this: false,
                    params: vec![TypeSig::ValueType(TypeRef::value_type(
                        "System",
                        "RuntimeTypeHandle",
                    ))],
                    return_type: TypeSig::Class(system_type()),
                },
            },
            Self::ConvertToVmValue => MethodRef {
                declaring_type: TypeRef::class("VM.Runtime", "VMHelper"),
                name: "ConvertToVmValue".into(),
                signature: MethodSig {
                    has_this: false,
                    params: vec![TypeSig::Object, TypeSig::Class(system_type())],
                    return_type: TypeSig::Object,
                },
            },
        }
    }
}

fn system_type() -> TypeRef {
    TypeRef::class("System", "Type")
}

/// Imports member references into the target module.
pub trait ReferenceImporter {
    fn import_method(&mut self, descriptor: &MethodRef) -> MethodRef;
}

/// Importer for targets where source descriptors are already valid operands.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorImporter;

impl ReferenceImporter for DescriptorImporter {
    fn import_method(&mut self, descriptor: &MethodRef) -> MethodRef {
        descriptor.clone()
    }
}

/// Per-architecture constant table.
pub trait ArchConstants {
    /// Target-format bit mask for a set of architecture flags.
    fn flag_mask(&self, flags: VmFlags) -> u8;
}

impl ArchConstants for FlagLayout {
    fn flag_mask(&self, flags: VmFlags) -> u8 {
        self.mask(flags)
    }
}

/// Expands expressions that must also publish condition-flag state.
///
/// The code generator hands over already-lowered arguments together with the
/// expression's own (label-resolved) template; the builder returns the
/// complete instruction sequence, arguments included.
pub trait FlagExpressionBuilder {
    /// One-argument form.
    fn build_unary(
        &mut self,
        argument: Vec<Instruction>,
        template: &[Instruction],
        flag_mask: u8,
        has_result: bool,
    ) -> Vec<Instruction>;

    /// Two-argument form. `inverted` requests the complement of the
    /// straightforward target flag.
    fn build_binary(
        &mut self,
        left: Vec<Instruction>,
        right: Vec<Instruction>,
        template: &[Instruction],
        flag_mask: u8,
        inverted: bool,
        has_result: bool,
    ) -> Vec<Instruction>;
}
