//! Instruction operands and the member references they carry.

use core::fmt;

use crate::ast::{NodeId, VarId};
use crate::cil::Label;

/// A reference to a type, as it would be imported into the target module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub namespace: String,
    pub name: String,
    pub is_value_type: bool,
}

impl TypeRef {
    /// A reference type.
    pub fn class(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            is_value_type: false,
        }
    }

    /// A value type.
    pub fn value_type(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            is_value_type: true,
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A type signature: the static type of a value, local, parameter or return.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    IntPtr,
    UIntPtr,
    /// The universal object type (`System.Object`).
    Object,
    Class(TypeRef),
    ValueType(TypeRef),
    SzArray(Box<TypeSig>),
}

impl TypeSig {
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Whether this is the universal object type.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object)
    }

    /// The type reference a `ldtoken` of this signature resolves to.
    ///
    /// Returns `None` for `void` and for array signatures, which have no
    /// standalone type reference.
    pub fn to_type_ref(&self) -> Option<TypeRef> {
        let corlib = |name: &str, value: bool| {
            if value {
                TypeRef::value_type("System", name)
            } else {
                TypeRef::class("System", name)
            }
        };
        let ty = match self {
            Self::Void | Self::SzArray(_) => return None,
            Self::Boolean => corlib("Boolean", true),
            Self::Char => corlib("Char", true),
            Self::I1 => corlib("SByte", true),
            Self::U1 => corlib("Byte", true),
            Self::I2 => corlib("Int16", true),
            Self::U2 => corlib("UInt16", true),
            Self::I4 => corlib("Int32", true),
            Self::U4 => corlib("UInt32", true),
            Self::I8 => corlib("Int64", true),
            Self::U8 => corlib("UInt64", true),
            Self::R4 => corlib("Single", true),
            Self::R8 => corlib("Double", true),
            Self::IntPtr => corlib("IntPtr", true),
            Self::UIntPtr => corlib("UIntPtr", true),
            Self::String => corlib("String", false),
            Self::Object => corlib("Object", false),
            Self::Class(ty) | Self::ValueType(ty) => ty.clone(),
        };
        Some(ty)
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Boolean => f.write_str("bool"),
            Self::Char => f.write_str("char"),
            Self::I1 => f.write_str("int8"),
            Self::U1 => f.write_str("uint8"),
            Self::I2 => f.write_str("int16"),
            Self::U2 => f.write_str("uint16"),
            Self::I4 => f.write_str("int32"),
            Self::U4 => f.write_str("uint32"),
            Self::I8 => f.write_str("int64"),
            Self::U8 => f.write_str("uint64"),
            Self::R4 => f.write_str("float32"),
            Self::R8 => f.write_str("float64"),
            Self::String => f.write_str("string"),
            Self::IntPtr => f.write_str("native int"),
            Self::UIntPtr => f.write_str("native uint"),
            Self::Object => f.write_str("object"),
            Self::Class(ty) => write!(f, "class {}", ty),
            Self::ValueType(ty) => write!(f, "valuetype {}", ty),
            Self::SzArray(elem) => write!(f, "{}[]", elem),
        }
    }
}

/// Calling convention and parameter shape of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub has_this: bool,
    pub params: Vec<TypeSig>,
    pub return_type: TypeSig,
}

impl MethodSig {
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }
}

/// A reference to a method, usable as a `call`/`callvirt`/`newobj` operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub signature: MethodSig,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signature.has_this {
            f.write_str("instance ")?;
        }
        write!(
            f,
            "{} {}::{}(",
            self.signature.return_type, self.declaring_type, self.name
        )?;
        for (i, param) in self.signature.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

/// A reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub field_type: TypeSig,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.field_type, self.declaring_type, self.name)
    }
}

/// A metadata token loaded by `ldtoken`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberToken {
    Type(TypeRef),
    Method(MethodRef),
    Field(FieldRef),
}

impl fmt::Display for MemberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(ty) => write!(f, "{}", ty),
            Self::Method(method) => write!(f, "method {}", method),
            Self::Field(field) => write!(f, "field {}", field),
        }
    }
}

/// The operand carried by one instruction.
///
/// `Block` and `BlockSwitch` are the AST-side branch targets: they name a
/// graph node and are rewritten to that node's header [`Label`] during
/// lowering. Likewise `Variable` names a declared variable and becomes its
/// `Local` slot. Emitted method bodies only contain the lowered forms.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Int8(i8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Block(NodeId),
    BlockSwitch(Vec<NodeId>),
    Label(Label),
    Switch(Vec<Label>),
    Method(MethodRef),
    Field(FieldRef),
    Type(TypeRef),
    Token(MemberToken),
    Variable(VarId),
    Local(u16),
    Argument(u16),
}

impl Operand {
    /// Short name of the operand's shape, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int8(_) => "int8",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::String(_) => "string",
            Self::Block(_) => "block reference",
            Self::BlockSwitch(_) => "block jump table",
            Self::Label(_) => "label",
            Self::Switch(_) => "label jump table",
            Self::Method(_) => "method reference",
            Self::Field(_) => "field reference",
            Self::Type(_) => "type reference",
            Self::Token(_) => "metadata token",
            Self::Variable(_) => "local variable",
            Self::Local(_) => "local slot",
            Self::Argument(_) => "argument index",
        }
    }

    /// Encoded size of the operand in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Int8(_) => 1,
            Self::Variable(_) | Self::Local(_) | Self::Argument(_) => 2,
            Self::Int32(_)
            | Self::Float32(_)
            | Self::String(_)
            | Self::Block(_)
            | Self::Label(_)
            | Self::Method(_)
            | Self::Field(_)
            | Self::Type(_)
            | Self::Token(_) => 4,
            Self::Int64(_) | Self::Float64(_) => 8,
            Self::BlockSwitch(targets) => 4 + 4 * targets.len() as u32,
            Self::Switch(targets) => 4 + 4 * targets.len() as u32,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Int8(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{:?}", v),
            Self::Float64(v) => write!(f, "{:?}", v),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Block(node) => write!(f, "block_{}", node.index()),
            Self::BlockSwitch(nodes) => {
                f.write_str("(")?;
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "block_{}", node.index())?;
                }
                f.write_str(")")
            }
            Self::Label(label) => write!(f, "{}", label),
            Self::Switch(labels) => {
                f.write_str("(")?;
                for (i, label) in labels.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", label)?;
                }
                f.write_str(")")
            }
            Self::Method(method) => write!(f, "{}", method),
            Self::Field(field) => write!(f, "{}", field),
            Self::Type(ty) => write!(f, "{}", ty),
            Self::Token(token) => write!(f, "{}", token),
            Self::Variable(var) => write!(f, "{}", var),
            Self::Local(slot) => write!(f, "V_{}", slot),
            Self::Argument(index) => write!(f, "A_{}", index),
        }
    }
}
