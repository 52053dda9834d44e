//! Target bytecode opcodes.
//!
//! The target is the CIL instruction set executed by the managed runtime.
//! Only the subset a devirtualized method body can contain is modelled.
//!
//! Every opcode knows three static facts about itself:
//!
//! - its encoded value (1 byte, or 2 bytes for `0xFE`-prefixed opcodes)
//! - the shape of the operand it carries ([`OperandKind`])
//! - its stack behaviour: how many values it pops and pushes
//!
//! Branches are always emitted in their long (4-byte target) form, so
//! offsets can be assigned in a single pass.
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`

use core::fmt;

use crate::cil::Operand;

/// A target bytecode opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ========================================================================
    // Special
    // ========================================================================
    /// No operation. Also used as the anchor instruction of a block header.
    Nop,

    // ========================================================================
    // Constants
    // ========================================================================
    /// Stack: [...] -> [..., null]
    Ldnull,
    /// Operand: i8 | Stack: [...] -> [..., int32]
    LdcI4S,
    /// Operand: i32 | Stack: [...] -> [..., int32]
    LdcI4,
    /// Operand: i64 | Stack: [...] -> [..., int64]
    LdcI8,
    /// Operand: f32 | Stack: [...] -> [..., F]
    LdcR4,
    /// Operand: f64 | Stack: [...] -> [..., F]
    LdcR8,
    /// Operand: string literal | Stack: [...] -> [..., string]
    Ldstr,

    // ========================================================================
    // Locals & Arguments
    // ========================================================================
    /// Operand: argument index | Stack: [...] -> [..., value]
    Ldarg,
    /// Operand: argument index | Stack: [..., value] -> [...]
    Starg,
    /// Operand: local variable | Stack: [...] -> [..., value]
    Ldloc,
    /// Operand: local variable | Stack: [...] -> [..., &local]
    Ldloca,
    /// Operand: local variable | Stack: [..., value] -> [...]
    Stloc,

    // ========================================================================
    // Stack Manipulation
    // ========================================================================
    /// Stack: [..., a] -> [..., a, a]
    Dup,
    /// Stack: [..., a] -> [...]
    Pop,

    // ========================================================================
    // Arithmetic & Bitwise
    // ========================================================================
    Add,
    AddOvf,
    AddOvfUn,
    Sub,
    SubOvf,
    SubOvfUn,
    Mul,
    MulOvf,
    MulOvfUn,
    Div,
    DivUn,
    Rem,
    RemUn,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
    /// Stack: [..., a] -> [..., -a]
    Neg,
    /// Stack: [..., a] -> [..., ~a]
    Not,

    // ========================================================================
    // Conversions
    // ========================================================================
    ConvI1,
    ConvI2,
    ConvI4,
    ConvI8,
    ConvU1,
    ConvU2,
    ConvU4,
    ConvU8,
    ConvI,
    ConvU,
    ConvR4,
    ConvR8,
    ConvRUn,

    // ========================================================================
    // Comparisons
    // ========================================================================
    /// Stack: [..., a, b] -> [..., a == b]
    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,

    // ========================================================================
    // Control Flow
    // ========================================================================
    /// Operand: branch target | Stack: [...] -> [...]
    Br,
    /// Operand: branch target | Stack: [..., cond] -> [...]
    Brfalse,
    /// Operand: branch target | Stack: [..., cond] -> [...]
    Brtrue,
    /// Operand: branch target | Stack: [..., a, b] -> [...]
    Beq,
    Bge,
    BgeUn,
    Bgt,
    BgtUn,
    Ble,
    BleUn,
    Blt,
    BltUn,
    BneUn,
    /// Operand: jump table | Stack: [..., index] -> [...]
    Switch,
    /// Stack: [..., retval?] -> []
    Ret,
    /// Operand: branch target | Stack: [...] -> []
    Leave,
    Endfinally,
    /// Stack: [..., accept] -> []
    Endfilter,
    /// Stack: [..., exception] -> []
    Throw,
    Rethrow,

    // ========================================================================
    // Calls
    // ========================================================================
    /// Operand: method | Stack: [..., this?, args...] -> [..., retval?]
    Call,
    /// Operand: method | Stack: [..., this, args...] -> [..., retval?]
    Callvirt,
    /// Operand: constructor | Stack: [..., args...] -> [..., obj]
    Newobj,

    // ========================================================================
    // Object Model
    // ========================================================================
    /// Operand: type | Stack: [..., value] -> [..., obj]
    Box,
    /// Operand: type | Stack: [..., obj] -> [..., value]
    UnboxAny,
    /// Operand: type | Stack: [..., obj] -> [..., obj]
    Castclass,
    /// Operand: type | Stack: [..., obj] -> [..., obj | null]
    Isinst,
    /// Operand: element type | Stack: [..., length] -> [..., array]
    Newarr,
    /// Stack: [..., array] -> [..., length]
    Ldlen,
    /// Operand: metadata token | Stack: [...] -> [..., handle]
    Ldtoken,

    // ========================================================================
    // Fields
    // ========================================================================
    /// Operand: field | Stack: [..., obj] -> [..., value]
    Ldfld,
    /// Operand: field | Stack: [..., obj, value] -> [...]
    Stfld,
    /// Operand: field | Stack: [...] -> [..., value]
    Ldsfld,
    /// Operand: field | Stack: [..., value] -> [...]
    Stsfld,
}

/// The shape of the operand an opcode carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    InlineNone,
    ShortInlineI,
    InlineI,
    InlineI8,
    ShortInlineR,
    InlineR,
    InlineString,
    InlineBrTarget,
    InlineSwitch,
    InlineMethod,
    InlineField,
    InlineType,
    InlineTok,
    InlineVar,
    InlineArg,
}

impl OperandKind {
    /// Check whether `operand` has the runtime shape this kind requires.
    ///
    /// Branch kinds accept both AST-side block references and lowered labels.
    pub fn accepts(self, operand: &Operand) -> bool {
        matches!(
            (self, operand),
            (Self::InlineNone, Operand::None)
                | (Self::ShortInlineI, Operand::Int8(_))
                | (Self::InlineI, Operand::Int32(_))
                | (Self::InlineI8, Operand::Int64(_))
                | (Self::ShortInlineR, Operand::Float32(_))
                | (Self::InlineR, Operand::Float64(_))
                | (Self::InlineString, Operand::String(_))
                | (Self::InlineBrTarget, Operand::Block(_) | Operand::Label(_))
                | (
                    Self::InlineSwitch,
                    Operand::BlockSwitch(_) | Operand::Switch(_)
                )
                | (Self::InlineMethod, Operand::Method(_))
                | (Self::InlineField, Operand::Field(_))
                | (Self::InlineType, Operand::Type(_))
                | (Self::InlineTok, Operand::Token(_))
                | (Self::InlineVar, Operand::Variable(_) | Operand::Local(_))
                | (Self::InlineArg, Operand::Argument(_))
        )
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InlineNone => "no operand",
            Self::ShortInlineI => "int8 immediate",
            Self::InlineI => "int32 immediate",
            Self::InlineI8 => "int64 immediate",
            Self::ShortInlineR => "float32 immediate",
            Self::InlineR => "float64 immediate",
            Self::InlineString => "string literal",
            Self::InlineBrTarget => "branch target",
            Self::InlineSwitch => "jump table",
            Self::InlineMethod => "method reference",
            Self::InlineField => "field reference",
            Self::InlineType => "type reference",
            Self::InlineTok => "metadata token",
            Self::InlineVar => "local variable",
            Self::InlineArg => "argument index",
        };
        f.write_str(name)
    }
}

/// Static pop and push counts of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehaviour {
    pub pops: u32,
    pub pushes: u32,
}

impl StackBehaviour {
    const fn new(pops: u32, pushes: u32) -> Self {
        Self { pops, pushes }
    }

    /// Net change in stack depth.
    pub fn net(self) -> i64 {
        self.pushes as i64 - self.pops as i64
    }
}

impl OpCode {
    /// Encoded opcode value. Two-byte opcodes carry the `0xFE` prefix in the high byte.
    pub const fn value(self) -> u16 {
        match self {
            Self::Nop => 0x00,
            Self::Ldnull => 0x14,
            Self::LdcI4S => 0x1F,
            Self::LdcI4 => 0x20,
            Self::LdcI8 => 0x21,
            Self::LdcR4 => 0x22,
            Self::LdcR8 => 0x23,
            Self::Ldstr => 0x72,
            Self::Ldarg => 0xFE09,
            Self::Starg => 0xFE0B,
            Self::Ldloc => 0xFE0C,
            Self::Ldloca => 0xFE0D,
            Self::Stloc => 0xFE0E,
            Self::Dup => 0x25,
            Self::Pop => 0x26,
            Self::Add => 0x58,
            Self::AddOvf => 0xD6,
            Self::AddOvfUn => 0xD7,
            Self::Sub => 0x59,
            Self::SubOvf => 0xDA,
            Self::SubOvfUn => 0xDB,
            Self::Mul => 0x5A,
            Self::MulOvf => 0xD8,
            Self::MulOvfUn => 0xD9,
            Self::Div => 0x5B,
            Self::DivUn => 0x5C,
            Self::Rem => 0x5D,
            Self::RemUn => 0x5E,
            Self::And => 0x5F,
            Self::Or => 0x60,
            Self::Xor => 0x61,
            Self::Shl => 0x62,
            Self::Shr => 0x63,
            Self::ShrUn => 0x64,
            Self::Neg => 0x65,
            Self::Not => 0x66,
            Self::ConvI1 => 0x67,
            Self::ConvI2 => 0x68,
            Self::ConvI4 => 0x69,
            Self::ConvI8 => 0x6A,
            Self::ConvR4 => 0x6B,
            Self::ConvR8 => 0x6C,
            Self::ConvU4 => 0x6D,
            Self::ConvU8 => 0x6E,
            Self::ConvRUn => 0x76,
            Self::ConvU2 => 0xD1,
            Self::ConvU1 => 0xD2,
            Self::ConvI => 0xD3,
            Self::ConvU => 0xE0,
            Self::Ceq => 0xFE01,
            Self::Cgt => 0xFE02,
            Self::CgtUn => 0xFE03,
            Self::Clt => 0xFE04,
            Self::CltUn => 0xFE05,
            Self::Br => 0x38,
            Self::Brfalse => 0x39,
            Self::Brtrue => 0x3A,
            Self::Beq => 0x3B,
            Self::Bge => 0x3C,
            Self::Bgt => 0x3D,
            Self::Ble => 0x3E,
            Self::Blt => 0x3F,
            Self::BneUn => 0x40,
            Self::BgeUn => 0x41,
            Self::BgtUn => 0x42,
            Self::BleUn => 0x43,
            Self::BltUn => 0x44,
            Self::Switch => 0x45,
            Self::Ret => 0x2A,
            Self::Leave => 0xDD,
            Self::Endfinally => 0xDC,
            Self::Endfilter => 0xFE11,
            Self::Throw => 0x7A,
            Self::Rethrow => 0xFE1A,
            Self::Call => 0x28,
            Self::Callvirt => 0x6F,
            Self::Newobj => 0x73,
            Self::Box => 0x8C,
            Self::UnboxAny => 0xA5,
            Self::Castclass => 0x74,
            Self::Isinst => 0x75,
            Self::Newarr => 0x8D,
            Self::Ldlen => 0x8E,
            Self::Ldtoken => 0xD0,
            Self::Ldfld => 0x7B,
            Self::Stfld => 0x7D,
            Self::Ldsfld => 0x7E,
            Self::Stsfld => 0x80,
        }
    }

    /// Size of the encoded opcode in bytes (operand excluded).
    pub const fn size(self) -> u32 {
        if self.value() > 0xFF { 2 } else { 1 }
    }

    /// Assembler mnemonic, as printed in listings.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Ldnull => "ldnull",
            Self::LdcI4S => "ldc.i4.s",
            Self::LdcI4 => "ldc.i4",
            Self::LdcI8 => "ldc.i8",
            Self::LdcR4 => "ldc.r4",
            Self::LdcR8 => "ldc.r8",
            Self::Ldstr => "ldstr",
            Self::Ldarg => "ldarg",
            Self::Starg => "starg",
            Self::Ldloc => "ldloc",
            Self::Ldloca => "ldloca",
            Self::Stloc => "stloc",
            Self::Dup => "dup",
            Self::Pop => "pop",
            Self::Add => "add",
            Self::AddOvf => "add.ovf",
            Self::AddOvfUn => "add.ovf.un",
            Self::Sub => "sub",
            Self::SubOvf => "sub.ovf",
            Self::SubOvfUn => "sub.ovf.un",
            Self::Mul => "mul",
            Self::MulOvf => "mul.ovf",
            Self::MulOvfUn => "mul.ovf.un",
            Self::Div => "div",
            Self::DivUn => "div.un",
            Self::Rem => "rem",
            Self::RemUn => "rem.un",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::ShrUn => "shr.un",
            Self::Neg => "neg",
            Self::Not => "not",
            Self::ConvI1 => "conv.i1",
            Self::ConvI2 => "conv.i2",
            Self::ConvI4 => "conv.i4",
            Self::ConvI8 => "conv.i8",
            Self::ConvU1 => "conv.u1",
            Self::ConvU2 => "conv.u2",
            Self::ConvU4 => "conv.u4",
            Self::ConvU8 => "conv.u8",
            Self::ConvI => "conv.i",
            Self::ConvU => "conv.u",
            Self::ConvR4 => "conv.r4",
            Self::ConvR8 => "conv.r8",
            Self::ConvRUn => "conv.r.un",
            Self::Ceq => "ceq",
            Self::Cgt => "cgt",
            Self::CgtUn => "cgt.un",
            Self::Clt => "clt",
            Self::CltUn => "clt.un",
            Self::Br => "br",
            Self::Brfalse => "brfalse",
            Self::Brtrue => "brtrue",
            Self::Beq => "beq",
            Self::Bge => "bge",
            Self::BgeUn => "bge.un",
            Self::Bgt => "bgt",
            Self::BgtUn => "bgt.un",
            Self::Ble => "ble",
            Self::BleUn => "ble.un",
            Self::Blt => "blt",
            Self::BltUn => "blt.un",
            Self::BneUn => "bne.un",
            Self::Switch => "switch",
            Self::Ret => "ret",
            Self::Leave => "leave",
            Self::Endfinally => "endfinally",
            Self::Endfilter => "endfilter",
            Self::Throw => "throw",
            Self::Rethrow => "rethrow",
            Self::Call => "call",
            Self::Callvirt => "callvirt",
            Self::Newobj => "newobj",
            Self::Box => "box",
            Self::UnboxAny => "unbox.any",
            Self::Castclass => "castclass",
            Self::Isinst => "isinst",
            Self::Newarr => "newarr",
            Self::Ldlen => "ldlen",
            Self::Ldtoken => "ldtoken",
            Self::Ldfld => "ldfld",
            Self::Stfld => "stfld",
            Self::Ldsfld => "ldsfld",
            Self::Stsfld => "stsfld",
        }
    }

    /// The operand shape this opcode declares.
    pub const fn operand_kind(self) -> OperandKind {
        match self {
            Self::LdcI4S => OperandKind::ShortInlineI,
            Self::LdcI4 => OperandKind::InlineI,
            Self::LdcI8 => OperandKind::InlineI8,
            Self::LdcR4 => OperandKind::ShortInlineR,
            Self::LdcR8 => OperandKind::InlineR,
            Self::Ldstr => OperandKind::InlineString,
            Self::Ldarg | Self::Starg => OperandKind::InlineArg,
            Self::Ldloc | Self::Ldloca | Self::Stloc => OperandKind::InlineVar,
            Self::Br
            | Self::Brfalse
            | Self::Brtrue
            | Self::Beq
            | Self::Bge
            | Self::BgeUn
            | Self::Bgt
            | Self::BgtUn
            | Self::Ble
            | Self::BleUn
            | Self::Blt
            | Self::BltUn
            | Self::BneUn
            | Self::Leave => OperandKind::InlineBrTarget,
            Self::Switch => OperandKind::InlineSwitch,
            Self::Call | Self::Callvirt | Self::Newobj => OperandKind::InlineMethod,
            Self::Box
            | Self::UnboxAny
            | Self::Castclass
            | Self::Isinst
            | Self::Newarr => OperandKind::InlineType,
            Self::Ldtoken => OperandKind::InlineTok,
            Self::Ldfld | Self::Stfld | Self::Ldsfld | Self::Stsfld => OperandKind::InlineField,
            _ => OperandKind::InlineNone,
        }
    }

    /// Check if this is a branch instruction (including `switch` and `leave`).
    pub const fn is_branch(self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::InlineBrTarget | OperandKind::InlineSwitch
        )
    }

    /// Check if control never continues to the next instruction.
    pub const fn ends_flow(self) -> bool {
        matches!(
            self,
            Self::Br
                | Self::Leave
                | Self::Ret
                | Self::Throw
                | Self::Rethrow
                | Self::Endfinally
                | Self::Endfilter
        )
    }

    /// Static stack behaviour of this opcode with the given operand.
    ///
    /// Call-shaped opcodes take their counts from the referenced method
    /// signature; `ret` pops one value when the enclosing method returns one.
    /// Opcodes that empty the evaluation stack (`leave`, `endfinally`,
    /// `throw`, ...) only report what they consume themselves.
    pub fn stack_behaviour(self, operand: &Operand, method_returns_value: bool) -> StackBehaviour {
        match self {
            Self::Nop
            | Self::Br
            | Self::Leave
            | Self::Endfinally
            | Self::Rethrow => StackBehaviour::new(0, 0),

            Self::Ldnull
            | Self::LdcI4S
            | Self::LdcI4
            | Self::LdcI8
            | Self::LdcR4
            | Self::LdcR8
            | Self::Ldstr
            | Self::Ldarg
            | Self::Ldloc
            | Self::Ldloca
            | Self::Ldsfld
            | Self::Ldtoken => StackBehaviour::new(0, 1),

            Self::Starg
            | Self::Stloc
            | Self::Pop
            | Self::Stsfld
            | Self::Brfalse
            | Self::Brtrue
            | Self::Switch
            | Self::Endfilter
            | Self::Throw => StackBehaviour::new(1, 0),

            Self::Dup => StackBehaviour::new(1, 2),

            Self::Neg
            | Self::Not
            | Self::ConvI1
            | Self::ConvI2
            | Self::ConvI4
            | Self::ConvI8
            | Self::ConvU1
            | Self::ConvU2
            | Self::ConvU4
            | Self::ConvU8
            | Self::ConvI
            | Self::ConvU
            | Self::ConvR4
            | Self::ConvR8
            | Self::ConvRUn
            | Self::Box
            | Self::UnboxAny
            | Self::Castclass
            | Self::Isinst
            | Self::Newarr
            | Self::Ldlen
            | Self::Ldfld => StackBehaviour::new(1, 1),

            Self::Add
            | Self::AddOvf
            | Self::AddOvfUn
            | Self::Sub
            | Self::SubOvf
            | Self::SubOvfUn
            | Self::Mul
            | Self::MulOvf
            | Self::MulOvfUn
            | Self::Div
            | Self::DivUn
            | Self::Rem
            | Self::RemUn
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Shl
            | Self::Shr
            | Self::ShrUn
            | Self::Ceq
            | Self::Cgt
            | Self::CgtUn
            | Self::Clt
            | Self::CltUn => StackBehaviour::new(2, 1),

            Self::Beq
            | Self::Bge
            | Self::BgeUn
            | Self::Bgt
            | Self::BgtUn
            | Self::Ble
            | Self::BleUn
            | Self::Blt
            | Self::BltUn
            | Self::BneUn
            | Self::Stfld => StackBehaviour::new(2, 0),

            Self::Ret => StackBehaviour::new(method_returns_value as u32, 0),

            Self::Call | Self::Callvirt => match operand {
                Operand::Method(method) => StackBehaviour::new(
                    method.signature.params.len() as u32 + method.signature.has_this as u32,
                    method.signature.returns_value() as u32,
                ),
                _ => StackBehaviour::new(0, 0),
            },

            Self::Newobj => match operand {
                Operand::Method(ctor) => {
                    StackBehaviour::new(ctor.signature.params.len() as u32, 1)
                }
                _ => StackBehaviour::new(0, 1),
            },
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
