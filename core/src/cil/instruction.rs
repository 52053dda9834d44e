use core::fmt;

use crate::cil::{OpCode, Operand};

/// Identity of a branch target or region anchor.
///
/// A label is bound to exactly one instruction of a method body. Labels are
/// dense indices handed out by a [`LabelAllocator`], so per-label data can
/// live in plain vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Hands out fresh labels for one method body.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator whose labels never collide with any label bound to or
    /// referenced by `instrs`.
    pub fn continuing(instrs: &[Instruction]) -> Self {
        let mut next = 0;
        for instr in instrs {
            let targets: &[Label] = match &instr.operand {
                Operand::Label(label) => core::slice::from_ref(label),
                Operand::Switch(labels) => labels,
                _ => &[],
            };
            for label in instr.label.iter().chain(targets) {
                next = next.max(label.0 + 1);
            }
        }
        Self { next }
    }

    pub fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}

/// A single target instruction.
///
/// `offset` is meaningless until the instruction is emitted into a method
/// body; the compilation driver assigns it exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
    pub label: Option<Label>,
    pub offset: u32,
}

impl Instruction {
    pub fn new(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand,
            label: None,
            offset: 0,
        }
    }

    /// An instruction without operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self::new(opcode, Operand::None)
    }

    /// Bind `label` to this instruction.
    pub fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> u32 {
        self.opcode.size() + self.operand.size()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = self.label {
            write!(f, "{}: ", label)?;
        }
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            ref operand => write!(f, "{} {}", self.opcode, operand),
        }
    }
}
