//! The output of code generation: one method body.

use core::fmt;

use hashbrown::HashMap;

use crate::ast::{VarId, Variable};
use crate::cil::{Instruction, Label, Operand, TypeRef};

/// Why a variable could not be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// The variable is already in the table.
    Duplicate,
    /// Local slot indices are 16 bits wide.
    TooManyLocals,
}

/// The local variable table of a method body.
///
/// Each declared variable is registered exactly once and receives a dense
/// slot index in registration order.
#[derive(Debug, Default, Clone)]
pub struct VariableTable {
    locals: Vec<Variable>,
    slots: HashMap<VarId, u16>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable and return its slot.
    pub fn register(&mut self, variable: &Variable) -> Result<u16, RegisterError> {
        if self.slots.contains_key(&variable.id) {
            return Err(RegisterError::Duplicate);
        }
        let slot: u16 = self
            .locals
            .len()
            .try_into()
            .map_err(|_| RegisterError::TooManyLocals)?;
        self.slots.insert(variable.id, slot);
        self.locals.push(variable.clone());
        Ok(slot)
    }

    pub fn slot(&self, id: VarId) -> Option<u16> {
        self.slots.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    /// Registered variables in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.locals.iter()
    }
}

/// The kind of a protected region's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Typed catch clause.
    Exception,
    Filter,
    Fault,
    Finally,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exception => f.write_str("catch"),
            Self::Filter => f.write_str("filter"),
            Self::Fault => f.write_str("fault"),
            Self::Finally => f.write_str("finally"),
        }
    }
}

/// A region boundary: the labelled instruction it starts or ends at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub label: Label,
    pub offset: u32,
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.offset)
    }
}

/// One entry of the exception-handler table.
///
/// End anchors are exclusive: the region stops right before the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: Anchor,
    pub try_end: Anchor,
    pub handler_start: Anchor,
    pub handler_end: Anchor,
    /// Caught exception type of a typed catch clause.
    pub catch_type: Option<TypeRef>,
    /// Start of the filter expression of a filter clause.
    pub filter_start: Option<Anchor>,
}

impl fmt::Display for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".try {} to {} ", self.try_start, self.try_end)?;
        match (self.kind, &self.catch_type, &self.filter_start) {
            (HandlerKind::Exception, Some(ty), _) => write!(f, "catch {} ", ty)?,
            (HandlerKind::Filter, _, Some(filter)) => write!(f, "filter {} ", filter)?,
            (kind, _, _) => write!(f, "{} ", kind)?,
        }
        write!(f, "handler {} to {}", self.handler_start, self.handler_end)
    }
}

/// A method body under construction.
///
/// The caller owns it; code generation only appends to its tables.
#[derive(Debug, Default, Clone)]
pub struct MethodBody {
    pub variables: VariableTable,
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
    pub max_stack: u32,
}

impl MethodBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total encoded size of the instruction stream.
    pub fn code_size(&self) -> u32 {
        self.instructions
            .last()
            .map(|last| last.offset + last.size())
            .unwrap_or(0)
    }

    /// Offset of the instruction `label` is bound to.
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.instructions
            .iter()
            .find(|instr| instr.label == Some(label))
            .map(|instr| instr.offset)
    }

    fn label_offsets(&self) -> HashMap<Label, u32> {
        self.instructions
            .iter()
            .filter_map(|instr| instr.label.map(|label| (label, instr.offset)))
            .collect()
    }
}

/// IL listing, one instruction per line, with branch targets resolved to
/// offsets.
impl fmt::Display for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offsets = self.label_offsets();
        let target = |label: &Label| match offsets.get(label) {
            Some(offset) => format!("IL_{:04x}", offset),
            None => format!("{}", label),
        };

        writeln!(f, ".maxstack {}", self.max_stack)?;
        if !self.variables.is_empty() {
            writeln!(f, ".locals init (")?;
            for (slot, variable) in self.variables.iter().enumerate() {
                writeln!(f, "    [{}] {} {}", slot, variable.signature, variable.name)?;
            }
            writeln!(f, ")")?;
        }

        for instr in &self.instructions {
            write!(f, "IL_{:04x}: {}", instr.offset, instr.opcode)?;
            match &instr.operand {
                Operand::None => {}
                Operand::Label(label) => write!(f, " {}", target(label))?,
                Operand::Switch(labels) => {
                    let targets: Vec<String> = labels.iter().map(|label| target(label)).collect();
                    write!(f, " ({})", targets.join(", "))?;
                }
                operand => write!(f, " {}", operand)?,
            }
            writeln!(f)?;
        }

        for handler in &self.exception_handlers {
            writeln!(f, "{}", handler)?;
        }
        Ok(())
    }
}
