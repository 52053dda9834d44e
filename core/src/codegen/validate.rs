//! Static checks on instruction templates.
//!
//! Templates arrive from upstream already formed; nothing downstream
//! re-validates them, so operand shapes and stack depth are checked here
//! before anything is appended to the method body.

use hashbrown::HashMap;

use crate::cil::{Instruction, Label, OpCode, Operand};
use crate::codegen::Mismatch;

/// Check one instruction's operand against its opcode's declared kind.
///
/// Block references must also name a node of the graph, which has
/// `graph_size` nodes.
pub fn validate_operand(instr: &Instruction, graph_size: usize) -> Result<(), Mismatch> {
    let expected = instr.opcode.operand_kind();
    if !expected.accepts(&instr.operand) {
        let found = match &instr.operand {
            Operand::None => instr.operand.kind_name().to_string(),
            operand => format!("{} `{}`", operand.kind_name(), operand),
        };
        return Err(Mismatch::OperandKind {
            opcode: instr.opcode,
            expected,
            found,
        });
    }

    let out_of_graph = |node: &crate::ast::NodeId| node.index() >= graph_size;
    let unknown = match &instr.operand {
        Operand::Block(node) => Some(*node).filter(out_of_graph),
        Operand::BlockSwitch(nodes) => nodes.iter().copied().find(out_of_graph),
        _ => None,
    };
    match unknown {
        Some(node) => Err(Mismatch::UnknownBranchTarget {
            opcode: instr.opcode,
            target: node.index(),
        }),
        None => Ok(()),
    }
}

/// Tracks evaluation stack depth across a straight-line instruction sequence.
#[derive(Debug, Clone)]
pub struct StackChecker {
    depth: i64,
    max_depth: i64,
    returns_value: bool,
}

impl StackChecker {
    /// Start at `initial_depth` values, e.g. the arguments already pushed.
    pub fn new(initial_depth: i64, returns_value: bool) -> Self {
        Self {
            depth: initial_depth,
            max_depth: initial_depth,
            returns_value,
        }
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    pub fn max_depth(&self) -> i64 {
        self.max_depth
    }

    /// Apply one instruction. `position` identifies it in diagnostics.
    pub fn step(&mut self, position: usize, instr: &Instruction) -> Result<(), Mismatch> {
        let behaviour = instr
            .opcode
            .stack_behaviour(&instr.operand, self.returns_value);
        if self.depth < i64::from(behaviour.pops) {
            return Err(Mismatch::StackUnderflow {
                opcode: instr.opcode,
                position,
                depth: self.depth,
                pops: behaviour.pops,
            });
        }
        self.depth += behaviour.net();
        self.max_depth = self.max_depth.max(self.depth);
        Ok(())
    }

    pub fn check_all(&mut self, instrs: &[Instruction]) -> Result<(), Mismatch> {
        for (position, instr) in instrs.iter().enumerate() {
            self.step(position, instr)?;
        }
        Ok(())
    }

    /// Require the final depth to be exactly `expected`.
    pub fn finish(&self, expected: i64) -> Result<(), Mismatch> {
        if self.depth != expected {
            return Err(Mismatch::StackImbalance {
                expected,
                actual: self.depth,
            });
        }
        Ok(())
    }

    /// Peak depth of a full statement, starting from an empty stack.
    ///
    /// Depth is carried along branches: a labelled instruction starts at the
    /// deepest depth any branch to it leaves, and the instruction after an
    /// unconditional transfer is only reachable through its label. `leave`
    /// empties the stack at its target. Sequences produced outside this crate
    /// (flag expansions) are not checked, so depth is clamped at zero
    /// instead of failing.
    pub fn measure(instrs: &[Instruction], returns_value: bool) -> u32 {
        let mut at_label: HashMap<Label, i64> = HashMap::new();
        let mut depth: Option<i64> = Some(0);
        let mut peak: i64 = 0;
        for instr in instrs {
            if let Some(branched) = instr.label.and_then(|label| at_label.get(&label).copied()) {
                depth = Some(depth.map_or(branched, |depth| depth.max(branched)));
            }

            let behaviour = instr.opcode.stack_behaviour(&instr.operand, returns_value);
            let current = (depth.unwrap_or(0) - i64::from(behaviour.pops)).max(0)
                + i64::from(behaviour.pushes);
            peak = peak.max(current);

            let at_target = if instr.opcode == OpCode::Leave { 0 } else { current };
            let targets: &[Label] = match &instr.operand {
                Operand::Label(label) => core::slice::from_ref(label),
                Operand::Switch(labels) => labels,
                _ => &[],
            };
            for &target in targets {
                let entry = at_label.entry(target).or_insert(at_target);
                *entry = (*entry).max(at_target);
            }

            depth = if instr.opcode.ends_flow() { None } else { Some(current) };
        }
        u32::try_from(peak).unwrap_or(u32::MAX)
    }
}
