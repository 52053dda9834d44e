//! The two stages of a method body under construction.
//!
//! Branches and region boundaries refer to blocks before those blocks have
//! code, so every node first gets a header label ([`Skeleton`]). Only once
//! all blocks are emitted and have offsets does a [`LoweredBody`] exist, and
//! region reconstruction accepts nothing else. Reading a header offset
//! before emission is therefore unrepresentable.

use crate::ast::{ControlFlowGraph, NodeId};
use crate::cil::{Anchor, Instruction, Label, LabelAllocator, MethodBody};

/// One header label per graph node, allocated before any body exists.
#[derive(Debug, Clone)]
pub struct Skeleton {
    headers: Vec<Label>,
}

impl Skeleton {
    pub fn allocate(graph: &ControlFlowGraph, labels: &mut LabelAllocator) -> Self {
        let headers = graph.node_indices().map(|_| labels.fresh()).collect();
        Self { headers }
    }

    /// Header label of `node`. Callers check graph membership first.
    pub fn header(&self, node: NodeId) -> Label {
        self.headers[node.index()]
    }

    pub fn node_count(&self) -> usize {
        self.headers.len()
    }
}

/// Where one block landed in the emitted instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmittedBlock {
    /// The block's header instruction, its first.
    pub header: Anchor,
    /// Offset right past the block's last instruction.
    pub end: u32,
    /// Position of the block in emission order.
    pub position: usize,
}

/// Every block emitted, with offsets assigned.
#[derive(Debug, Clone)]
pub struct LoweredBody {
    blocks: Vec<Option<EmittedBlock>>,
    order: Vec<NodeId>,
}

impl LoweredBody {
    pub fn block(&self, node: NodeId) -> Option<&EmittedBlock> {
        self.blocks.get(node.index()).and_then(Option::as_ref)
    }

    pub fn header(&self, node: NodeId) -> Option<Anchor> {
        self.block(node).map(|block| block.header)
    }

    /// The block emitted right after `node`, if any.
    pub fn next_in_order(&self, node: NodeId) -> Option<NodeId> {
        let block = self.block(node)?;
        self.order.get(block.position + 1).copied()
    }
}

/// Collects lowered blocks in emission order and assigns offsets.
#[derive(Debug)]
pub(crate) struct BodyEmitter {
    instructions: Vec<Instruction>,
    blocks: Vec<Option<EmittedBlock>>,
    order: Vec<NodeId>,
    offset: u32,
}

impl BodyEmitter {
    /// Emission continues after whatever `body` already holds.
    pub fn new(body: &MethodBody, node_count: usize) -> Self {
        Self {
            instructions: Vec::new(),
            blocks: vec![None; node_count],
            order: Vec::with_capacity(node_count),
            offset: body.code_size(),
        }
    }

    /// Append one lowered block. Its first instruction is its header.
    pub fn emit_block(&mut self, node: NodeId, instrs: Vec<Instruction>) {
        let mut header = None;
        for mut instr in instrs {
            instr.offset = self.offset;
            self.offset += instr.size();
            if header.is_none() {
                header = instr.label.map(|label| Anchor {
                    label,
                    offset: instr.offset,
                });
            }
            self.instructions.push(instr);
        }
        if let Some(header) = header {
            self.blocks[node.index()] = Some(EmittedBlock {
                header,
                end: self.offset,
                position: self.order.len(),
            });
        }
        self.order.push(node);
    }

    /// Move the instructions into `body`.
    pub fn finish(self, body: &mut MethodBody) -> LoweredBody {
        body.instructions.extend(self.instructions);
        LoweredBody {
            blocks: self.blocks,
            order: self.order,
        }
    }
}
