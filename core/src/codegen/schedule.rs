//! Block layout.
//!
//! Blocks are emitted in a depth-first pre-order walk of the dominator tree,
//! so every block lands after the block that dominates it and a dominated
//! sub-region stays contiguous. Children of a block are visited in order of
//! how control reaches them from that block:
//!
//! 1. the fall-through successor
//! 2. exceptional successors
//! 3. branch successors
//! 4. dominated blocks that are not direct successors
//!
//! Ties keep graph node order, which makes the layout deterministic.
//!
//! A fall-through successor the block does not dominate (a join) can still
//! land elsewhere. The driver then ends the block with an explicit jump; see
//! [`fall_through`].

use petgraph::algo::dominators;
use petgraph::visit::EdgeRef;
use smallvec::{SmallVec, smallvec};

use crate::ast::{ControlFlowGraph, EdgeKind, NodeId};
use crate::codegen::Mismatch;

type Children = SmallVec<[NodeId; 4]>;

/// Emission order of every node of `graph`.
///
/// Fails if `entry` is not a node of the graph or if some node cannot be
/// reached from it.
pub(crate) fn schedule(graph: &ControlFlowGraph, entry: NodeId) -> Result<Vec<NodeId>, Mismatch> {
    if entry.index() >= graph.node_count() {
        return Err(Mismatch::UnknownNode {
            node: entry.index(),
        });
    }

    let doms = dominators::simple_fast(graph, entry);
    let mut children: Vec<Children> = vec![Children::new(); graph.node_count()];
    for node in graph.node_indices() {
        if node == entry {
            continue;
        }
        match doms.immediate_dominator(node) {
            Some(idom) => children[idom.index()].push(node),
            None => {
                return Err(Mismatch::UnreachableNode {
                    node: node.index(),
                });
            }
        }
    }

    let mut order = Vec::with_capacity(graph.node_count());
    let mut stack: SmallVec<[NodeId; 16]> = smallvec![entry];
    while let Some(node) = stack.pop() {
        order.push(node);
        let kids = &mut children[node.index()];
        kids.sort_by_key(|&child| (successor_rank(graph, node, child), child.index()));
        stack.extend(kids.iter().rev().copied());
    }
    Ok(order)
}

/// The block `node` falls through into, if it has one.
///
/// Fails if `node` falls through into more than one distinct block.
pub(crate) fn fall_through(
    graph: &ControlFlowGraph,
    node: NodeId,
) -> Result<Option<NodeId>, Mismatch> {
    let mut targets: SmallVec<[NodeId; 2]> = graph
        .edges(node)
        .filter(|edge| *edge.weight() == EdgeKind::FallThrough)
        .map(|edge| edge.target())
        .collect();
    targets.sort_unstable();
    targets.dedup();
    match targets.as_slice() {
        [] => Ok(None),
        [target] => Ok(Some(*target)),
        targets => Err(Mismatch::FallThroughSuccessors {
            node: node.index(),
            count: targets.len(),
        }),
    }
}

/// How directly control reaches `child` from `parent`; lower comes first.
fn successor_rank(graph: &ControlFlowGraph, parent: NodeId, child: NodeId) -> u8 {
    graph
        .edges_connecting(parent, child)
        .map(|edge| match edge.weight() {
            EdgeKind::FallThrough => 0,
            EdgeKind::Exceptional => 1,
            EdgeKind::Branch => 2,
        })
        .min()
        .unwrap_or(3)
}
