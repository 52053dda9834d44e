//! Tests for block layout.

use pretty_assertions::assert_eq;

use crate::ast::{AstBlock, CompilationUnit, EdgeKind, NodeId};
use crate::codegen::Mismatch;
use crate::codegen::schedule::{fall_through, schedule};

fn unit_with(nodes: usize, edges: &[(usize, usize, EdgeKind)]) -> CompilationUnit {
    let mut unit = CompilationUnit::new();
    for _ in 0..nodes {
        unit.add_block(AstBlock::default());
    }
    for &(from, to, kind) in edges {
        unit.add_edge(NodeId::new(from), NodeId::new(to), kind);
    }
    unit
}

fn indices(order: &[NodeId]) -> Vec<usize> {
    order.iter().map(|node| node.index()).collect()
}

#[test]
fn test_single_node() {
    let unit = unit_with(1, &[]);
    assert_eq!(indices(&schedule(&unit.graph, unit.entry).unwrap()), vec![0]);
}

#[test]
fn test_fall_through_follows_predecessor() {
    use EdgeKind::*;
    // 0: brtrue 2, falls into 1; 1 and 2 both reach 3.
    let unit = unit_with(4, &[(0, 2, Branch), (0, 1, FallThrough), (1, 3, Branch), (2, 3, FallThrough)]);
    let order = schedule(&unit.graph, unit.entry).unwrap();
    assert_eq!(indices(&order), vec![0, 1, 2, 3]);
}

#[test]
fn test_fall_through_beats_node_order() {
    use EdgeKind::*;
    let unit = unit_with(3, &[(0, 1, Branch), (0, 2, FallThrough)]);
    let order = schedule(&unit.graph, unit.entry).unwrap();
    assert_eq!(indices(&order), vec![0, 2, 1]);
}

#[test]
fn test_dominated_subtree_is_contiguous() {
    use EdgeKind::*;
    // 0 -> {1, 4}; 1 -> {2, 3}; 2, 3 -> 5; 4 -> 5.
    let unit = unit_with(
        6,
        &[
            (0, 1, FallThrough),
            (0, 4, Branch),
            (1, 2, FallThrough),
            (1, 3, Branch),
            (2, 5, Branch),
            (3, 5, Branch),
            (4, 5, FallThrough),
        ],
    );
    let order = indices(&schedule(&unit.graph, unit.entry).unwrap());
    assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_handler_follows_protected_region() {
    use EdgeKind::*;
    // 0 -> try {1, 2} with handler 3; both leave to 4.
    let unit = unit_with(
        5,
        &[
            (0, 1, FallThrough),
            (1, 2, FallThrough),
            (1, 3, Exceptional),
            (2, 3, Exceptional),
            (2, 4, Branch),
            (3, 4, Branch),
        ],
    );
    let order = indices(&schedule(&unit.graph, unit.entry).unwrap());
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_loop_back_edge() {
    use EdgeKind::*;
    // 0 -> 1 (header) -> 2 (body) -> 1; 1 -> 3 exit.
    let unit = unit_with(4, &[(0, 1, FallThrough), (1, 2, FallThrough), (2, 1, Branch), (1, 3, Branch)]);
    let order = indices(&schedule(&unit.graph, unit.entry).unwrap());
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_every_node_scheduled_once() {
    use EdgeKind::*;
    let unit = unit_with(
        5,
        &[
            (0, 1, Branch),
            (0, 2, Branch),
            (1, 3, Branch),
            (2, 3, Branch),
            (3, 4, FallThrough),
            (4, 0, Branch),
        ],
    );
    let mut order = indices(&schedule(&unit.graph, unit.entry).unwrap());
    assert_eq!(order[0], 0);
    order.sort_unstable();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_unreachable_node_is_rejected() {
    use EdgeKind::*;
    let unit = unit_with(3, &[(0, 1, FallThrough)]);
    assert_eq!(
        schedule(&unit.graph, unit.entry),
        Err(Mismatch::UnreachableNode { node: 2 })
    );
}

#[test]
fn test_entry_outside_graph() {
    let unit = unit_with(0, &[]);
    assert_eq!(
        schedule(&unit.graph, unit.entry),
        Err(Mismatch::UnknownNode { node: 0 })
    );
}

#[test]
fn test_fall_through_into_join_is_not_adjacent() {
    use EdgeKind::*;
    // 0: brtrue 1, falls into 2; 2 falls into 3; 1: br 3. Node 3 is a join
    // only dominated by 0, so it is laid out after 1.
    let unit = unit_with(4, &[(0, 1, Branch), (0, 2, FallThrough), (2, 3, FallThrough), (1, 3, Branch)]);
    let order = indices(&schedule(&unit.graph, unit.entry).unwrap());
    assert_eq!(order, vec![0, 2, 1, 3]);
    assert_eq!(fall_through(&unit.graph, NodeId::new(2)), Ok(Some(NodeId::new(3))));
}

#[test]
fn test_fall_through_query() {
    use EdgeKind::*;
    let unit = unit_with(4, &[(0, 1, Branch), (0, 2, FallThrough), (0, 2, Branch), (1, 3, FallThrough), (1, 2, FallThrough)]);
    assert_eq!(fall_through(&unit.graph, NodeId::new(0)), Ok(Some(NodeId::new(2))));
    assert_eq!(fall_through(&unit.graph, NodeId::new(3)), Ok(None));
    assert_eq!(
        fall_through(&unit.graph, NodeId::new(1)),
        Err(Mismatch::FallThroughSuccessors { node: 1, count: 2 })
    );
}
