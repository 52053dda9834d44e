//! Exception-handler table reconstruction.
//!
//! A recovered frame only names the graph nodes of its try body and its
//! handler body. Once every block has been emitted, the boundaries of each
//! region are the header instructions of particular blocks:
//!
//! - try start: header of the try node with the lowest offset
//! - handler start: header of the handler node with the lowest offset
//! - try end: the handler start, or the instruction after the try body
//!   (see [`TryEndAnchor`])
//! - handler end: header of the single successor of the handler node with
//!   the highest offset
//!
//! The layout has to keep each region in one piece: try start < try end <=
//! handler start < handler end, with every try block inside the try range
//! and every handler block inside the handler range. A frame the layout
//! splits is rejected.
//!
//! Handlers are only read from a [`LoweredBody`], so no boundary can be
//! computed before offsets exist.

use smallvec::SmallVec;

use crate::ast::{AstFormatter, AstNode, CompilationUnit, ExceptionFrame, NodeId, VmFrameKind};
use crate::cil::{Anchor, ExceptionHandler, HandlerKind};
use crate::codegen::error::{INVALID_FRAME, INVALID_GRAPH};
use crate::codegen::stage::LoweredBody;
use crate::codegen::{CodegenError, CodegenOptions, Mismatch, TryEndAnchor};

/// Map a virtualized frame kind to a target handler kind.
pub fn handler_kind(kind: VmFrameKind) -> Option<HandlerKind> {
    match kind {
        VmFrameKind::CATCH => Some(HandlerKind::Exception),
        VmFrameKind::FILTER => Some(HandlerKind::Filter),
        VmFrameKind::FAULT => Some(HandlerKind::Fault),
        VmFrameKind::FINALLY => Some(HandlerKind::Finally),
        _ => None,
    }
}

pub(crate) struct RegionBuilder<'a> {
    unit: &'a CompilationUnit,
    lowered: &'a LoweredBody,
    options: &'a CodegenOptions,
    formatter: &'a dyn AstFormatter,
}

impl<'a> RegionBuilder<'a> {
    pub fn new(
        unit: &'a CompilationUnit,
        lowered: &'a LoweredBody,
        options: &'a CodegenOptions,
        formatter: &'a dyn AstFormatter,
    ) -> Self {
        Self {
            unit,
            lowered,
            options,
            formatter,
        }
    }

    /// One handler per frame, in frame order.
    pub fn build(&self) -> Result<Vec<ExceptionHandler>, CodegenError> {
        self.unit
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| self.build_frame(index, frame))
            .collect()
    }

    fn build_frame(
        &self,
        index: usize,
        frame: &ExceptionFrame,
    ) -> Result<ExceptionHandler, CodegenError> {
        let try_blocks = self.emitted(index, "try", &frame.try_body)?;
        let handler_blocks = self.emitted(index, "handler", &frame.handler_body)?;

        let kind = handler_kind(frame.kind).ok_or_else(|| {
            self.error(
                INVALID_FRAME,
                try_blocks.first,
                Mismatch::UnsupportedFrameKind(frame.kind.0),
            )
        })?;

        let try_start = try_blocks.first_header;
        let handler_start = handler_blocks.first_header;
        let try_end = match self.options.try_end {
            TryEndAnchor::HandlerStart => handler_start,
            TryEndAnchor::TryBodyEnd => self.after(try_blocks.last)?,
        };
        let handler_end = self.single_successor(handler_blocks.last)?;

        let ordered = try_start.offset < try_end.offset
            && try_end.offset <= handler_start.offset
            && handler_start.offset < handler_end.offset;
        if !ordered {
            return Err(self.error(
                INVALID_FRAME,
                handler_blocks.last,
                Mismatch::RegionOrder {
                    frame: index,
                    try_start: try_start.offset,
                    try_end: try_end.offset,
                    handler_start: handler_start.offset,
                    handler_end: handler_end.offset,
                },
            ));
        }
        self.contained(index, "try", &frame.try_body, try_start, try_end)?;
        self.contained(index, "handler", &frame.handler_body, handler_start, handler_end)?;

        Ok(ExceptionHandler {
            kind,
            try_start,
            try_end,
            handler_start,
            handler_end,
            catch_type: match kind {
                HandlerKind::Exception => frame.catch_type.clone(),
                _ => None,
            },
            filter_start: match kind {
                HandlerKind::Filter => Some(handler_start),
                _ => None,
            },
        })
    }

    /// Lowest- and highest-offset blocks of a region.
    fn emitted(
        &self,
        frame: usize,
        region: &'static str,
        nodes: &[NodeId],
    ) -> Result<RegionBounds, CodegenError> {
        let mut bounds: Option<RegionBounds> = None;
        for &node in nodes {
            let Some(block) = self.lowered.block(node) else {
                return Err(CodegenError::new(
                    INVALID_FRAME,
                    format!("<{} region of exception frame {}>", region, frame),
                    Mismatch::UnknownNode { node: node.index() },
                ));
            };
            let offset = block.header.offset;
            bounds = Some(match bounds {
                None => RegionBounds {
                    first: node,
                    first_header: block.header,
                    last: node,
                    last_offset: offset,
                },
                Some(mut bounds) => {
                    if offset < bounds.first_header.offset {
                        bounds.first = node;
                        bounds.first_header = block.header;
                    }
                    if offset > bounds.last_offset {
                        bounds.last = node;
                        bounds.last_offset = offset;
                    }
                    bounds
                }
            });
        }
        bounds.ok_or_else(|| {
            CodegenError::new(
                INVALID_FRAME,
                format!("<exception frame {}>", frame),
                Mismatch::EmptyRegion { frame, region },
            )
        })
    }

    /// Require every block of `nodes` to lie within `[start, end)`.
    fn contained(
        &self,
        frame: usize,
        region: &'static str,
        nodes: &[NodeId],
        start: Anchor,
        end: Anchor,
    ) -> Result<(), CodegenError> {
        let outside = nodes.iter().copied().find(|&node| {
            self.lowered
                .block(node)
                .is_some_and(|block| block.header.offset < start.offset || block.end > end.offset)
        });
        match outside {
            Some(node) => Err(self.error(
                INVALID_FRAME,
                node,
                Mismatch::BlockOutsideRegion {
                    frame,
                    region,
                    node: node.index(),
                },
            )),
            None => Ok(()),
        }
    }

    /// Header of the block emitted right after `node`.
    fn after(&self, node: NodeId) -> Result<Anchor, CodegenError> {
        self.lowered
            .next_in_order(node)
            .and_then(|next| self.lowered.header(next))
            .ok_or_else(|| {
                self.error(
                    INVALID_FRAME,
                    node,
                    Mismatch::TryEndPastMethodEnd { node: node.index() },
                )
            })
    }

    fn single_successor(&self, node: NodeId) -> Result<Anchor, CodegenError> {
        let mut successors: SmallVec<[NodeId; 2]> = self.unit.graph.neighbors(node).collect();
        successors.sort_unstable();
        successors.dedup();

        match successors.as_slice() {
            [successor] => self.lowered.header(*successor).ok_or_else(|| {
                self.error(
                    INVALID_GRAPH,
                    *successor,
                    Mismatch::UnknownNode {
                        node: successor.index(),
                    },
                )
            }),
            other => Err(self.error(
                INVALID_GRAPH,
                node,
                Mismatch::HandlerSuccessors {
                    node: node.index(),
                    count: other.len(),
                },
            )),
        }
    }

    fn error(&self, message: &'static str, node: NodeId, cause: Mismatch) -> CodegenError {
        let rendered = match self.unit.graph.node_weight(node) {
            Some(block) => self.formatter.format(AstNode::Block(block)),
            None => format!("<block {}>", node.index()),
        };
        CodegenError::new(message, rendered, cause)
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionBounds {
    first: NodeId,
    first_header: Anchor,
    last: NodeId,
    last_offset: u32,
}
