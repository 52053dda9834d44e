use tracing::{debug, trace, warn};

use crate::ast::{AstFormatter, AstNode, CompilationUnit, NodeId, VarId};
use crate::cil::{LabelAllocator, MethodBody, RegisterError};
use crate::codegen::error::{INVALID_GRAPH, INVALID_VARIABLE};
use crate::codegen::lower::Lowering;
use crate::codegen::regions::RegionBuilder;
use crate::codegen::schedule::{fall_through, schedule};
use crate::codegen::stage::{BodyEmitter, Skeleton};
use crate::codegen::{CodegenError, CodegenOptions, Mismatch};
use crate::context::{ArchConstants, FlagExpressionBuilder, ReferenceImporter};

/// Generates target method bodies from compilation units.
///
/// The generator holds the services lowering needs and is reusable across
/// units; every call to [`compile`](Self::compile) is independent.
///
/// Compilation runs in fixed phases:
///
/// 1. register every declared variable in the method's local table
/// 2. give every graph node a header label
/// 3. order the blocks by walking the dominator tree
/// 4. lower each block in that order and assign offsets, ending a block
///    with a jump when its fall-through successor is laid out elsewhere
/// 5. rebuild the exception-handler table from the emitted blocks
pub struct CilCodeGenerator<'a> {
    importer: &'a mut dyn ReferenceImporter,
    constants: &'a dyn ArchConstants,
    flag_builder: &'a mut dyn FlagExpressionBuilder,
    formatter: &'a dyn AstFormatter,
    options: CodegenOptions,
}

impl<'a> CilCodeGenerator<'a> {
    pub fn new(
        importer: &'a mut dyn ReferenceImporter,
        constants: &'a dyn ArchConstants,
        flag_builder: &'a mut dyn FlagExpressionBuilder,
        formatter: &'a dyn AstFormatter,
    ) -> Self {
        Self {
            importer,
            constants,
            flag_builder,
            formatter,
            options: CodegenOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodegenOptions) -> Self {
        self.options = options;
        self
    }

    /// Generate the body of `unit` into `body`.
    ///
    /// Instructions, locals and handlers are appended; `max_stack` only ever
    /// grows. New labels never reuse a label already in `body`. On failure
    /// `body` may hold the locals registered so far.
    pub fn compile(
        &mut self,
        unit: &CompilationUnit,
        body: &mut MethodBody,
    ) -> Result<(), CodegenError> {
        self.compile_unit(unit, body).inspect_err(|err| {
            warn!(error = %err, "Code generation failed");
        })
    }

    fn compile_unit(
        &mut self,
        unit: &CompilationUnit,
        body: &mut MethodBody,
    ) -> Result<(), CodegenError> {
        for variable in &unit.variables {
            body.variables
                .register(variable)
                .map_err(|err| variable_error(variable.id, err))?;
        }

        let mut labels = LabelAllocator::continuing(&body.instructions);
        let skeleton = Skeleton::allocate(&unit.graph, &mut labels);

        let formatter = self.formatter;
        let order =
            schedule(&unit.graph, unit.entry).map_err(|cause| graph_error(formatter, unit, cause))?;
        debug!(blocks = order.len(), "Scheduled blocks");

        let mut emitter = BodyEmitter::new(body, unit.graph.node_count());
        let max_stack = {
            let mut lowering = Lowering::new(
                &skeleton,
                &body.variables,
                &mut labels,
                &mut *self.importer,
                self.constants,
                &mut *self.flag_builder,
                self.formatter,
                &self.options,
                unit.returns_value,
            );
            for (position, &node) in order.iter().enumerate() {
                let mut instrs = lowering.lower_block(node, &unit.graph[node])?;
                let next = order.get(position + 1).copied();
                let target = fall_through(&unit.graph, node)
                    .map_err(|cause| graph_error(formatter, unit, cause))?;
                if let Some(target) = target.filter(|&target| Some(target) != next) {
                    let leaves_region = unit.frames.iter().any(|frame| frame.exits(node, target));
                    trace!(
                        node = node.index(),
                        target = target.index(),
                        leaves_region,
                        "Fall-through successor not adjacent"
                    );
                    instrs.push(lowering.fall_through_jump(target, leaves_region));
                }
                emitter.emit_block(node, instrs);
            }
            lowering.max_stack()
        };
        let lowered = emitter.finish(body);

        let handlers = RegionBuilder::new(unit, &lowered, &self.options, self.formatter).build()?;
        debug!(
            instructions = body.instructions.len(),
            handlers = handlers.len(),
            max_stack,
            "Generated method body"
        );
        body.exception_handlers.extend(handlers);
        body.max_stack = body.max_stack.max(max_stack);
        Ok(())
    }
}

fn graph_error(formatter: &dyn AstFormatter, unit: &CompilationUnit, cause: Mismatch) -> CodegenError {
    let node = match &cause {
        Mismatch::UnreachableNode { node }
        | Mismatch::UnknownNode { node }
        | Mismatch::FallThroughSuccessors { node, .. } => *node,
        _ => unit.entry.index(),
    };
    let rendered = match unit.graph.node_weight(NodeId::new(node)) {
        Some(block) => formatter.format(AstNode::Block(block)),
        None => format!("<block {}>", node),
    };
    CodegenError::new(INVALID_GRAPH, rendered, cause)
}

fn variable_error(id: VarId, err: RegisterError) -> CodegenError {
    let cause = match err {
        RegisterError::Duplicate => Mismatch::DuplicateVariable(id),
        RegisterError::TooManyLocals => Mismatch::TooManyLocals,
    };
    CodegenError::new(INVALID_VARIABLE, id.to_string(), cause)
}
