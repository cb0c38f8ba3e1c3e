//! Matrix-domain generator.

use std::sync::Arc;

use morph_graph::{node_identity, MatrixNode, MatrixNodeRef, SwitchNode, VariationNode};
use morph_ir::{Conditional, Matrix4, MatrixOp, MatrixOpRef, Switch, SwitchCase};

use crate::options::GenerationOptions;
use crate::params;
use crate::scalar::case_value;
use crate::CodeGenerator;

impl CodeGenerator {
    pub(crate) fn generate_matrix(
        &self,
        options: &GenerationOptions,
        node: Option<&MatrixNodeRef>,
    ) -> MatrixOpRef {
        let Some(node) = node else {
            return Arc::new(MatrixOp::Constant(Matrix4::IDENTITY));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.matrices.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.matrix_dispatch(options, node)
        });
        self.caches.matrices.insert_shared(key, result)
    }

    fn matrix_dispatch(&self, options: &GenerationOptions, node: &MatrixNodeRef) -> MatrixOpRef {
        match &**node {
            MatrixNode::Constant { value } => {
                Arc::new(MatrixOp::Constant(Matrix4::from_array(*value)))
            }
            MatrixNode::Parameter(decl) => params::matrix_parameter_op(
                &self.caches.params,
                &self.sink,
                node_identity(node),
                decl,
            ),
            MatrixNode::Switch(switch) => self.matrix_switch(options, switch),
            MatrixNode::Variation(variation) => self.matrix_variation(options, variation),
        }
    }

    fn matrix_switch(
        &self,
        options: &GenerationOptions,
        switch: &SwitchNode<MatrixNode>,
    ) -> MatrixOpRef {
        if switch.options.is_empty() {
            self.sink
                .error("matrix switch declares no options", switch.context.clone());
            return Arc::new(MatrixOp::Constant(Matrix4::IDENTITY));
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(options, Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            let branch = self.generate_matrix(options, option.as_ref());
            cases.push(SwitchCase::new(case_value(index), Some(branch)));
        }
        Arc::new(MatrixOp::Switch(Switch {
            selector,
            cases,
            default: None,
        }))
    }

    fn matrix_variation(
        &self,
        options: &GenerationOptions,
        variation: &VariationNode<MatrixNode>,
    ) -> MatrixOpRef {
        let mut current = self.generate_matrix(options, variation.default_value.as_ref());
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = self.generate_matrix(options, branch.value.as_ref());
            current = Arc::new(MatrixOp::Conditional(Conditional {
                condition,
                yes: Some(content),
                no: Some(current),
            }));
        }
        current
    }
}
