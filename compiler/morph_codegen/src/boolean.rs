//! Boolean-domain generator.

use std::sync::Arc;

use morph_graph::{node_identity, BoolNode, BoolNodeRef};
use morph_ir::{BoolOp, BoolOpRef};

use crate::options::GenerationOptions;
use crate::params;
use crate::CodeGenerator;

impl CodeGenerator {
    pub(crate) fn generate_bool(
        &self,
        options: &GenerationOptions,
        node: Option<&BoolNodeRef>,
    ) -> BoolOpRef {
        let Some(node) = node else {
            return Arc::new(BoolOp::Constant(true));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.bools.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.bool_dispatch(options, node)
        });
        self.caches.bools.insert_shared(key, result)
    }

    fn bool_dispatch(&self, options: &GenerationOptions, node: &BoolNodeRef) -> BoolOpRef {
        match &**node {
            BoolNode::Constant { value } => Arc::new(BoolOp::Constant(*value)),
            BoolNode::Parameter(decl) => params::bool_parameter_op(
                &self.caches.params,
                &self.sink,
                node_identity(node),
                decl,
            ),
            BoolNode::Not { source } => {
                Arc::new(BoolOp::Not(self.generate_bool(options, source.as_ref())))
            }
            BoolNode::And { a, b, .. } => Arc::new(BoolOp::And {
                a: Some(self.generate_bool(options, a.as_ref())),
                b: Some(self.generate_bool(options, b.as_ref())),
            }),
        }
    }
}
