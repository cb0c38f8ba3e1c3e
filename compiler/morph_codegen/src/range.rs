//! Range-domain generator: repetition axes attached to parameters.

use std::sync::Arc;

use morph_graph::{node_identity, RangeNode, RangeNodeRef};
use morph_ir::{RangeOp, RangeOpRef};

use crate::options::GenerationOptions;
use crate::CodeGenerator;

impl CodeGenerator {
    pub(crate) fn generate_range(
        &self,
        options: &GenerationOptions,
        node: Option<&RangeNodeRef>,
    ) -> Option<RangeOpRef> {
        let node = node?;
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.ranges.get(&key) {
            return Some(hit);
        }
        let result = match &**node {
            RangeNode::FromScalar { name, size, context } => {
                let size = match size {
                    Some(child) => self.generate_scalar(options, Some(child)),
                    None => self.missing_scalar("range size", 1.0, context),
                };
                Arc::new(RangeOp::FromScalar {
                    name: name.clone(),
                    size,
                })
            }
        };
        Some(self.caches.ranges.insert_shared(key, result))
    }

    /// Lower every range attached to a parameter declaration.
    pub(crate) fn generate_ranges(
        &self,
        options: &GenerationOptions,
        ranges: &[RangeNodeRef],
    ) -> Vec<RangeOpRef> {
        ranges
            .iter()
            .filter_map(|range| self.generate_range(options, Some(range)))
            .collect()
    }
}
