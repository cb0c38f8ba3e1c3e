//! Projector-domain generator.

use std::sync::Arc;

use morph_graph::{node_identity, ProjectorDesc, ProjectorNode, ProjectorNodeRef};
use morph_ir::{Projector, ProjectorOp, ProjectorOpRef, Real};

use crate::options::GenerationOptions;
use crate::params;
use crate::CodeGenerator;

/// Convert an authored projector description into the IR value type.
pub(crate) fn projector_value(desc: &ProjectorDesc) -> Projector {
    fn reals(v: [f32; 3]) -> [Real; 3] {
        [Real(v[0]), Real(v[1]), Real(v[2])]
    }
    Projector {
        projection: desc.projection,
        position: reals(desc.position),
        direction: reals(desc.direction),
        up: reals(desc.up),
        scale: reals(desc.scale),
        angle: Real(desc.angle),
    }
}

impl CodeGenerator {
    pub(crate) fn generate_projector(
        &self,
        options: &GenerationOptions,
        node: Option<&ProjectorNodeRef>,
    ) -> ProjectorOpRef {
        let Some(node) = node else {
            return Arc::new(ProjectorOp::Constant(Projector::default()));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.projectors.get(&key) {
            return hit;
        }
        let result = match &**node {
            ProjectorNode::Constant { value } => {
                Arc::new(ProjectorOp::Constant(projector_value(value)))
            }
            ProjectorNode::Parameter(decl) => params::projector_parameter_op(
                &self.caches.params,
                &self.sink,
                node_identity(node),
                decl,
            ),
        };
        self.caches.projectors.insert_shared(key, result)
    }
}
