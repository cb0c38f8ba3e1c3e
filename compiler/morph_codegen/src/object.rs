//! Object orchestration.
//!
//! Objects fold their components, extension data and child objects into
//! one growing instance chain. Group exclusivity is already encoded in
//! the first-pass conditions attached to each component, so group
//! generation just visits children in order.

use std::sync::Arc;

use morph_graph::{node_identity, ObjectNode, ObjectNodeRef};
use morph_ir::{Conditional, InstanceOp, InstanceOpRef};

use crate::component::ComponentOptions;
use crate::options::{GenerationOptions, NodeKey};
use crate::CodeGenerator;

/// Options identifying one object generation request.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub(crate) struct ObjectOptions {
    pub state: Option<usize>,
    pub base_instance: Option<InstanceOpRef>,
}

pub(crate) type ObjectCacheKey = (NodeKey, ObjectOptions);

impl CodeGenerator {
    pub(crate) fn generate_object(
        self: &Arc<Self>,
        options: &ObjectOptions,
        node: Option<&ObjectNodeRef>,
    ) -> Option<InstanceOpRef> {
        let Some(node) = node else {
            return options.base_instance.clone();
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.objects.get(&key) {
            return hit;
        }
        let result = match &**node {
            ObjectNode::New(object) => {
                let mut instance = options.base_instance.clone();

                for component in &object.components {
                    let component_options = ComponentOptions {
                        state: options.state,
                        base_instance: instance.clone(),
                    };
                    instance = self.generate_component(&component_options, Some(component));
                }

                if !object.extension_data.is_empty() {
                    let generic = GenerationOptions {
                        state: options.state,
                        active_tags: Vec::new(),
                        is_image: false,
                    };
                    let object_condition = self
                        .first_pass
                        .objects
                        .iter()
                        .find(|entry| Arc::ptr_eq(&entry.node, node))
                        .and_then(|entry| entry.condition.clone());
                    for extension in &object.extension_data {
                        let data = self.generate_extension(&generic, Some(&extension.node));
                        let op = Arc::new(InstanceOp::AddExtensionData {
                            instance: instance.clone(),
                            name: extension.name.clone(),
                            data,
                        });
                        instance = Some(match &object_condition {
                            Some(condition) => Arc::new(InstanceOp::Conditional(Conditional {
                                condition: Arc::clone(condition),
                                yes: Some(op),
                                no: instance.clone(),
                            })),
                            None => op,
                        });
                    }
                }

                for child in &object.children {
                    let child_options = ObjectOptions {
                        state: options.state,
                        base_instance: instance.clone(),
                    };
                    instance = self.generate_object(&child_options, Some(child));
                }

                instance
            }
            ObjectNode::Group(group) => {
                let mut instance = options.base_instance.clone();
                for child in &group.children {
                    let child_options = ObjectOptions {
                        state: options.state,
                        base_instance: instance.clone(),
                    };
                    instance = self.generate_object(&child_options, Some(child));
                }
                instance
            }
        };
        self.caches.objects.insert_shared(key, result)
    }
}
