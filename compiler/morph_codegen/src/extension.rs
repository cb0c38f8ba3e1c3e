//! Extension-data generator: opaque host payloads.

use std::sync::Arc;

use morph_graph::{node_identity, ExtensionDataNode, ExtensionDataNodeRef, SwitchNode,
    VariationNode};
use morph_ir::{Conditional, ExtensionData, ExtensionOp, ExtensionOpRef, Switch, SwitchCase};

use crate::options::GenerationOptions;
use crate::scalar::case_value;
use crate::CodeGenerator;

impl CodeGenerator {
    pub(crate) fn generate_extension(
        &self,
        options: &GenerationOptions,
        node: Option<&ExtensionDataNodeRef>,
    ) -> ExtensionOpRef {
        let Some(node) = node else {
            return Arc::new(ExtensionOp::Constant(ExtensionData::empty()));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.extensions.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.extension_dispatch(options, node)
        });
        self.caches.extensions.insert_shared(key, result)
    }

    fn extension_dispatch(
        &self,
        options: &GenerationOptions,
        node: &ExtensionDataNodeRef,
    ) -> ExtensionOpRef {
        match &**node {
            ExtensionDataNode::Constant { data } => Arc::new(ExtensionOp::Constant(data.clone())),
            ExtensionDataNode::Switch(switch) => self.extension_switch(options, switch),
            ExtensionDataNode::Variation(variation) => {
                self.extension_variation(options, variation)
            }
        }
    }

    fn extension_switch(
        &self,
        options: &GenerationOptions,
        switch: &SwitchNode<ExtensionDataNode>,
    ) -> ExtensionOpRef {
        if switch.options.is_empty() {
            self.sink.error(
                "extension data switch declares no options",
                switch.context.clone(),
            );
            return Arc::new(ExtensionOp::Constant(ExtensionData::empty()));
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(options, Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            let branch = self.generate_extension(options, option.as_ref());
            cases.push(SwitchCase::new(case_value(index), Some(branch)));
        }
        Arc::new(ExtensionOp::Switch(Switch {
            selector,
            cases,
            default: None,
        }))
    }

    fn extension_variation(
        &self,
        options: &GenerationOptions,
        variation: &VariationNode<ExtensionDataNode>,
    ) -> ExtensionOpRef {
        let mut current = self.generate_extension(options, variation.default_value.as_ref());
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = self.generate_extension(options, branch.value.as_ref());
            current = Arc::new(ExtensionOp::Conditional(Conditional {
                condition,
                yes: Some(content),
                no: Some(current),
            }));
        }
        current
    }
}
