//! String-domain generator.

use std::sync::Arc;

use morph_diagnostic::{MessageContext, Severity, SpamBin};
use morph_graph::{node_identity, CellValue, ColumnType, StringNode, StringNodeRef, SwitchNode,
    VariationNode};
use morph_ir::{Conditional, StringOp, StringOpRef, Switch, SwitchCase};

use crate::options::GenerationOptions;
use crate::params;
use crate::scalar::case_value;
use crate::CodeGenerator;

impl CodeGenerator {
    pub(crate) fn generate_string(
        &self,
        options: &GenerationOptions,
        node: Option<&StringNodeRef>,
    ) -> StringOpRef {
        let Some(node) = node else {
            return Arc::new(StringOp::Constant(String::new()));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.strings.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.string_dispatch(options, node)
        });
        self.caches.strings.insert_shared(key, result)
    }

    pub(crate) fn missing_string(&self, what: &str, context: &MessageContext) -> StringOpRef {
        self.sink.add(
            format!("required {what} connection is missing"),
            Severity::Error,
            context.clone(),
            SpamBin::MissingConnection,
        );
        Arc::new(StringOp::Constant(String::new()))
    }

    fn string_dispatch(&self, options: &GenerationOptions, node: &StringNodeRef) -> StringOpRef {
        match &**node {
            StringNode::Constant { value } => Arc::new(StringOp::Constant(value.clone())),
            StringNode::Parameter(decl) => params::string_parameter_op(
                &self.caches.params,
                &self.sink,
                node_identity(node),
                decl,
            ),
            StringNode::Switch(switch) => self.string_switch(options, switch),
            StringNode::Variation(variation) => self.string_variation(options, variation),
            StringNode::Table(table) => {
                let expanded = self.expand_table(options, table, ColumnType::String, false, |cell, _| {
                    match cell {
                        CellValue::String(value) => {
                            Some(Arc::new(StringOp::Constant(value.clone())))
                        }
                        _ => unreachable!("column type was validated by the expander"),
                    }
                });
                match expanded {
                    Some(switch) => Arc::new(StringOp::Switch(switch)),
                    None => Arc::new(StringOp::Constant(String::new())),
                }
            }
        }
    }

    fn string_switch(
        &self,
        options: &GenerationOptions,
        switch: &SwitchNode<StringNode>,
    ) -> StringOpRef {
        if switch.options.is_empty() {
            self.sink
                .error("string switch declares no options", switch.context.clone());
            return Arc::new(StringOp::Constant(String::new()));
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(options, Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            let branch = match option {
                Some(child) => self.generate_string(options, Some(child)),
                None => self.missing_string("switch option", &switch.context),
            };
            cases.push(SwitchCase::new(case_value(index), Some(branch)));
        }
        Arc::new(StringOp::Switch(Switch {
            selector,
            cases,
            default: None,
        }))
    }

    fn string_variation(
        &self,
        options: &GenerationOptions,
        variation: &VariationNode<StringNode>,
    ) -> StringOpRef {
        let mut current = self.generate_string(options, variation.default_value.as_ref());
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = self.generate_string(options, branch.value.as_ref());
            current = Arc::new(StringOp::Conditional(Conditional {
                condition,
                yes: Some(content),
                no: Some(current),
            }));
        }
        current
    }
}
