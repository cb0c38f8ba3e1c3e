//! Scalar-domain generator.

use std::sync::Arc;

use morph_diagnostic::{MessageContext, Severity, SpamBin};
use morph_graph::{node_identity, CellValue, ColumnType, ScalarNode, ScalarNodeRef, SwitchNode,
    VariationNode};
use morph_ir::{Conditional, Real, ScalarOp, ScalarOpRef, Switch, SwitchCase};

use crate::options::GenerationOptions;
use crate::params;
use crate::CodeGenerator;

impl CodeGenerator {
    /// Lower a scalar node. A missing node yields a neutral constant;
    /// call sites that *require* a connection report through
    /// [`CodeGenerator::missing_scalar`] instead.
    pub(crate) fn generate_scalar(
        &self,
        options: &GenerationOptions,
        node: Option<&ScalarNodeRef>,
    ) -> ScalarOpRef {
        let Some(node) = node else {
            return Arc::new(ScalarOp::Constant(Real::ZERO));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.scalars.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.scalar_dispatch(options, node)
        });
        self.caches.scalars.insert_shared(key, result)
    }

    /// Report a missing required scalar connection and produce the
    /// placeholder that stands in for it.
    pub(crate) fn missing_scalar(
        &self,
        what: &str,
        value: f32,
        context: &MessageContext,
    ) -> ScalarOpRef {
        self.sink.add(
            format!("required {what} connection is missing"),
            Severity::Error,
            context.clone(),
            SpamBin::MissingConnection,
        );
        Arc::new(ScalarOp::Constant(Real(value)))
    }

    fn scalar_dispatch(&self, options: &GenerationOptions, node: &ScalarNodeRef) -> ScalarOpRef {
        match &**node {
            ScalarNode::Constant { value } => Arc::new(ScalarOp::Constant(Real(*value))),
            ScalarNode::Parameter(decl) => {
                let ranges = self.generate_ranges(options, &decl.ranges);
                params::scalar_parameter_op(
                    &self.caches.params,
                    &self.sink,
                    node_identity(node),
                    decl,
                    ranges,
                )
            }
            ScalarNode::EnumParameter(decl) => {
                let ranges = self.generate_ranges(options, &decl.ranges);
                params::enum_parameter_op(
                    &self.caches.params,
                    &self.sink,
                    node_identity(node),
                    decl,
                    ranges,
                )
            }
            ScalarNode::Switch(switch) => self.scalar_switch(options, switch),
            ScalarNode::Variation(variation) => self.scalar_variation(options, variation),
            ScalarNode::Table(table) => {
                let expanded = self.expand_table(options, table, ColumnType::Scalar, false, |cell, _| {
                    match cell {
                        CellValue::Scalar(value) => {
                            Some(Arc::new(ScalarOp::Constant(Real(*value))))
                        }
                        _ => unreachable!("column type was validated by the expander"),
                    }
                });
                match expanded {
                    Some(switch) => Arc::new(ScalarOp::Switch(switch)),
                    None => Arc::new(ScalarOp::Constant(Real::ZERO)),
                }
            }
            ScalarNode::Arithmetic { op, a, b, context } => {
                let a = match a {
                    Some(child) => self.generate_scalar(options, Some(child)),
                    None => self.missing_scalar("arithmetic operand", 0.0, context),
                };
                let b = match b {
                    Some(child) => self.generate_scalar(options, Some(child)),
                    None => self.missing_scalar("arithmetic operand", 0.0, context),
                };
                Arc::new(ScalarOp::Arithmetic { op: *op, a, b })
            }
        }
    }

    fn scalar_switch(
        &self,
        options: &GenerationOptions,
        switch: &SwitchNode<ScalarNode>,
    ) -> ScalarOpRef {
        if switch.options.is_empty() {
            self.sink.error(
                "scalar switch declares no options",
                switch.context.clone(),
            );
            return Arc::new(ScalarOp::Constant(Real::ONE));
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(options, Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            let branch = match option {
                Some(child) => self.generate_scalar(options, Some(child)),
                None => self.missing_scalar("switch option", 0.0, &switch.context),
            };
            cases.push(SwitchCase::new(case_value(index), Some(branch)));
        }
        Arc::new(ScalarOp::Switch(Switch {
            selector,
            cases,
            default: None,
        }))
    }

    /// Variations compose bottom-up from the default: each declared
    /// branch wraps the running result, so the last declared branch ends
    /// up outermost and wins when several tags are active at once, and
    /// with none active the default shows through.
    fn scalar_variation(
        &self,
        options: &GenerationOptions,
        variation: &VariationNode<ScalarNode>,
    ) -> ScalarOpRef {
        let mut current = self.generate_scalar(options, variation.default_value.as_ref());
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = self.generate_scalar(options, branch.value.as_ref());
            current = Arc::new(ScalarOp::Conditional(Conditional {
                condition,
                yes: Some(content),
                no: Some(current),
            }));
        }
        current
    }
}

/// Branch value for the Nth declared option.
pub(crate) fn case_value(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
