//! Color-domain generator.

use std::sync::Arc;

use morph_diagnostic::{MessageContext, Severity, SpamBin};
use morph_graph::{node_identity, CellValue, ColorNode, ColorNodeRef, ColumnType, SwitchNode,
    VariationNode};
use morph_ir::{Color, ColorOp, ColorOpRef, Conditional, Switch, SwitchCase};

use crate::options::GenerationOptions;
use crate::params;
use crate::scalar::case_value;
use crate::CodeGenerator;

/// Deliberately loud placeholder for missing required colors.
pub(crate) const MISSING_COLOR: Color = Color {
    r: morph_ir::Real::ONE,
    g: morph_ir::Real::ZERO,
    b: morph_ir::Real::ONE,
    a: morph_ir::Real::ONE,
};

impl CodeGenerator {
    pub(crate) fn generate_color(
        &self,
        options: &GenerationOptions,
        node: Option<&ColorNodeRef>,
    ) -> ColorOpRef {
        let Some(node) = node else {
            return Arc::new(ColorOp::Constant(Color::BLACK));
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.colors.get(&key) {
            return hit;
        }
        let result = stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW, || {
            self.color_dispatch(options, node)
        });
        self.caches.colors.insert_shared(key, result)
    }

    pub(crate) fn missing_color(&self, what: &str, context: &MessageContext) -> ColorOpRef {
        self.sink.add(
            format!("required {what} connection is missing"),
            Severity::Error,
            context.clone(),
            SpamBin::MissingConnection,
        );
        Arc::new(ColorOp::Constant(MISSING_COLOR))
    }

    fn color_dispatch(&self, options: &GenerationOptions, node: &ColorNodeRef) -> ColorOpRef {
        match &**node {
            ColorNode::Constant { value } => {
                Arc::new(ColorOp::Constant(Color::from_array(*value)))
            }
            ColorNode::Parameter(decl) => {
                let ranges = self.generate_ranges(options, &decl.ranges);
                params::color_parameter_op(
                    &self.caches.params,
                    &self.sink,
                    node_identity(node),
                    decl,
                    ranges,
                )
            }
            ColorNode::Switch(switch) => self.color_switch(options, switch),
            ColorNode::Variation(variation) => self.color_variation(options, variation),
            ColorNode::Table(table) => {
                let expanded = self.expand_table(options, table, ColumnType::Color, false, |cell, _| {
                    match cell {
                        CellValue::Color(value) => {
                            Some(Arc::new(ColorOp::Constant(Color::from_array(*value))))
                        }
                        _ => unreachable!("column type was validated by the expander"),
                    }
                });
                match expanded {
                    Some(switch) => Arc::new(ColorOp::Switch(switch)),
                    None => Arc::new(ColorOp::Constant(MISSING_COLOR)),
                }
            }
            ColorNode::Arithmetic { op, a, b, context } => {
                let a = match a {
                    Some(child) => self.generate_color(options, Some(child)),
                    None => self.missing_color("arithmetic operand", context),
                };
                let b = match b {
                    Some(child) => self.generate_color(options, Some(child)),
                    None => self.missing_color("arithmetic operand", context),
                };
                Arc::new(ColorOp::Arithmetic { op: *op, a, b })
            }
            ColorNode::FromScalars { r, g, b, a, .. } => Arc::new(ColorOp::FromScalars {
                r: self.generate_scalar(options, r.as_ref()),
                g: self.generate_scalar(options, g.as_ref()),
                b: self.generate_scalar(options, b.as_ref()),
                a: self.generate_scalar(options, a.as_ref()),
            }),
        }
    }

    fn color_switch(
        &self,
        options: &GenerationOptions,
        switch: &SwitchNode<ColorNode>,
    ) -> ColorOpRef {
        if switch.options.is_empty() {
            self.sink
                .error("color switch declares no options", switch.context.clone());
            return Arc::new(ColorOp::Constant(MISSING_COLOR));
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(options, Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            let branch = match option {
                Some(child) => self.generate_color(options, Some(child)),
                None => self.missing_color("switch option", &switch.context),
            };
            cases.push(SwitchCase::new(case_value(index), Some(branch)));
        }
        Arc::new(ColorOp::Switch(Switch {
            selector,
            cases,
            default: None,
        }))
    }

    fn color_variation(
        &self,
        options: &GenerationOptions,
        variation: &VariationNode<ColorNode>,
    ) -> ColorOpRef {
        let mut current = self.generate_color(options, variation.default_value.as_ref());
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = self.generate_color(options, branch.value.as_ref());
            current = Arc::new(ColorOp::Conditional(Conditional {
                condition,
                yes: Some(content),
                no: Some(current),
            }));
        }
        current
    }
}
