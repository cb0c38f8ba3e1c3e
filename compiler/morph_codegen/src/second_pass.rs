//! Condition composition: turn collected gating facts into boolean IR.
//!
//! Runs after the first pass and before code generation. For every tag
//! it composes the single "tag is active" expression (the union of its
//! activators, each guarded by its own reachability), then folds tag
//! gates into final per-surface and per-modifier conditions, and
//! resolves state-variation filters against the final state list.

use morph_diagnostic::DiagnosticSink;
use morph_ir::BoolOpRef;

use crate::conditions::{and_opt, const_bool, not, or_opt};
use crate::first_pass::FirstPass;

pub(crate) fn compose(first: &mut FirstPass, sink: &DiagnosticSink) {
    compose_tag_conditions(first);
    compose_surface_conditions(first);
    compose_modifier_conditions(first);
    resolve_state_filters(first, sink);
}

/// A tag is active when any of its activating surfaces or modifiers is
/// reachable. A tag without activators keeps `condition: None` and is
/// treated as never active downstream.
fn compose_tag_conditions(first: &mut FirstPass) {
    for tag_index in 0..first.tags.len() {
        let mut condition: Option<BoolOpRef> = None;
        let mut unconditional = false;

        for &surface_index in &first.tags[tag_index].surfaces {
            let surface = &first.surfaces[surface_index];
            let reach = and_opt(
                surface.object_condition.clone(),
                surface.surface_condition.clone(),
            );
            match reach {
                Some(reach) => condition = or_opt(condition, Some(reach)),
                // An unconditionally reachable activator makes the tag
                // unconditionally active.
                None => unconditional = true,
            }
        }
        for &modifier_index in &first.tags[tag_index].modifiers {
            let modifier = &first.modifiers[modifier_index];
            match modifier.object_condition.clone() {
                Some(reach) => condition = or_opt(condition, Some(reach)),
                None => unconditional = true,
            }
        }

        first.tags[tag_index].condition = if unconditional {
            Some(const_bool(true))
        } else {
            condition
        };
    }
}

/// Final surface condition: object reachability AND switch conditions
/// AND every positive tag active AND every negative tag inactive.
fn compose_surface_conditions(first: &mut FirstPass) {
    for surface_index in 0..first.surfaces.len() {
        let mut condition = and_opt(
            first.surfaces[surface_index].object_condition.clone(),
            first.surfaces[surface_index].surface_condition.clone(),
        );
        condition = fold_tag_gates(
            first,
            condition,
            &first.surfaces[surface_index].positive_tags.clone(),
            &first.surfaces[surface_index].negative_tags.clone(),
        );
        first.surfaces[surface_index].final_condition = condition;
    }
}

fn compose_modifier_conditions(first: &mut FirstPass) {
    for modifier_index in 0..first.modifiers.len() {
        let mut condition = first.modifiers[modifier_index].object_condition.clone();
        condition = fold_tag_gates(
            first,
            condition,
            &first.modifiers[modifier_index].positive_tags.clone(),
            &first.modifiers[modifier_index].negative_tags.clone(),
        );
        first.modifiers[modifier_index].final_condition = condition;
    }
}

fn fold_tag_gates(
    first: &FirstPass,
    mut condition: Option<BoolOpRef>,
    positive: &[String],
    negative: &[String],
) -> Option<BoolOpRef> {
    for tag in positive {
        let gate = first
            .tag_index(tag)
            .and_then(|i| first.tags[i].condition.clone())
            // A never-active required tag keeps this node out entirely.
            .unwrap_or_else(|| const_bool(false));
        condition = and_opt(condition, Some(gate));
    }
    for tag in negative {
        // A never-active excluded tag never excludes anything.
        let Some(index) = first.tag_index(tag) else { continue };
        let Some(gate) = first.tags[index].condition.clone() else { continue };
        condition = and_opt(condition, Some(not(gate)));
    }
    condition
}

/// Resolve state-variation name filters into per-state applicability
/// bitmaps, warning about names that match no declared state.
fn resolve_state_filters(first: &mut FirstPass, sink: &DiagnosticSink) {
    let state_names: Vec<String> = first.states.iter().map(|s| s.name.clone()).collect();

    for surface in &mut first.surfaces {
        let mut applicability = vec![true; state_names.len()];

        if !surface.state_positive.is_empty() {
            applicability = vec![false; state_names.len()];
            for name in &surface.state_positive {
                match state_names.iter().position(|s| s == name) {
                    Some(index) => applicability[index] = true,
                    None => sink.warning(
                        format!("surface state variation references unknown state `{name}`"),
                        morph_diagnostic::MessageContext::none(),
                    ),
                }
            }
        }
        for name in &surface.state_negative {
            if let Some(index) = state_names.iter().position(|s| s == name) {
                applicability[index] = false;
            }
        }

        surface.state_applicability = applicability;
    }
}
