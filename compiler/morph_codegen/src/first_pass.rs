//! First pass: structural and condition collection.
//!
//! A single depth-first walk over the object/component/surface/modifier
//! structure that records, for every node of interest, the boolean
//! condition under which it is reachable (derived from switches and
//! exclusive groups), the tags it activates or is gated by, and the
//! declared states. Value-domain subtrees are not entered here; they are
//! lowered later by the per-domain generators.
//!
//! Conditions are passed down the recursion as explicit parameters
//! instead of a mutable push/pop stack, which keeps the walk trivially
//! balanced.

use std::sync::Arc;

use morph_diagnostic::{DiagnosticSink, Severity, SpamBin};
use morph_graph::{
    node_identity, ComponentNew, ComponentNode, ComponentNodeRef, GroupType, ModifierNodeRef,
    Node, ObjectGroup, ObjectNode, ObjectNodeRef, ScalarNode, ScalarNodeRef, StateDesc,
    SurfaceNode, SurfaceNodeRef, SurfaceVariation, VariationKind,
};
use morph_ir::{BoolOpRef, EnumOption, Real, ScalarOp, ScalarOpRef};
use rustc_hash::FxHashMap;

use crate::conditions::{and_opt, const_bool, enum_equals};
use crate::options::NodeKey;
use crate::params::{self, ParamCaches};

/// Warn when one state exposes more runtime parameters than this;
/// runtime update cost grows with each one.
pub(crate) const MAX_STATE_RUNTIME_PARAMS: usize = 64;

/// An object discovered by the walk, with its reachability condition.
pub(crate) struct ObjectEntry {
    pub node: ObjectNodeRef,
    pub condition: Option<BoolOpRef>,
}

/// A concrete component and the conditions guarding it.
pub(crate) struct ComponentEntry {
    pub node: ComponentNodeRef,
    pub object_condition: Option<BoolOpRef>,
    pub component_condition: Option<BoolOpRef>,
}

/// A concrete surface with its gating information.
///
/// `final_condition` and `state_applicability` stay empty until the
/// tag-composition pass fills them in.
pub(crate) struct SurfaceEntry {
    pub node: SurfaceNodeRef,
    pub component: Option<ComponentNodeRef>,
    pub component_id: Option<u16>,
    pub lod: usize,
    pub object_condition: Option<BoolOpRef>,
    pub surface_condition: Option<BoolOpRef>,
    /// Tags that must be active for this surface to be included.
    pub positive_tags: Vec<String>,
    /// Tags that must be inactive.
    pub negative_tags: Vec<String>,
    /// State names this surface is restricted to, from state variations.
    pub state_positive: Vec<String>,
    pub state_negative: Vec<String>,
    pub final_condition: Option<BoolOpRef>,
    /// Per-state inclusion, parallel to the state list.
    pub state_applicability: Vec<bool>,
}

/// A modifier with its gating information.
pub(crate) struct ModifierEntry {
    pub node: ModifierNodeRef,
    pub object_condition: Option<BoolOpRef>,
    pub positive_tags: Vec<String>,
    pub negative_tags: Vec<String>,
    pub final_condition: Option<BoolOpRef>,
}

/// A variation tag and everything that activates it.
pub(crate) struct TagEntry {
    pub name: String,
    /// Indices into the surface table of surfaces activating this tag.
    pub surfaces: Vec<usize>,
    /// Indices into the modifier table of modifiers activating this tag.
    pub modifiers: Vec<usize>,
    /// Composed "tag is active" expression; `None` until composed, and
    /// also `None` for tags with no activators (never active).
    pub condition: Option<BoolOpRef>,
}

/// Output of the first pass.
pub(crate) struct FirstPass {
    pub objects: Vec<ObjectEntry>,
    pub components: Vec<ComponentEntry>,
    pub surfaces: Vec<SurfaceEntry>,
    pub modifiers: Vec<ModifierEntry>,
    pub tags: Vec<TagEntry>,
    pub states: Vec<StateDesc>,
}

impl Default for FirstPass {
    fn default() -> Self {
        FirstPass {
            objects: Vec::new(),
            components: Vec::new(),
            surfaces: Vec::new(),
            modifiers: Vec::new(),
            tags: Vec::new(),
            states: Vec::new(),
        }
    }
}

impl FirstPass {
    pub(crate) fn tag_index(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|t| t.name == name)
    }
}

/// Tag/state gating accumulated while descending variation branches.
#[derive(Clone, Default)]
struct Gating {
    positive_tags: Vec<String>,
    negative_tags: Vec<String>,
    state_positive: Vec<String>,
    state_negative: Vec<String>,
}

pub(crate) struct Collector<'a> {
    sink: &'a DiagnosticSink,
    params: &'a ParamCaches,
    ignore_states: bool,
    /// Selector ops for exclusive groups, keyed by group node identity.
    group_selectors: FxHashMap<NodeKey, ScalarOpRef>,
    result: FirstPass,
}

/// Run the first pass over a source graph root.
pub(crate) fn collect(
    root: &Node,
    ignore_states: bool,
    sink: &DiagnosticSink,
    params: &ParamCaches,
) -> FirstPass {
    let mut collector = Collector {
        sink,
        params,
        ignore_states,
        group_selectors: FxHashMap::default(),
        result: FirstPass::default(),
    };
    if let Node::Object(object) = root {
        collector.visit_object(object, None);
    }
    collector.finish()
}

impl<'a> Collector<'a> {
    fn finish(mut self) -> FirstPass {
        for tag in &self.result.tags {
            if tag.surfaces.is_empty() && tag.modifiers.is_empty() {
                self.sink.add(
                    format!("tag `{}` is never activated by any surface or modifier", tag.name),
                    Severity::Warning,
                    morph_diagnostic::MessageContext::none(),
                    SpamBin::UnknownTag,
                );
            }
        }

        if self.result.states.is_empty() {
            self.result.states.push(StateDesc::new("Default"));
        }

        for state in &self.result.states {
            if state.runtime_params.len() > MAX_STATE_RUNTIME_PARAMS {
                self.sink.warning(
                    format!(
                        "state `{}` declares {} runtime parameters; updates above {} parameters get expensive",
                        state.name,
                        state.runtime_params.len(),
                        MAX_STATE_RUNTIME_PARAMS
                    ),
                    morph_diagnostic::MessageContext::none(),
                );
            }
        }

        tracing::debug!(
            objects = self.result.objects.len(),
            components = self.result.components.len(),
            surfaces = self.result.surfaces.len(),
            modifiers = self.result.modifiers.len(),
            tags = self.result.tags.len(),
            states = self.result.states.len(),
            "first pass collected"
        );
        self.result
    }

    fn tag_entry(&mut self, name: &str) -> usize {
        if let Some(index) = self.result.tag_index(name) {
            return index;
        }
        self.result.tags.push(TagEntry {
            name: name.to_owned(),
            surfaces: Vec::new(),
            modifiers: Vec::new(),
            condition: None,
        });
        self.result.tags.len() - 1
    }

    fn visit_object(&mut self, node: &ObjectNodeRef, condition: Option<BoolOpRef>) {
        self.result.objects.push(ObjectEntry {
            node: Arc::clone(node),
            condition: condition.clone(),
        });

        match &**node {
            ObjectNode::New(object) => {
                if !self.ignore_states {
                    self.result.states.extend(object.states.iter().cloned());
                }
                for modifier in &object.modifiers {
                    self.add_modifier(modifier, condition.clone(), &Gating::default());
                }
                for component in &object.components {
                    self.visit_component(component, condition.clone(), None, &Gating::default());
                }
                for child in &object.children {
                    self.visit_object(child, condition.clone());
                }
            }
            ObjectNode::Group(group) => self.visit_group(node, group, condition),
        }
    }

    fn visit_group(
        &mut self,
        node: &ObjectNodeRef,
        group: &ObjectGroup,
        condition: Option<BoolOpRef>,
    ) {
        match group.group_type {
            GroupType::AlwaysAll => {
                // A constant-true guard per child; the optimizer folds it
                // away later.
                for child in &group.children {
                    let combined = and_opt(condition.clone(), Some(const_bool(true)));
                    self.visit_object(child, combined);
                }
            }
            GroupType::AlwaysOne | GroupType::OneOrNone => {
                let selector = self.group_selector(node, group);
                for (index, child) in group.children.iter().enumerate() {
                    let value = i32::try_from(index).unwrap_or(i32::MAX);
                    let own = enum_equals(&selector, value);
                    self.visit_object(child, and_opt(condition.clone(), Some(own)));
                }
            }
            GroupType::ToggleEach => {
                for child in &group.children {
                    if matches!(&**child, ObjectNode::Group(_)) {
                        self.sink.error(
                            format!(
                                "toggle group `{}` has a group child; toggles need one object per toggle",
                                group.name
                            ),
                            group.context.clone(),
                        );
                        self.visit_object(child, condition.clone());
                        continue;
                    }
                    let (child_name, child_uid) = object_identity(child);
                    let toggle = params::synthesized_bool_parameter(
                        self.sink,
                        child_name,
                        child_uid,
                        &group.context,
                    );
                    self.visit_object(child, and_opt(condition.clone(), Some(toggle)));
                }
            }
        }
    }

    /// One shared enumeration parameter per exclusive group, with one
    /// possible value per child (plus "None" for one-or-none groups).
    fn group_selector(&mut self, node: &ObjectNodeRef, group: &ObjectGroup) -> ScalarOpRef {
        let key = node_identity(node);
        if let Some(existing) = self.group_selectors.get(&key) {
            return Arc::clone(existing);
        }

        let mut options = Vec::with_capacity(group.children.len() + 1);
        if group.group_type == GroupType::OneOrNone {
            options.push(EnumOption {
                value: -1,
                name: "None".to_owned(),
            });
        }
        let mut default = if group.group_type == GroupType::OneOrNone { -1 } else { 0 };
        for (index, child) in group.children.iter().enumerate() {
            let (name, _) = object_identity(child);
            let value = i32::try_from(index).unwrap_or(i32::MAX);
            if !group.default_value.is_empty() && name == group.default_value {
                default = value;
            }
            options.push(EnumOption {
                value,
                name: name.to_owned(),
            });
        }

        let selector = params::synthesized_enum_parameter(&group.name, default, options);
        self.group_selectors.insert(key, Arc::clone(&selector));
        selector
    }

    fn visit_component(
        &mut self,
        node: &ComponentNodeRef,
        object_condition: Option<BoolOpRef>,
        component_condition: Option<BoolOpRef>,
        gating: &Gating,
    ) {
        match &**node {
            ComponentNode::New(component) => {
                self.result.components.push(ComponentEntry {
                    node: Arc::clone(node),
                    object_condition: object_condition.clone(),
                    component_condition: component_condition.clone(),
                });
                for (lod, lod_node) in component.lods.iter().enumerate() {
                    for surface in &lod_node.surfaces {
                        self.visit_surface(
                            surface,
                            node,
                            component,
                            lod,
                            object_condition.clone(),
                            None,
                            gating.clone(),
                        );
                    }
                }
            }
            ComponentNode::Switch(switch) => {
                let selector = self.selector_op(switch.parameter.as_ref(), &switch.context);
                for (index, option) in switch.options.iter().enumerate() {
                    let Some(option) = option else { continue };
                    let value = i32::try_from(index).unwrap_or(i32::MAX);
                    let own = enum_equals(&selector, value);
                    self.visit_component(
                        option,
                        object_condition.clone(),
                        and_opt(component_condition.clone(), Some(own)),
                        gating,
                    );
                }
            }
            ComponentNode::Variation(variation) => {
                let all_tags: Vec<String> =
                    variation.variations.iter().map(|v| v.tag.clone()).collect();
                if let Some(default) = &variation.default_value {
                    let mut default_gating = gating.clone();
                    default_gating.negative_tags.extend(all_tags.iter().cloned());
                    self.visit_component(
                        default,
                        object_condition.clone(),
                        component_condition.clone(),
                        &default_gating,
                    );
                }
                for (index, branch) in variation.variations.iter().enumerate() {
                    self.tag_entry(&branch.tag);
                    let Some(value) = &branch.value else { continue };
                    let mut branch_gating = gating.clone();
                    branch_gating.positive_tags.push(branch.tag.clone());
                    // First matching tag wins among siblings.
                    branch_gating
                        .negative_tags
                        .extend(all_tags[..index].iter().cloned());
                    self.visit_component(
                        value,
                        object_condition.clone(),
                        component_condition.clone(),
                        &branch_gating,
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_surface(
        &mut self,
        node: &SurfaceNodeRef,
        component_node: &ComponentNodeRef,
        component: &ComponentNew,
        lod: usize,
        object_condition: Option<BoolOpRef>,
        surface_condition: Option<BoolOpRef>,
        gating: Gating,
    ) {
        match &**node {
            SurfaceNode::New(surface) => {
                let index = self.result.surfaces.len();
                for tag in &surface.tags {
                    let entry = self.tag_entry(tag);
                    self.result.tags[entry].surfaces.push(index);
                }
                self.result.surfaces.push(SurfaceEntry {
                    node: Arc::clone(node),
                    component: Some(Arc::clone(component_node)),
                    component_id: Some(component.id),
                    lod,
                    object_condition,
                    surface_condition,
                    positive_tags: gating.positive_tags,
                    negative_tags: gating.negative_tags,
                    state_positive: gating.state_positive,
                    state_negative: gating.state_negative,
                    final_condition: None,
                    state_applicability: Vec::new(),
                });
            }
            SurfaceNode::Switch(switch) => {
                let selector = self.selector_op(switch.parameter.as_ref(), &switch.context);
                for (index, option) in switch.options.iter().enumerate() {
                    let Some(option) = option else { continue };
                    let value = i32::try_from(index).unwrap_or(i32::MAX);
                    let own = enum_equals(&selector, value);
                    self.visit_surface(
                        option,
                        component_node,
                        component,
                        lod,
                        object_condition.clone(),
                        and_opt(surface_condition.clone(), Some(own)),
                        gating.clone(),
                    );
                }
            }
            SurfaceNode::Variation(variation) => self.visit_surface_variation(
                variation,
                component_node,
                component,
                lod,
                object_condition,
                surface_condition,
                gating,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_surface_variation(
        &mut self,
        variation: &SurfaceVariation,
        component_node: &ComponentNodeRef,
        component: &ComponentNew,
        lod: usize,
        object_condition: Option<BoolOpRef>,
        surface_condition: Option<BoolOpRef>,
        gating: Gating,
    ) {
        let all_values: Vec<String> = variation.variations.iter().map(|v| v.value.clone()).collect();

        // Default content is guarded by the complement of every branch.
        let mut default_gating = gating.clone();
        match variation.kind {
            VariationKind::Tag => {
                default_gating.negative_tags.extend(all_values.iter().cloned());
            }
            VariationKind::State => {
                default_gating.state_negative.extend(all_values.iter().cloned());
            }
        }
        for surface in &variation.default_surfaces {
            self.visit_surface(
                surface,
                component_node,
                component,
                lod,
                object_condition.clone(),
                surface_condition.clone(),
                default_gating.clone(),
            );
        }
        for modifier in &variation.default_modifiers {
            self.add_modifier(modifier, object_condition.clone(), &default_gating);
        }

        for (index, branch) in variation.variations.iter().enumerate() {
            let mut branch_gating = gating.clone();
            match variation.kind {
                VariationKind::Tag => {
                    self.tag_entry(&branch.value);
                    branch_gating.positive_tags.push(branch.value.clone());
                    // Accumulate earlier branch tags as negatives: the
                    // first matching branch wins.
                    branch_gating
                        .negative_tags
                        .extend(all_values[..index].iter().cloned());
                }
                VariationKind::State => {
                    branch_gating.state_positive.push(branch.value.clone());
                    branch_gating
                        .state_negative
                        .extend(all_values[..index].iter().cloned());
                }
            }
            for surface in &branch.surfaces {
                self.visit_surface(
                    surface,
                    component_node,
                    component,
                    lod,
                    object_condition.clone(),
                    surface_condition.clone(),
                    branch_gating.clone(),
                );
            }
            for modifier in &branch.modifiers {
                self.add_modifier(modifier, object_condition.clone(), &branch_gating);
            }
        }
    }

    fn add_modifier(
        &mut self,
        node: &ModifierNodeRef,
        object_condition: Option<BoolOpRef>,
        gating: &Gating,
    ) {
        let index = self.result.modifiers.len();
        for tag in &node.gating.enable_tags {
            let entry = self.tag_entry(tag);
            self.result.tags[entry].modifiers.push(index);
        }
        for tag in node.gating.required_tags.iter().chain(&node.gating.excluded_tags) {
            self.tag_entry(tag);
        }

        let mut positive = node.gating.required_tags.clone();
        positive.extend(gating.positive_tags.iter().cloned());
        let mut negative = node.gating.excluded_tags.clone();
        negative.extend(gating.negative_tags.iter().cloned());

        self.result.modifiers.push(ModifierEntry {
            node: Arc::clone(node),
            object_condition,
            positive_tags: positive,
            negative_tags: negative,
            final_condition: None,
        });
    }

    /// Build the selector op for a switch parameter.
    ///
    /// The first pass lowers only declaration-shaped selectors (plain or
    /// enumeration parameters and constants); anything fancier gets a
    /// diagnostic and a constant selector so the walk can continue.
    fn selector_op(
        &mut self,
        parameter: Option<&ScalarNodeRef>,
        context: &morph_diagnostic::MessageContext,
    ) -> ScalarOpRef {
        let Some(parameter) = parameter else {
            self.sink.add(
                "required switch selector connection is missing",
                Severity::Error,
                context.clone(),
                SpamBin::MissingConnection,
            );
            return Arc::new(ScalarOp::Constant(Real::ZERO));
        };
        let key = node_identity(parameter);
        match &**parameter {
            ScalarNode::EnumParameter(decl) => {
                params::enum_parameter_op(self.params, self.sink, key, decl, Vec::new())
            }
            ScalarNode::Parameter(decl) => {
                params::scalar_parameter_op(self.params, self.sink, key, decl, Vec::new())
            }
            ScalarNode::Constant { value } => Arc::new(ScalarOp::Constant(Real(*value))),
            _ => {
                self.sink.error(
                    "switch selectors must be parameters or constants at the structural level",
                    context.clone(),
                );
                Arc::new(ScalarOp::Constant(Real::ZERO))
            }
        }
    }
}

/// Name and uid of an object node, for group parameter synthesis.
fn object_identity(node: &ObjectNodeRef) -> (&str, &str) {
    match &**node {
        ObjectNode::New(o) => (&o.name, &o.uid),
        ObjectNode::Group(g) => (&g.name, &g.uid),
    }
}
