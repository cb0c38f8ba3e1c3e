//! Component and LOD orchestration.
//!
//! LODs generate in increasing order, each LOD task listing the previous
//! one as a prerequisite so inter-LOD data dependencies (shared surface
//! layouts) are expressible without global locks. The component task
//! joins the LOD tasks into an AddLod/AddComponent chain and wraps it in
//! the conditions collected by the first pass. The entry point is also
//! the compiler's top-level rendezvous: while the component task runs,
//! the caller-supplied wait callback is pumped so cooperative host
//! schedulers cannot deadlock.

use std::sync::Arc;

use morph_graph::{node_identity, ComponentNew, ComponentNode, ComponentNodeRef};
use morph_ir::{Conditional, InstanceOp, InstanceOpRef, Switch, SwitchCase};
use morph_task::{Task, TaskDependency};
use smallvec::SmallVec;

use crate::conditions::and_opt;
use crate::options::NodeKey;
use crate::scalar::case_value;
use crate::surface::fold_surfaces_into_lod;
use crate::CodeGenerator;

/// Options identifying one component generation request.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub(crate) struct ComponentOptions {
    pub state: Option<usize>,
    /// The instance chain built so far; this component appends to it.
    pub base_instance: Option<InstanceOpRef>,
}

pub(crate) type ComponentCacheKey = (NodeKey, ComponentOptions);

impl CodeGenerator {
    pub(crate) fn generate_component(
        self: &Arc<Self>,
        options: &ComponentOptions,
        node: Option<&ComponentNodeRef>,
    ) -> Option<InstanceOpRef> {
        let Some(node) = node else {
            return options.base_instance.clone();
        };
        let key = (node_identity(node), options.clone());
        if let Some(hit) = self.caches.components.get(&key) {
            return hit;
        }
        let result = match &**node {
            ComponentNode::New(component) => self.component_new(options, node, component),
            ComponentNode::Switch(switch) => {
                self.component_switch(options, switch)
            }
            ComponentNode::Variation(variation) => self.component_variation(options, variation),
        };
        self.caches.components.insert_shared(key, result)
    }

    fn component_new(
        self: &Arc<Self>,
        options: &ComponentOptions,
        node: &ComponentNodeRef,
        component: &ComponentNew,
    ) -> Option<InstanceOpRef> {
        // Launch one task per LOD, chained so each sees its predecessor.
        let mut lod_tasks: Vec<Task<Option<InstanceOpRef>>> =
            Vec::with_capacity(component.lods.len());
        let mut previous: Option<TaskDependency> = None;
        for lod in 0..component.lods.len() {
            let task = self.generate_lod(options.state, node, lod, previous.clone());
            previous = Some(task.as_dependency());
            lod_tasks.push(task);
        }

        let dependencies: SmallVec<[TaskDependency; 8]> =
            lod_tasks.iter().map(Task::as_dependency).collect();

        let this = Arc::clone(self);
        let node = Arc::clone(node);
        let base_instance = options.base_instance.clone();
        let component_id = component.id;
        let component_task = self.pool.launch("ComponentNew", &dependencies, move || {
            let lods: Vec<Option<InstanceOpRef>> =
                lod_tasks.iter().map(Task::result).collect();
            let lods_op = Arc::new(InstanceOp::AddLod { lods });

            let mut op = Arc::new(InstanceOp::AddComponent {
                instance: base_instance.clone(),
                component: Some(lods_op),
                id: component_id,
            });

            // Wrap in the reachability conditions the first pass found
            // for this component.
            for entry in &this.first_pass.components {
                if !Arc::ptr_eq(&entry.node, &node) {
                    continue;
                }
                let condition = and_opt(
                    entry.object_condition.clone(),
                    entry.component_condition.clone(),
                );
                if let Some(condition) = condition {
                    op = Arc::new(InstanceOp::Conditional(Conditional {
                        condition,
                        yes: Some(op),
                        no: base_instance.clone(),
                    }));
                }
            }

            Some(op)
        });

        // Top-level rendezvous: task generation stops at the component
        // boundary, so this is where the host's wait callback pumps.
        match self.options.wait_callback.clone() {
            Some(callback) => component_task.pump_until_complete(&mut || callback()),
            None => component_task.result(),
        }
    }

    fn generate_lod(
        self: &Arc<Self>,
        state: Option<usize>,
        component_node: &ComponentNodeRef,
        lod: usize,
        previous_lod: Option<TaskDependency>,
    ) -> Task<Option<InstanceOpRef>> {
        // The first pass flattened surface switches and variations into
        // per-surface entries; pick the ones belonging to this LOD.
        let entry_indices: SmallVec<[usize; 8]> = self
            .first_pass
            .surfaces
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.lod == lod
                    && entry
                        .component
                        .as_ref()
                        .is_some_and(|owner| Arc::ptr_eq(owner, component_node))
            })
            .map(|(index, _)| index)
            .collect();

        let surface_tasks: Vec<crate::surface::SurfaceTask> = entry_indices
            .iter()
            .map(|&index| self.generate_surface(state, index, previous_lod.clone()))
            .collect();

        let dependencies: SmallVec<[TaskDependency; 8]> =
            surface_tasks.iter().map(Task::as_dependency).collect();

        self.pool.launch("ComponentLod", &dependencies, move || {
            let results: Vec<_> = surface_tasks.iter().map(Task::result).collect();
            fold_surfaces_into_lod(&results)
        })
    }

    fn component_switch(
        self: &Arc<Self>,
        options: &ComponentOptions,
        switch: &morph_graph::SwitchNode<ComponentNode>,
    ) -> Option<InstanceOpRef> {
        if switch.options.is_empty() {
            // No options: the switch adds nothing to the instance.
            return options.base_instance.clone();
        }
        let generic = crate::options::GenerationOptions {
            state: options.state,
            active_tags: Vec::new(),
            is_image: false,
        };
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(&generic, Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            // An absent branch keeps the base instance unchanged.
            let branch = match option {
                Some(child) => self.generate_component(options, Some(child)),
                None => options.base_instance.clone(),
            };
            cases.push(SwitchCase::new(case_value(index), branch));
        }
        Some(Arc::new(InstanceOp::Switch(Switch {
            selector,
            cases,
            default: options.base_instance.clone(),
        })))
    }

    fn component_variation(
        self: &Arc<Self>,
        options: &ComponentOptions,
        variation: &morph_graph::VariationNode<ComponentNode>,
    ) -> Option<InstanceOpRef> {
        let mut current = match &variation.default_value {
            Some(child) => self.generate_component(options, Some(child)),
            None => options.base_instance.clone(),
        };
        // Declaration-order fold: the last declared branch wraps
        // outermost and wins when several tags are active.
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let content = match &branch.value {
                Some(child) => self.generate_component(options, Some(child)),
                None => options.base_instance.clone(),
            };
            current = Some(Arc::new(InstanceOp::Conditional(Conditional {
                condition,
                yes: content,
                no: current,
            })));
        }
        current
    }
}
