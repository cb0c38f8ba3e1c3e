//! Mesh-domain generation.
//!
//! The concurrency-bearing core of the compiler. Every mesh request runs
//! as a task whose dynamic options may depend on a sibling subtree's
//! completed result: a morph target reuses its base's generated layouts,
//! and switch/variation branches agree on the first content-producing
//! branch's layouts, because only one physical layout can back a given
//! surface. Constant meshes are deduplicated through a coarse
//! (vertex count, index count) bucket plus a structural similarity scan,
//! and receive globally unique id prefixes that make their layout-block
//! ids absolute.

use std::sync::Arc;

use morph_diagnostic::MessageContext;
use morph_graph::{
    node_identity, CellValue, ColumnType, LayoutNodeRef, MeshNode, MeshNodeRef, ModifierKind,
    ModifierStage, SwitchNode, TableNode, VariationNode,
};
use morph_ir::{
    ClipMorphShape, Conditional, Layout, LayoutBlock, Mesh, MeshLayoutFlags, MeshOp, MeshOpRef,
    Real, ReshapeFlags, Switch, SwitchCase,
};
use morph_task::Task;

use crate::first_pass::ModifierEntry;
use crate::options::{MeshDynamicOptions, MeshStaticOptions, NodeKey};
use crate::scalar::case_value;
use crate::CodeGenerator;

/// Result of one mesh generation request.
#[derive(Clone, Debug, Default)]
pub struct MeshResult {
    /// The finished op, layouts applied.
    pub op: Option<MeshOpRef>,
    /// The op before layout assignment and modifiers, kept so morph
    /// targets and shared surfaces can re-derive from it.
    pub base_op: Option<MeshOpRef>,
    /// Layouts this subtree generated (or adopted from an override).
    pub layouts: Vec<Arc<Layout>>,
}

pub(crate) type MeshTask = Task<MeshResult>;

/// Cache key for generated meshes: node identity plus both option sets.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) struct MeshCacheKey {
    pub node: NodeKey,
    pub statics: MeshStaticOptions,
    pub dynamics: MeshDynamicOptions,
}

/// One deduplicated constant mesh.
pub(crate) struct ConstantMeshEntry {
    pub mesh: Arc<Mesh>,
    pub id_prefix: u32,
    pub op: MeshOpRef,
    pub layouts: Vec<Arc<Layout>>,
}

impl CodeGenerator {
    /// Lower a mesh node as a task.
    ///
    /// `dynamics` is itself a task because the options may be derived
    /// from a sibling's completed result; the cache is consulted only
    /// once they are known.
    pub(crate) fn generate_mesh(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        dynamics: Task<MeshDynamicOptions>,
        node: Option<&MeshNodeRef>,
    ) -> MeshTask {
        let Some(node) = node else {
            return Task::completed(MeshResult::default());
        };
        if self.options.disable_resource_generation {
            return Task::completed(MeshResult::default());
        }

        let this = Arc::clone(self);
        let node = Arc::clone(node);
        let statics = statics.clone();
        let dynamics_handle = dynamics.clone();
        self.pool
            .launch("MeshGenerate", &[dynamics.as_dependency()], move || {
                let dynamics = dynamics_handle.result();
                let key = MeshCacheKey {
                    node: node_identity(&node),
                    statics: statics.clone(),
                    dynamics: dynamics.clone(),
                };
                if let Some(hit) = this.caches.meshes.get(&key) {
                    return hit;
                }
                let result = this.mesh_dispatch(&statics, &dynamics, &node);
                this.caches.meshes.insert_shared(key, result)
            })
    }

    fn mesh_dispatch(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        dynamics: &MeshDynamicOptions,
        node: &MeshNodeRef,
    ) -> MeshResult {
        match &**node {
            MeshNode::Constant { mesh, layouts, .. } => {
                self.mesh_constant(dynamics, mesh, layouts)
            }
            MeshNode::Reference { id, morph, context } => {
                self.mesh_reference(dynamics, *id, morph.as_deref(), context)
            }
            MeshNode::Morph {
                factor,
                base,
                target,
                context,
            } => self.mesh_morph(statics, dynamics, factor.as_ref(), base.as_ref(), target.as_ref(), context),
            MeshNode::Switch(switch) => self.mesh_switch(statics, dynamics, switch),
            MeshNode::Variation(variation) => self.mesh_variation(statics, dynamics, variation),
            MeshNode::Table(table) => self.mesh_table(statics, dynamics, table),
        }
    }

    /// Lower a constant mesh: dedup, unique id prefix, layout ops.
    fn mesh_constant(
        &self,
        dynamics: &MeshDynamicOptions,
        mesh: &Arc<Mesh>,
        layout_nodes: &[LayoutNodeRef],
    ) -> MeshResult {
        let (op, layouts) = self.constant_mesh_op(mesh, layout_nodes);
        self.layout_ops_and_result(dynamics, op, layouts)
    }

    /// The shared constant op for a mesh payload.
    ///
    /// Buckets by (vertex count, index count), then scans the bucket for
    /// a structurally similar prior mesh; on a match the earlier op and
    /// its id prefix are reused so identical meshes stay physically
    /// shared across the whole program.
    fn constant_mesh_op(
        &self,
        mesh: &Arc<Mesh>,
        layout_nodes: &[LayoutNodeRef],
    ) -> (MeshOpRef, Vec<Arc<Layout>>) {
        let bucket = (mesh.vertex_count, mesh.index_count);
        {
            let table = self.caches.mesh_constants.lock();
            if let Some(entries) = table.get(&bucket) {
                for entry in entries {
                    if entry.mesh.is_similar(mesh) {
                        tracing::debug!(prefix = entry.id_prefix, "constant mesh dedup hit");
                        return (Arc::clone(&entry.op), entry.layouts.clone());
                    }
                }
            }
        }

        // Miss: allocate a prefix and build. Two racing callers may both
        // get here; both results are valid and the duplicate is only
        // wasted work.
        let id_prefix = self
            .caches
            .unique_ids
            .ensure_unique(mesh.content_hash() as u32);
        let layouts: Vec<Arc<Layout>> = layout_nodes
            .iter()
            .map(|layout| self.generate_layout(layout, id_prefix))
            .collect();
        let op = Arc::new(MeshOp::Constant {
            mesh: Arc::clone(mesh),
            id_prefix,
            layouts: layouts.clone(),
        });

        let mut table = self.caches.mesh_constants.lock();
        table.entry(bucket).or_default().push(ConstantMeshEntry {
            mesh: Arc::clone(mesh),
            id_prefix,
            op: Arc::clone(&op),
            layouts: layouts.clone(),
        });
        (op, layouts)
    }

    /// Instantiate a source layout with absolute block ids for one mesh
    /// id prefix. Memoized per (layout node, prefix).
    pub(crate) fn generate_layout(&self, node: &LayoutNodeRef, id_prefix: u32) -> Arc<Layout> {
        let key = (node_identity(node), id_prefix);
        if let Some(hit) = self.caches.layouts.get(&key) {
            return hit;
        }
        let blocks = node
            .blocks
            .iter()
            .enumerate()
            .map(|(index, block)| LayoutBlock {
                min: block.min,
                size: block.size,
                priority: block.priority,
                reduce_both_axes: block.reduce_both_axes,
                reduce_by_two: block.reduce_by_two,
                id: Layout::block_id(id_prefix, index),
            })
            .collect();
        let layout = Arc::new(Layout {
            grid: node.grid,
            max_grid: node.max_grid,
            strategy: node.strategy,
            reduction: node.reduction,
            blocks,
        });
        self.caches.layouts.insert_shared(key, layout)
    }

    /// Chain prepare-layout ops onto a generated mesh according to the
    /// dynamic options; pass-through when layouts are disabled.
    fn layout_ops_and_result(
        &self,
        dynamics: &MeshDynamicOptions,
        base: MeshOpRef,
        generated: Vec<Arc<Layout>>,
    ) -> MeshResult {
        if !dynamics.layouts {
            return MeshResult {
                op: Some(Arc::clone(&base)),
                base_op: Some(base),
                layouts: Vec::new(),
            };
        }

        // Block ids are always absolute: relative ids would tie constant
        // meshes to one context, and overridden layouts must agree with
        // the parent context's numbering anyway.
        let mut flags = MeshLayoutFlags::ABSOLUTE_BLOCK_IDS;
        if dynamics.normalize_uvs {
            flags |= MeshLayoutFlags::NORMALIZE_UVS;
        }
        if dynamics.clamp_uv_islands {
            flags |= MeshLayoutFlags::CLAMP_UV_ISLANDS;
        }
        if dynamics.ensure_all_vertices_have_block {
            flags |= MeshLayoutFlags::ENSURE_ALL_VERTICES_HAVE_BLOCK;
        }

        let chosen: &[Arc<Layout>] = if dynamics.override_layouts.is_empty() {
            &generated
        } else {
            &dynamics.override_layouts
        };

        let mut op = Arc::clone(&base);
        for (channel, layout) in chosen.iter().enumerate() {
            op = Arc::new(MeshOp::PrepareLayout {
                mesh: op,
                layout: Arc::clone(layout),
                channel: u8::try_from(channel).unwrap_or(u8::MAX),
                flags,
            });
        }

        MeshResult {
            op: Some(op),
            base_op: Some(base),
            layouts: chosen.to_vec(),
        }
    }

    fn mesh_reference(
        &self,
        dynamics: &MeshDynamicOptions,
        id: u32,
        morph: Option<&str>,
        context: &MessageContext,
    ) -> MeshResult {
        if let Some(provider) = &self.options.resource_provider {
            return match provider.mesh(id, morph) {
                Some(mesh) => self.mesh_constant(dynamics, &Arc::new(mesh), &[]),
                None => {
                    self.sink.error(
                        format!("referenced mesh {id} could not be resolved"),
                        context.clone(),
                    );
                    MeshResult::default()
                }
            };
        }
        let op = Arc::new(MeshOp::Reference {
            id,
            morph: morph.map(str::to_owned),
        });
        self.layout_ops_and_result(dynamics, op, Vec::new())
    }

    /// A morph chains three tasks: the base mesh, a target whose dynamic
    /// options are derived from the base's completed result (so both
    /// agree on layouts), and the composition over both.
    #[allow(clippy::too_many_arguments)]
    fn mesh_morph(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        dynamics: &MeshDynamicOptions,
        factor: Option<&morph_graph::ScalarNodeRef>,
        base: Option<&MeshNodeRef>,
        target: Option<&MeshNodeRef>,
        context: &MessageContext,
    ) -> MeshResult {
        if base.is_none() {
            self.sink.error("morph base mesh is not set", context.clone());
            return MeshResult::default();
        }

        let base_task = self.generate_mesh(statics, Task::completed(dynamics.clone()), base);

        let base_handle = base_task.clone();
        let derived = dynamics.clone();
        let target_dynamics = self.pool.launch(
            "MeshMorphTargetOptions",
            &[base_task.as_dependency()],
            move || {
                let base_result = base_handle.result();
                MeshDynamicOptions {
                    override_layouts: base_result.layouts.clone(),
                    ..derived
                }
            },
        );
        let target_task = self.generate_mesh(statics, target_dynamics, target);

        let factor_op = match factor {
            Some(node) => self.generate_scalar(&statics.generic(), Some(node)),
            None => self.missing_scalar("morph factor", 1.0, context),
        };

        let base_result = base_task.result();
        let target_result = target_task.result();
        let op = Arc::new(MeshOp::Morph {
            base: base_result.op.clone(),
            target: target_result.op,
            factor: factor_op,
        });
        MeshResult {
            op: Some(op),
            base_op: base_result.base_op,
            layouts: base_result.layouts,
        }
    }

    /// Branches are generated sequentially: the first one that produces
    /// content donates its layouts to every later branch through the
    /// threaded dynamic options.
    fn mesh_switch(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        dynamics: &MeshDynamicOptions,
        switch: &SwitchNode<MeshNode>,
    ) -> MeshResult {
        if switch.options.is_empty() {
            self.sink
                .error("mesh switch declares no options", switch.context.clone());
            return MeshResult::default();
        }
        let selector = match &switch.parameter {
            Some(parameter) => self.generate_scalar(&statics.generic(), Some(parameter)),
            None => self.missing_scalar("switch selector", 0.0, &switch.context),
        };

        let mut threaded = dynamics.clone();
        let mut base_op = None;
        let mut cases = Vec::with_capacity(switch.options.len());
        for (index, option) in switch.options.iter().enumerate() {
            // Absent mesh branches are legal: the arm stays empty.
            let result = match option {
                Some(child) => self
                    .generate_mesh(statics, Task::completed(threaded.clone()), Some(child))
                    .result(),
                None => MeshResult::default(),
            };
            if result.op.is_some() {
                if threaded.override_layouts.is_empty() && !result.layouts.is_empty() {
                    threaded.override_layouts = result.layouts.clone();
                }
                if base_op.is_none() {
                    base_op = result.base_op.clone();
                }
            }
            cases.push(SwitchCase::new(case_value(index), result.op));
        }

        MeshResult {
            op: Some(Arc::new(MeshOp::Switch(Switch {
                selector,
                cases,
                default: None,
            }))),
            base_op,
            layouts: threaded.override_layouts,
        }
    }

    fn mesh_variation(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        dynamics: &MeshDynamicOptions,
        variation: &VariationNode<MeshNode>,
    ) -> MeshResult {
        let mut threaded = dynamics.clone();

        let default_result = match &variation.default_value {
            Some(child) => {
                let result = self
                    .generate_mesh(statics, Task::completed(threaded.clone()), Some(child))
                    .result();
                if threaded.override_layouts.is_empty() && !result.layouts.is_empty() {
                    threaded.override_layouts = result.layouts.clone();
                }
                result
            }
            None => MeshResult::default(),
        };

        // Branches generate in declaration order (layout donation runs
        // forward) and each wraps the running result, so the last
        // declared branch sits outermost and wins when several tags are
        // active at once.
        let mut op = default_result.op.clone();
        let mut base_op = default_result.base_op;
        for branch in &variation.variations {
            let Some(condition) = self.tag_condition(&branch.tag, &variation.context) else {
                continue;
            };
            let result = match &branch.value {
                Some(child) => {
                    let result = self
                        .generate_mesh(statics, Task::completed(threaded.clone()), Some(child))
                        .result();
                    if threaded.override_layouts.is_empty() && !result.layouts.is_empty() {
                        threaded.override_layouts = result.layouts.clone();
                    }
                    result
                }
                None => MeshResult::default(),
            };
            if base_op.is_none() {
                base_op = result.base_op.clone();
            }
            op = Some(Arc::new(MeshOp::Conditional(Conditional {
                condition,
                yes: result.op,
                no: op,
            })));
        }

        MeshResult {
            op,
            base_op,
            layouts: threaded.override_layouts,
        }
    }

    /// Mesh tables keep one branch per row even for absent cells: a row
    /// without a mesh is a legitimate "nothing here" choice.
    fn mesh_table(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        dynamics: &MeshDynamicOptions,
        table: &TableNode,
    ) -> MeshResult {
        let mut threaded = dynamics.clone();
        let mut base_op: Option<MeshOpRef> = None;

        let expanded = self.expand_table(
            &statics.generic(),
            table,
            ColumnType::Mesh,
            true,
            |cell, _| match cell {
                CellValue::Mesh(Some(mesh)) => {
                    let result = self.mesh_constant(&threaded, mesh, &[]);
                    if threaded.override_layouts.is_empty() && !result.layouts.is_empty() {
                        threaded.override_layouts = result.layouts.clone();
                    }
                    if base_op.is_none() {
                        base_op = result.base_op.clone();
                    }
                    result.op
                }
                CellValue::Mesh(None) => None,
                _ => unreachable!("column type was validated by the expander"),
            },
        );

        match expanded {
            Some(switch) => MeshResult {
                op: Some(Arc::new(MeshOp::Switch(switch))),
                base_op,
                layouts: threaded.override_layouts,
            },
            None => MeshResult::default(),
        }
    }

    /// Modifiers whose tag and component gates are satisfied for this
    /// request, in declaration order.
    pub(crate) fn modifiers_for(
        &self,
        component_id: Option<u16>,
        active_tags: &[String],
        stage: ModifierStage,
    ) -> Vec<&ModifierEntry> {
        self.first_pass
            .modifiers
            .iter()
            .filter(|entry| {
                if entry.node.gating.stage != stage {
                    return false;
                }
                if let (Some(filter), Some(component)) =
                    (entry.node.gating.component_filter, component_id)
                {
                    if filter != component {
                        return false;
                    }
                }
                let satisfied = entry
                    .positive_tags
                    .iter()
                    .all(|tag| active_tags.iter().any(|active| active == tag));
                let blocked = entry
                    .negative_tags
                    .iter()
                    .any(|tag| active_tags.iter().any(|active| active == tag));
                satisfied && !blocked
            })
            .collect()
    }

    /// Splice matching modifiers into a generated mesh chain, pre stage
    /// first, each guarded by its composed condition.
    pub(crate) fn apply_mesh_modifiers(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        source: MeshResult,
    ) -> MeshResult {
        let Some(mut current) = source.op.clone() else {
            return source;
        };

        for stage in [ModifierStage::Pre, ModifierStage::Post] {
            let entries = self.modifiers_for(statics.component_id, &statics.active_tags, stage);
            for entry in entries {
                let Some(edited) = self.apply_one_modifier(statics, &current, entry) else {
                    continue;
                };
                current = match &entry.final_condition {
                    Some(condition) => Arc::new(MeshOp::Conditional(Conditional {
                        condition: Arc::clone(condition),
                        yes: Some(edited),
                        no: Some(current),
                    })),
                    None => edited,
                };
            }
        }

        MeshResult {
            op: Some(current),
            base_op: source.base_op,
            layouts: source.layouts,
        }
    }

    /// One modifier's mesh op, or `None` for modifiers that edit images
    /// rather than geometry.
    fn apply_one_modifier(
        self: &Arc<Self>,
        statics: &MeshStaticOptions,
        source: &MeshOpRef,
        entry: &ModifierEntry,
    ) -> Option<MeshOpRef> {
        // Helper meshes never carry layouts of their own.
        let helper = |node: Option<&MeshNodeRef>| {
            self.generate_mesh(statics, Task::completed(MeshDynamicOptions::default()), node)
                .result()
                .op
        };

        match &entry.node.kind {
            ModifierKind::ClipMorphPlane {
                center,
                normal,
                distance,
                factor,
                radius,
            } => Some(Arc::new(MeshOp::ClipMorphPlane {
                source: Arc::clone(source),
                shape: ClipMorphShape {
                    center: reals(*center),
                    normal: reals(*normal),
                    distance: Real(*distance),
                    factor: Real(*factor),
                    radius: Real(*radius),
                },
            })),
            ModifierKind::ClipWithMesh { clip } => Some(Arc::new(MeshOp::ClipWithMesh {
                source: Arc::clone(source),
                clip: helper(clip.as_ref()),
            })),
            ModifierKind::ClipDeform { shape } => Some(Arc::new(MeshOp::ClipDeform {
                source: Arc::clone(source),
                shape: helper(shape.as_ref()),
            })),
            ModifierKind::ApplyPose { pose } => Some(Arc::new(MeshOp::ApplyPose {
                source: Arc::clone(source),
                pose: helper(pose.as_ref()),
            })),
            ModifierKind::Reshape {
                shape,
                reshape_skeleton,
                reshape_physics,
            } => {
                let mut flags = ReshapeFlags::empty();
                if *reshape_skeleton {
                    flags |= ReshapeFlags::SKELETON;
                }
                if *reshape_physics {
                    flags |= ReshapeFlags::PHYSICS;
                }
                Some(Arc::new(MeshOp::ApplyShape {
                    source: Arc::clone(source),
                    shape: helper(shape.as_ref()),
                    flags,
                }))
            }
            ModifierKind::SurfaceEdit(_) => None,
        }
    }
}

fn reals(v: [f32; 3]) -> [Real; 3] {
    [Real(v[0]), Real(v[1]), Real(v[2])]
}
