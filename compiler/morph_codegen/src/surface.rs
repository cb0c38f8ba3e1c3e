//! Surface generation: one task per surface producing its mesh and
//! named material channels.
//!
//! Surfaces that share a surface id across LODs reuse one generated
//! layout and material set: the first LOD to generate becomes the base
//! and registers its mesh result in the shared map; later LODs pick it
//! up through their dynamic-options task (which lists the previous LOD
//! as a prerequisite), override their layouts with the base's and clamp
//! UV islands so small vertex displacements cannot change block
//! assignment.

use std::sync::Arc;

use morph_graph::{ModifierKind, ModifierStage, SurfaceNew, SurfaceNode};
use morph_ir::{ImageFormat, ImageOp, InstanceOp, NamedOp, ScalarOp, StringOp};
use morph_task::{Task, TaskDependency};

use crate::mesh::MeshResult;
use crate::options::{ImageOptions, MeshDynamicOptions, MeshStaticOptions};
use crate::CodeGenerator;

/// The data one surface contributes to its component LOD.
#[derive(Clone, Debug)]
pub(crate) struct SurfaceResult {
    pub surface_id: u32,
    pub name: String,
    pub mesh: Option<morph_ir::MeshOpRef>,
    pub images: Vec<NamedOp<ImageOp>>,
    pub vectors: Vec<NamedOp<morph_ir::ColorOp>>,
    pub scalars: Vec<NamedOp<ScalarOp>>,
    pub strings: Vec<NamedOp<StringOp>>,
    pub condition: Option<morph_ir::BoolOpRef>,
}

pub(crate) type SurfaceTask = Task<Option<SurfaceResult>>;

impl CodeGenerator {
    /// Generate one first-pass surface entry, or return the cached task
    /// when an earlier state already generated it.
    pub(crate) fn generate_surface(
        self: &Arc<Self>,
        state: Option<usize>,
        entry_index: usize,
        previous_lod: Option<TaskDependency>,
    ) -> SurfaceTask {
        let entry = &self.first_pass.surfaces[entry_index];

        // State variations restrict which states include this surface.
        if let Some(state) = state {
            if !entry.state_applicability.get(state).copied().unwrap_or(true) {
                return Task::completed(None);
            }
        }

        if let Some(existing) = self.caches.surface_results.get(&entry_index) {
            return existing;
        }

        let surface = match &*entry.node {
            SurfaceNode::New(surface) => surface.clone(),
            // The first pass flattens switches and variations before
            // recording entries.
            _ => unreachable!("first pass recorded a non-concrete surface"),
        };

        let statics = MeshStaticOptions {
            component_id: entry.component_id,
            lod: entry.lod,
            state,
            active_tags: surface.tags.clone(),
        };

        // Dynamic options depend on the shared-surface map, which the
        // previous LOD may still be filling; hence the prerequisite.
        let shared_id = surface.shared_surface_id;
        let this = Arc::clone(self);
        let prereqs: Vec<TaskDependency> = previous_lod.into_iter().collect();
        let options_task = self.pool.launch("SurfaceMeshOptions", &prereqs, move || {
            let mut dynamics = MeshDynamicOptions::with_layouts();
            if let Some(id) = shared_id {
                if let Some(base) = this.caches.shared_meshes.lock().get(&id) {
                    dynamics.override_layouts = base.layouts.clone();
                    dynamics.clamp_uv_islands = true;
                }
            }
            dynamics
        });

        let mesh_task = self.generate_mesh(&statics, options_task, surface.mesh.as_ref());

        // Modifier application plus shared-surface registration run as
        // their own task so the surface task below only joins once.
        let this = Arc::clone(self);
        let mesh_handle = mesh_task.clone();
        let statics_for_modifiers = statics.clone();
        let modified_task: Task<(MeshResult, bool)> = self.pool.launch(
            "SurfaceMeshModifiers",
            &[mesh_task.as_dependency()],
            move || {
                let result = mesh_handle.result();
                let result = this.apply_mesh_modifiers(&statics_for_modifiers, result);
                let mut shares_base = false;
                if let Some(id) = shared_id {
                    let mut shared = this.caches.shared_meshes.lock();
                    if shared.contains_key(&id) {
                        shares_base = true;
                    } else {
                        shared.insert(id, result.clone());
                    }
                }
                (result, shares_base)
            },
        );

        let this = Arc::clone(self);
        let modified_handle = modified_task.clone();
        let condition = entry.final_condition.clone();
        let task = self.pool.launch(
            "Surface",
            &[modified_task.as_dependency()],
            move || {
                let (mesh_result, shares_base) = modified_handle.result();
                Some(this.build_surface_result(
                    state,
                    &statics,
                    &surface,
                    mesh_result,
                    shares_base,
                    condition,
                ))
            },
        );

        self.caches.surface_results.insert_shared(entry_index, task)
    }

    fn build_surface_result(
        self: &Arc<Self>,
        state: Option<usize>,
        statics: &MeshStaticOptions,
        surface: &SurfaceNew,
        mesh_result: MeshResult,
        shares_base: bool,
        condition: Option<morph_ir::BoolOpRef>,
    ) -> SurfaceResult {
        let mut result = SurfaceResult {
            surface_id: surface.surface_id,
            name: surface.name.clone(),
            mesh: mesh_result.op.clone(),
            images: Vec::new(),
            vectors: Vec::new(),
            scalars: Vec::new(),
            strings: Vec::new(),
            condition,
        };

        // A surface reusing a shared base keeps only its mesh; material
        // data comes from the base surface at link time.
        if shares_base {
            return result;
        }

        let rect = [
            self.options.target_texture_size,
            self.options.target_texture_size,
        ];
        let image_options = ImageOptions {
            state,
            active_tags: statics.active_tags.clone(),
            component_id: statics.component_id,
            lod: statics.lod,
            rect_size: rect,
            layout_block_id: None,
        };

        for channel in &surface.images {
            let op = match &channel.node {
                Some(node) => self.generate_image(&image_options, Some(node)),
                None => self.missing_image(
                    &format!("surface image `{}`", channel.name),
                    ImageFormat::Rgb8,
                    &surface.context,
                    &image_options,
                ),
            };
            let op = self.apply_surface_patches(op, &channel.name, &mesh_result, &image_options);
            let op = self.apply_tiling(op, rect, ImageFormat::Rgba8);
            result.images.push(NamedOp::new(&channel.name, op));
        }

        let generic = image_options.generic();
        for channel in &surface.vectors {
            let op = self.generate_color(&generic, channel.node.as_ref());
            result.vectors.push(NamedOp::new(&channel.name, op));
        }
        for channel in &surface.scalars {
            let op = self.generate_scalar(&generic, channel.node.as_ref());
            result.scalars.push(NamedOp::new(&channel.name, op));
        }
        for channel in &surface.strings {
            let op = self.generate_string(&generic, channel.node.as_ref());
            result.strings.push(NamedOp::new(&channel.name, op));
        }

        result
    }

    /// Splice surface-edit texture patches into a generated channel,
    /// masked per layout block.
    fn apply_surface_patches(
        self: &Arc<Self>,
        mut op: morph_ir::ImageOpRef,
        channel_name: &str,
        mesh_result: &MeshResult,
        options: &ImageOptions,
    ) -> morph_ir::ImageOpRef {
        let Some(layout) = mesh_result.layouts.first() else {
            return op;
        };
        if layout.grid == [0, 0] {
            return op;
        }
        let block_pixels = [
            (options.rect_size[0] / layout.grid[0].max(1)).max(1),
            (options.rect_size[1] / layout.grid[1].max(1)).max(1),
        ];

        for stage in [ModifierStage::Pre, ModifierStage::Post] {
            let entries = self.modifiers_for(options.component_id, &options.active_tags, stage);
            for entry in entries {
                let ModifierKind::SurfaceEdit(edit) = &entry.node.kind else {
                    continue;
                };
                for patch in &edit.textures {
                    if patch.name != channel_name {
                        continue;
                    }
                    for block in &layout.blocks {
                        let mask = crate::image::block_patch_mask(
                            &patch.blocks,
                            layout.grid,
                            block_pixels,
                            (block.min, block.size),
                        );
                        let Some(mask) = mask else { continue };
                        let mut block_options = options.clone();
                        block_options.layout_block_id = Some(block.id);
                        op = self.image_block_patch(
                            op,
                            patch,
                            Arc::new(mask),
                            entry.final_condition.as_ref(),
                            &entry.node.context,
                            &block_options,
                        );
                    }
                }
            }
        }
        op
    }
}

/// Fold surface results into the instance chain of one component LOD.
pub(crate) fn fold_surfaces_into_lod(
    results: &[Option<SurfaceResult>],
) -> Option<morph_ir::InstanceOpRef> {
    let mut instance: Option<morph_ir::InstanceOpRef> = None;
    for result in results.iter().flatten() {
        let op = Arc::new(InstanceOp::AddSurface {
            instance: instance.clone(),
            surface_id: result.surface_id,
            name: result.name.clone(),
            mesh: result.mesh.clone(),
            images: result.images.clone(),
            vectors: result.vectors.clone(),
            scalars: result.scalars.clone(),
            strings: result.strings.clone(),
        });
        instance = Some(match &result.condition {
            Some(condition) => Arc::new(InstanceOp::Conditional(morph_ir::Conditional {
                condition: Arc::clone(condition),
                yes: Some(op),
                no: instance,
            })),
            None => op,
        });
    }
    instance
}
