//! Graph-to-IR code generation for the Morph customization compiler.
//!
//! Takes an author-facing customization graph and lowers it into the
//! typed operation DAG of `morph_ir`, one root per declared state. The
//! pipeline is:
//!
//! 1. **First pass** (`first_pass`): one depth-first walk collecting
//!    objects, components, surfaces, modifiers, tags and states, with
//!    reachability conditions derived from switches and exclusive
//!    groups.
//! 2. **Condition composition** (`second_pass`): per-tag activation
//!    expressions, final surface/modifier conditions, state filters.
//! 3. **Main pass**: per-state code generation through cache-backed
//!    per-domain generators, the table expander, and the task-based
//!    mesh/image/surface/component orchestration.
//!
//! Compilation is fail-soft: user content errors degrade the offending
//! subtree to a placeholder and are reported to the diagnostics sink;
//! the host always receives a complete state list. Fatal logic errors
//! (impossible dispatch states) panic, because they are compiler bugs,
//! not content bugs.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use morph_diagnostic::{DiagnosticSink, MessageContext, Severity, SpamBin};
use morph_graph::{Node, StateDesc};
use morph_ir::{
    BoolOpRef, ColorOpRef, ExtensionOpRef, ImageOpRef, InstanceOpRef, Layout, MatrixOpRef,
    Mesh, MeshOpRef, ProjectorOpRef, RangeOpRef, ScalarOpRef, StringOpRef,
};
use morph_task::{Task, TaskPool};

mod boolean;
mod cache;
mod color;
mod component;
mod conditions;
mod extension;
mod first_pass;
mod image;
mod matrix;
mod mesh;
mod object;
mod options;
mod params;
mod projector;
mod range;
mod scalar;
mod second_pass;
mod string;
mod surface;
mod table;

pub use mesh::MeshResult;
pub use options::{GenerationOptions, ImageOptions, MeshDynamicOptions, MeshStaticOptions};

use cache::{GeneratedCache, UniqueIdAllocator};
use component::{ComponentCacheKey, ComponentOptions};
use first_pass::FirstPass;
use mesh::{ConstantMeshEntry, MeshCacheKey};
use object::{ObjectCacheKey, ObjectOptions};
use options::NodeKey;
use params::ParamCaches;
use surface::SurfaceTask;

pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
pub(crate) const STACK_GROW: usize = 1024 * 1024;

/// Resolves externally stored meshes and images by numeric id.
pub trait ResourceProvider: Send + Sync {
    /// A mesh, optionally one specific morph of it.
    fn mesh(&self, id: u32, morph: Option<&str>) -> Option<Mesh>;
    fn image(&self, id: u32) -> Option<morph_ir::Image>;
}

/// Knobs for one compilation.
#[derive(Clone, Default)]
pub struct CompilerOptions {
    /// Skip state declarations; the compile gets one synthesized
    /// "Default" state.
    pub ignore_states: bool,
    /// Skip mesh and image generation entirely, for fast
    /// structural-only compiles.
    pub disable_resource_generation: bool,
    /// Tile edge in pixels for splitting large generated images;
    /// 0 disables tiling.
    pub image_tiling: u16,
    /// Pixel size assumed for surface texture targets.
    pub target_texture_size: u16,
    /// Resolver for referenced meshes/images. Without one, references
    /// lower to reference ops for the host to resolve at link time.
    pub resource_provider: Option<Arc<dyn ResourceProvider>>,
    /// Invoked while the top-level entry point waits for the task graph,
    /// so cooperative host schedulers can pump their own work.
    pub wait_callback: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl CompilerOptions {
    pub fn new() -> Self {
        CompilerOptions {
            target_texture_size: 512,
            ..CompilerOptions::default()
        }
    }
}

/// Compilation failure that cannot degrade to a placeholder.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("a `{0}` node cannot be the root of a compiled graph")]
    UnsupportedRoot(&'static str),
}

/// The generated root op of one state, typed by the root's domain.
#[derive(Clone, Debug)]
pub enum RootOp {
    Instance(InstanceOpRef),
    Bool(BoolOpRef),
    Scalar(ScalarOpRef),
    Color(ColorOpRef),
    String(StringOpRef),
    Matrix(MatrixOpRef),
    Projector(ProjectorOpRef),
    Mesh(MeshOpRef),
    Image(ImageOpRef),
    Extension(ExtensionOpRef),
}

/// One compiled state: its descriptor and the root of its program.
#[derive(Clone, Debug)]
pub struct CompiledState {
    pub descriptor: StateDesc,
    pub root: Option<RootOp>,
}

/// Result of a whole-graph compilation.
pub struct CompiledProgram {
    pub states: Vec<CompiledState>,
    /// Errors and warnings collected along the way. A complete state
    /// list is produced even with content errors; inspect this before
    /// trusting the program.
    pub diagnostics: Arc<DiagnosticSink>,
}

/// Public entry point: owns the options, builds one session per call.
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Compiler { options }
    }

    /// Compile a source graph into one program root per state.
    pub fn compile(&self, root: &Node) -> Result<CompiledProgram, CompileError> {
        let sink = Arc::new(DiagnosticSink::new());
        let params = ParamCaches::new();

        let mut collected = first_pass::collect(root, self.options.ignore_states, &sink, &params);
        second_pass::compose(&mut collected, &sink);

        let generator = Arc::new(CodeGenerator {
            options: self.options.clone(),
            sink: Arc::clone(&sink),
            pool: TaskPool::new(),
            first_pass: collected,
            caches: GeneratedCaches::new(params),
        });

        let mut states = Vec::with_capacity(generator.first_pass.states.len());
        for index in 0..generator.first_pass.states.len() {
            tracing::debug!(state = index, "generating state");
            let options = GenerationOptions {
                state: Some(index),
                active_tags: Vec::new(),
                is_image: false,
            };
            let root_op = generator.generate_generic(&options, root)?;
            states.push(CompiledState {
                descriptor: generator.first_pass.states[index].clone(),
                root: root_op,
            });
        }

        Ok(CompiledProgram {
            states,
            diagnostics: sink,
        })
    }
}

/// Every per-domain memoization table of one compiler session, plus the
/// dedup/allocation state shared by mesh generation. Each map has its
/// own lock; none is global.
pub(crate) struct GeneratedCaches {
    pub params: ParamCaches,
    pub bools: GeneratedCache<(NodeKey, GenerationOptions), BoolOpRef>,
    pub scalars: GeneratedCache<(NodeKey, GenerationOptions), ScalarOpRef>,
    pub colors: GeneratedCache<(NodeKey, GenerationOptions), ColorOpRef>,
    pub strings: GeneratedCache<(NodeKey, GenerationOptions), StringOpRef>,
    pub matrices: GeneratedCache<(NodeKey, GenerationOptions), MatrixOpRef>,
    pub projectors: GeneratedCache<(NodeKey, GenerationOptions), ProjectorOpRef>,
    pub ranges: GeneratedCache<(NodeKey, GenerationOptions), RangeOpRef>,
    pub extensions: GeneratedCache<(NodeKey, GenerationOptions), ExtensionOpRef>,
    pub images: GeneratedCache<(NodeKey, ImageOptions), ImageOpRef>,
    pub meshes: GeneratedCache<MeshCacheKey, MeshResult>,
    pub mesh_constants: Mutex<FxHashMap<(u32, u32), Vec<ConstantMeshEntry>>>,
    pub layouts: GeneratedCache<(NodeKey, u32), Arc<Layout>>,
    pub table_selectors: GeneratedCache<(NodeKey, String), ScalarOpRef>,
    pub components: GeneratedCache<ComponentCacheKey, Option<InstanceOpRef>>,
    pub objects: GeneratedCache<ObjectCacheKey, Option<InstanceOpRef>>,
    pub surface_results: GeneratedCache<usize, SurfaceTask>,
    pub shared_meshes: Mutex<FxHashMap<u32, MeshResult>>,
    pub unique_ids: UniqueIdAllocator,
}

impl GeneratedCaches {
    fn new(params: ParamCaches) -> Self {
        GeneratedCaches {
            params,
            bools: GeneratedCache::new(),
            scalars: GeneratedCache::new(),
            colors: GeneratedCache::new(),
            strings: GeneratedCache::new(),
            matrices: GeneratedCache::new(),
            projectors: GeneratedCache::new(),
            ranges: GeneratedCache::new(),
            extensions: GeneratedCache::new(),
            images: GeneratedCache::new(),
            meshes: GeneratedCache::new(),
            mesh_constants: Mutex::new(FxHashMap::default()),
            layouts: GeneratedCache::new(),
            table_selectors: GeneratedCache::new(),
            components: GeneratedCache::new(),
            objects: GeneratedCache::new(),
            surface_results: GeneratedCache::new(),
            shared_meshes: Mutex::new(FxHashMap::default()),
            unique_ids: UniqueIdAllocator::new(),
        }
    }
}

/// One compilation session: the options, the diagnostics sink, the
/// structural tables from the first pass, and every generated-result
/// cache. Shared by reference into generation tasks.
pub(crate) struct CodeGenerator {
    pub(crate) options: CompilerOptions,
    pub(crate) sink: Arc<DiagnosticSink>,
    pub(crate) pool: TaskPool,
    pub(crate) first_pass: FirstPass,
    pub(crate) caches: GeneratedCaches,
}

impl CodeGenerator {
    /// Lower any root node by domain.
    fn generate_generic(
        self: &Arc<Self>,
        options: &GenerationOptions,
        root: &Node,
    ) -> Result<Option<RootOp>, CompileError> {
        let result = match root {
            Node::Object(node) => {
                let object_options = ObjectOptions {
                    state: options.state,
                    base_instance: None,
                };
                self.generate_object(&object_options, Some(node))
                    .map(RootOp::Instance)
            }
            Node::Component(node) => {
                let component_options = ComponentOptions {
                    state: options.state,
                    base_instance: None,
                };
                self.generate_component(&component_options, Some(node))
                    .map(RootOp::Instance)
            }
            Node::Bool(node) => Some(RootOp::Bool(self.generate_bool(options, Some(node)))),
            Node::Scalar(node) => Some(RootOp::Scalar(self.generate_scalar(options, Some(node)))),
            Node::Color(node) => Some(RootOp::Color(self.generate_color(options, Some(node)))),
            Node::String(node) => Some(RootOp::String(self.generate_string(options, Some(node)))),
            Node::Matrix(node) => Some(RootOp::Matrix(self.generate_matrix(options, Some(node)))),
            Node::Projector(node) => {
                Some(RootOp::Projector(self.generate_projector(options, Some(node))))
            }
            Node::Mesh(node) => {
                let statics = MeshStaticOptions {
                    component_id: None,
                    lod: 0,
                    state: options.state,
                    active_tags: options.active_tags.clone(),
                };
                let task = self.generate_mesh(
                    &statics,
                    Task::completed(MeshDynamicOptions::with_layouts()),
                    Some(node),
                );
                let result = match self.options.wait_callback.clone() {
                    Some(callback) => task.pump_until_complete(&mut || callback()),
                    None => task.result(),
                };
                result.op.map(RootOp::Mesh)
            }
            Node::Image(node) => {
                let image_options = ImageOptions {
                    state: options.state,
                    active_tags: options.active_tags.clone(),
                    component_id: None,
                    lod: 0,
                    rect_size: [0, 0],
                    layout_block_id: None,
                };
                Some(RootOp::Image(self.generate_image(&image_options, Some(node))))
            }
            Node::ExtensionData(node) => {
                Some(RootOp::Extension(self.generate_extension(options, Some(node))))
            }
            Node::Surface(_) | Node::Modifier(_) => {
                return Err(CompileError::UnsupportedRoot(root.domain()));
            }
        };
        Ok(result)
    }

    /// The composed "tag is active" condition, or `None` (with a binned
    /// warning) for tags never declared anywhere in the graph. Declared
    /// but never-activated tags yield a constant false.
    pub(crate) fn tag_condition(
        &self,
        tag: &str,
        context: &MessageContext,
    ) -> Option<BoolOpRef> {
        match self.first_pass.tag_index(tag) {
            Some(index) => Some(
                self.first_pass.tags[index]
                    .condition
                    .clone()
                    .unwrap_or_else(|| conditions::const_bool(false)),
            ),
            None => {
                self.sink.add(
                    format!("unknown tag `{tag}` referenced by a variation"),
                    Severity::Warning,
                    context.clone(),
                    SpamBin::UnknownTag,
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_graph::{ScalarNode, ScalarNodeRef};
    use pretty_assertions::assert_eq;

    fn session(root: &Node) -> Arc<CodeGenerator> {
        let sink = Arc::new(DiagnosticSink::new());
        let params = ParamCaches::new();
        let mut collected = first_pass::collect(root, false, &sink, &params);
        second_pass::compose(&mut collected, &sink);
        Arc::new(CodeGenerator {
            options: CompilerOptions::new(),
            sink,
            pool: TaskPool::new(),
            first_pass: collected,
            caches: GeneratedCaches::new(params),
        })
    }

    fn options_for_state(state: usize) -> GenerationOptions {
        GenerationOptions {
            state: Some(state),
            active_tags: Vec::new(),
            is_image: false,
        }
    }

    #[test]
    fn memoized_results_are_reference_identical() {
        let node: ScalarNodeRef = Arc::new(ScalarNode::Constant { value: 3.0 });
        let generator = session(&Node::Scalar(Arc::clone(&node)));
        let options = options_for_state(0);

        let first = generator.generate_scalar(&options, Some(&node));
        let second = generator.generate_scalar(&options, Some(&node));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(generator.caches.scalars.len(), 1);
    }

    #[test]
    fn ir_affecting_option_fields_each_dispatch_independently() {
        let node: ScalarNodeRef = Arc::new(ScalarNode::Constant { value: 3.0 });
        let generator = session(&Node::Scalar(Arc::clone(&node)));

        let by_state_a = generator.generate_scalar(&options_for_state(0), Some(&node));
        let by_state_b = generator.generate_scalar(&options_for_state(1), Some(&node));
        let with_tags = generator.generate_scalar(
            &GenerationOptions {
                state: Some(0),
                active_tags: vec!["Cloth".to_owned()],
                is_image: false,
            },
            Some(&node),
        );

        // Structurally interchangeable, but each key dispatched on its
        // own: no false cache hits across differing options.
        assert_eq!(by_state_a, by_state_b);
        assert!(!Arc::ptr_eq(&by_state_a, &by_state_b));
        assert!(!Arc::ptr_eq(&by_state_a, &with_tags));
        assert_eq!(generator.caches.scalars.len(), 3);
    }

    #[test]
    fn parameter_declarations_ignore_options() {
        let node: ScalarNodeRef = Arc::new(ScalarNode::Parameter(morph_graph::ScalarParameter {
            name: "Strength".to_owned(),
            uid: String::new(),
            default: 1.0,
            ranges: Vec::new(),
            context: MessageContext::none(),
        }));
        let generator = session(&Node::Scalar(Arc::clone(&node)));

        let a = generator.generate_scalar(&options_for_state(0), Some(&node));
        let b = generator.generate_scalar(&options_for_state(1), Some(&node));
        // Different option sets, but one shared parameter op: a
        // declaration does not depend on tags or state.
        assert!(Arc::ptr_eq(&a, &b));
    }
}
