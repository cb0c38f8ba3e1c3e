//! Structural source nodes: objects, components, LODs, surfaces,
//! modifiers and state declarations.

use std::sync::Arc;

use morph_diagnostic::MessageContext;
use morph_ir::BlendType;

use crate::resource::{ImageNodeRef, MeshNodeRef};
use crate::value::{ExtensionDataNodeRef, SwitchNode};

pub type ObjectNodeRef = Arc<ObjectNode>;
pub type ComponentNodeRef = Arc<ComponentNode>;
pub type LodNodeRef = Arc<LodNode>;
pub type SurfaceNodeRef = Arc<SurfaceNode>;
pub type ModifierNodeRef = Arc<ModifierNode>;

/// Texture compression applied when building a state's resources.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TextureCompression {
    None,
    #[default]
    Fast,
    Full,
}

/// Per-state optimization record.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StateOptimization {
    pub texture_compression: TextureCompression,
    /// Build only the first LOD for this state.
    pub only_first_lod: bool,
}

/// A named runtime configuration of the compiled program.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StateDesc {
    pub name: String,
    pub optimization: StateOptimization,
    /// Parameters that may change at runtime without a full rebuild.
    pub runtime_params: Vec<String>,
}

impl StateDesc {
    pub fn new(name: impl Into<String>) -> Self {
        StateDesc {
            name: name.into(),
            optimization: StateOptimization::default(),
            runtime_params: Vec::new(),
        }
    }
}

/// Host payload attached to an object under a name.
#[derive(Clone, Debug)]
pub struct NamedExtension {
    pub name: String,
    pub node: ExtensionDataNodeRef,
}

/// Exclusivity semantics of an object group.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GroupType {
    /// Every child is always present.
    AlwaysAll,
    /// Exactly one child is present, chosen by a shared enumeration
    /// parameter.
    AlwaysOne,
    /// At most one child is present; the shared enumeration parameter
    /// gains a "None" option.
    OneOrNone,
    /// Each child has its own on/off toggle parameter.
    ToggleEach,
}

/// Object-domain source nodes.
#[derive(Clone, Debug)]
pub enum ObjectNode {
    New(ObjectNew),
    Group(ObjectGroup),
}

/// A concrete object: components, modifiers, child objects and state
/// declarations.
#[derive(Clone, Debug)]
pub struct ObjectNew {
    pub name: String,
    pub uid: String,
    pub components: Vec<ComponentNodeRef>,
    pub modifiers: Vec<ModifierNodeRef>,
    pub children: Vec<ObjectNodeRef>,
    pub states: Vec<StateDesc>,
    pub extension_data: Vec<NamedExtension>,
    pub context: MessageContext,
}

/// An exclusive group of child objects.
#[derive(Clone, Debug)]
pub struct ObjectGroup {
    pub name: String,
    pub uid: String,
    pub group_type: GroupType,
    /// Name of the child preselected by default (AlwaysOne/OneOrNone).
    pub default_value: String,
    pub children: Vec<ObjectNodeRef>,
    pub context: MessageContext,
}

/// Component-domain source nodes.
#[derive(Clone, Debug)]
pub enum ComponentNode {
    New(ComponentNew),
    Switch(SwitchNode<ComponentNode>),
    Variation(crate::value::VariationNode<ComponentNode>),
}

/// A concrete component: one entry in the built instance, with its LOD
/// chain.
#[derive(Clone, Debug)]
pub struct ComponentNew {
    pub id: u16,
    pub lods: Vec<LodNodeRef>,
    pub context: MessageContext,
}

/// One level of detail: the surfaces built at this LOD.
#[derive(Clone, Debug)]
pub struct LodNode {
    pub surfaces: Vec<SurfaceNodeRef>,
}

/// A named material channel of a surface.
#[derive(Clone, Debug)]
pub struct SurfaceChannel<T> {
    pub name: String,
    pub node: Option<Arc<T>>,
}

/// Whether a surface variation is gated by tags or by states.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariationKind {
    Tag,
    State,
}

/// Surface-domain source nodes.
#[derive(Clone, Debug)]
pub enum SurfaceNode {
    New(SurfaceNew),
    Switch(SwitchNode<SurfaceNode>),
    Variation(SurfaceVariation),
}

/// A concrete surface: a mesh plus named material channels.
#[derive(Clone, Debug)]
pub struct SurfaceNew {
    pub name: String,
    /// External id reported back to the host in the built instance.
    pub surface_id: u32,
    /// Surfaces sharing this id across LODs reuse one generated layout
    /// and material set; the first LOD generated becomes the base.
    pub shared_surface_id: Option<u32>,
    pub mesh: Option<MeshNodeRef>,
    pub images: Vec<SurfaceChannel<crate::resource::ImageNode>>,
    pub vectors: Vec<SurfaceChannel<crate::value::ColorNode>>,
    pub scalars: Vec<SurfaceChannel<crate::value::ScalarNode>>,
    pub strings: Vec<SurfaceChannel<crate::value::StringNode>>,
    /// Tags this surface activates while present.
    pub tags: Vec<String>,
    pub context: MessageContext,
}

/// A tag- or state-gated choice of surfaces and modifiers.
///
/// Branches are first-match-wins: content of branch N is excluded
/// whenever any earlier branch's gate already matched.
#[derive(Clone, Debug)]
pub struct SurfaceVariation {
    pub kind: VariationKind,
    pub default_surfaces: Vec<SurfaceNodeRef>,
    pub default_modifiers: Vec<ModifierNodeRef>,
    pub variations: Vec<SurfaceVariationBranch>,
    pub context: MessageContext,
}

#[derive(Clone, Debug)]
pub struct SurfaceVariationBranch {
    /// Tag name or state name, depending on the variation kind.
    pub value: String,
    pub surfaces: Vec<SurfaceNodeRef>,
    pub modifiers: Vec<ModifierNodeRef>,
}

/// When a modifier runs relative to the surface's own mesh operations.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ModifierStage {
    Pre,
    #[default]
    Post,
}

/// Tag and component gating shared by every modifier kind.
#[derive(Clone, Debug, Default)]
pub struct ModifierGating {
    /// All of these tags must be active for the modifier to apply.
    pub required_tags: Vec<String>,
    /// None of these tags may be active.
    pub excluded_tags: Vec<String>,
    /// Tags this modifier activates while it applies.
    pub enable_tags: Vec<String>,
    pub stage: ModifierStage,
    /// Restrict to one component id, or apply to all.
    pub component_filter: Option<u16>,
}

/// A rectangle of a texture patch, normalized to the source texture.
#[derive(Clone, Copy, Debug)]
pub struct PatchRect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

/// One texture edit of a surface-edit modifier.
#[derive(Clone, Debug)]
pub struct TexturePatch {
    /// Material channel name the patch applies to.
    pub name: String,
    pub image: Option<ImageNodeRef>,
    pub mask: Option<ImageNodeRef>,
    pub blend_type: BlendType,
    pub apply_to_alpha: bool,
    /// Layout-space rectangles the patch is confined to.
    pub blocks: Vec<PatchRect>,
}

/// A surface-edit modifier payload.
#[derive(Clone, Debug)]
pub struct SurfaceEdit {
    pub textures: Vec<TexturePatch>,
}

/// The edit a modifier splices into matching mesh/image chains.
#[derive(Clone, Debug)]
pub enum ModifierKind {
    ClipMorphPlane {
        center: [f32; 3],
        normal: [f32; 3],
        distance: f32,
        factor: f32,
        radius: f32,
    },
    ClipWithMesh { clip: Option<MeshNodeRef> },
    ClipDeform { shape: Option<MeshNodeRef> },
    ApplyPose { pose: Option<MeshNodeRef> },
    Reshape {
        shape: Option<MeshNodeRef>,
        reshape_skeleton: bool,
        reshape_physics: bool,
    },
    SurfaceEdit(SurfaceEdit),
}

/// A tag-gated edit applied to surfaces it matches.
#[derive(Clone, Debug)]
pub struct ModifierNode {
    pub gating: ModifierGating,
    pub kind: ModifierKind,
    pub context: MessageContext,
}
