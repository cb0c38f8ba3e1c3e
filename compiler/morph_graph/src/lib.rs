//! The author-facing customization graph.
//!
//! A graph describes a parametric 3D asset declaratively: objects own
//! components, components own LODs, LODs own surfaces, and surfaces carry
//! a mesh plus named material channels. Value nodes (scalars, colors,
//! strings, ...) feed parameters into that structure, and modifiers splice
//! tag-gated edits into mesh and image chains.
//!
//! Nodes are immutable and shared through `Arc`: several parents may
//! reference the same node instance, and the compiler uses that pointer
//! identity as the memoization key. The graph is never mutated during
//! compilation.

pub mod resource;
pub mod structure;
pub mod table;
pub mod value;

pub use resource::{
    ImageNode, ImageNodeRef, LayoutNode, LayoutNodeRef, MeshNode, MeshNodeRef, SourceLayoutBlock,
};
pub use structure::{
    ComponentNew, ComponentNode, ComponentNodeRef, GroupType, LodNode, LodNodeRef, ModifierGating,
    ModifierKind, ModifierNode, ModifierNodeRef, ModifierStage, NamedExtension, ObjectGroup,
    ObjectNew, ObjectNode, ObjectNodeRef, PatchRect, StateDesc, StateOptimization, SurfaceChannel,
    SurfaceEdit, SurfaceNew, SurfaceNode, SurfaceNodeRef, SurfaceVariation,
    SurfaceVariationBranch, TexturePatch, TextureCompression, VariationKind,
};
pub use table::{CellValue, Column, ColumnType, Row, Table, TableError};
pub use value::{
    BoolNode, BoolNodeRef, BoolParameter, ColorNode, ColorNodeRef, ColorParameter, EnumOptionDecl,
    EnumParameter, ExtensionDataNode, ExtensionDataNodeRef, ImageParameter, MatrixNode,
    MatrixNodeRef, MatrixParameter, ProjectorDesc, ProjectorNode, ProjectorNodeRef,
    ProjectorParameter, RangeNode, RangeNodeRef, ScalarNode, ScalarNodeRef, ScalarParameter,
    StringNode, StringNodeRef, StringParameter, SwitchNode, TableNode, VariationBranch,
    VariationNode,
};

use std::sync::Arc;

/// A root handle into any domain of the graph, used by the compiler's
/// generic entry point.
#[derive(Clone, Debug)]
pub enum Node {
    Object(ObjectNodeRef),
    Component(ComponentNodeRef),
    Surface(SurfaceNodeRef),
    Modifier(ModifierNodeRef),
    Bool(BoolNodeRef),
    Scalar(ScalarNodeRef),
    Color(ColorNodeRef),
    String(StringNodeRef),
    Matrix(MatrixNodeRef),
    Projector(ProjectorNodeRef),
    Mesh(MeshNodeRef),
    Image(ImageNodeRef),
    ExtensionData(ExtensionDataNodeRef),
}

impl Node {
    /// Short domain name, used in diagnostics.
    pub fn domain(&self) -> &'static str {
        match self {
            Node::Object(_) => "object",
            Node::Component(_) => "component",
            Node::Surface(_) => "surface",
            Node::Modifier(_) => "modifier",
            Node::Bool(_) => "bool",
            Node::Scalar(_) => "scalar",
            Node::Color(_) => "color",
            Node::String(_) => "string",
            Node::Matrix(_) => "matrix",
            Node::Projector(_) => "projector",
            Node::Mesh(_) => "mesh",
            Node::Image(_) => "image",
            Node::ExtensionData(_) => "extension data",
        }
    }
}

/// Pointer identity of a shared node, the compiler's cache key.
pub fn node_identity<T>(node: &Arc<T>) -> usize {
    Arc::as_ptr(node) as usize
}
