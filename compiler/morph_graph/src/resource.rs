//! Mesh, image and layout source nodes.

use std::sync::Arc;

use morph_diagnostic::MessageContext;
use morph_ir::{BlendType, Image, ImageFormat, Mesh, PackStrategy, ReductionMethod};

use crate::value::{ColorNodeRef, ImageParameter, ScalarNodeRef, SwitchNode, TableNode, VariationNode};

pub type MeshNodeRef = Arc<MeshNode>;
pub type ImageNodeRef = Arc<ImageNode>;
pub type LayoutNodeRef = Arc<LayoutNode>;

/// An authored layout block, before absolute ids are assigned.
#[derive(Clone, Copy, Debug)]
pub struct SourceLayoutBlock {
    pub min: [u16; 2],
    pub size: [u16; 2],
    pub priority: i32,
    pub reduce_both_axes: bool,
    pub reduce_by_two: bool,
}

/// An authored texture layout attached to a constant mesh.
#[derive(Clone, Debug)]
pub struct LayoutNode {
    pub grid: [u16; 2],
    pub max_grid: [u16; 2],
    pub strategy: PackStrategy,
    pub reduction: ReductionMethod,
    pub blocks: Vec<SourceLayoutBlock>,
}

/// Mesh-domain source nodes.
#[derive(Clone, Debug)]
pub enum MeshNode {
    Constant {
        mesh: Arc<Mesh>,
        layouts: Vec<LayoutNodeRef>,
        context: MessageContext,
    },
    /// An externally stored mesh addressed by numeric id, optionally a
    /// specific morph of it.
    Reference {
        id: u32,
        morph: Option<String>,
        context: MessageContext,
    },
    Morph {
        factor: Option<ScalarNodeRef>,
        base: Option<MeshNodeRef>,
        target: Option<MeshNodeRef>,
        context: MessageContext,
    },
    Switch(SwitchNode<MeshNode>),
    Variation(VariationNode<MeshNode>),
    Table(TableNode),
}

/// Image-domain source nodes.
#[derive(Clone, Debug)]
pub enum ImageNode {
    Constant {
        image: Arc<Image>,
        context: MessageContext,
    },
    /// An externally stored image addressed by numeric id.
    Reference { id: u32, context: MessageContext },
    Parameter(ImageParameter),
    /// A solid-color image produced from a color expression.
    PlainColor {
        color: Option<ColorNodeRef>,
        size: [u16; 2],
        format: ImageFormat,
        context: MessageContext,
    },
    Switch(SwitchNode<ImageNode>),
    Variation(VariationNode<ImageNode>),
    Table(TableNode),
    Layer {
        base: Option<ImageNodeRef>,
        blend: Option<ImageNodeRef>,
        mask: Option<ImageNodeRef>,
        blend_type: BlendType,
        context: MessageContext,
    },
}
