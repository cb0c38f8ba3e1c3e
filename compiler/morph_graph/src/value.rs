//! Value-domain source nodes.
//!
//! Each domain is one closed enum; the per-domain generators dispatch on
//! it exhaustively. Switch, variation and table references share the same
//! shape across domains, so those are generic over the branch node type.

use std::sync::Arc;

use morph_diagnostic::MessageContext;
use morph_ir::{ArithmeticOp, ImageFormat};

use crate::table::Table;

pub type BoolNodeRef = Arc<BoolNode>;
pub type ScalarNodeRef = Arc<ScalarNode>;
pub type ColorNodeRef = Arc<ColorNode>;
pub type StringNodeRef = Arc<StringNode>;
pub type MatrixNodeRef = Arc<MatrixNode>;
pub type ProjectorNodeRef = Arc<ProjectorNode>;
pub type RangeNodeRef = Arc<RangeNode>;
pub type ExtensionDataNodeRef = Arc<ExtensionDataNode>;

/// A runtime selection between declared options, driven by an
/// enumeration parameter.
#[derive(Clone, Debug)]
pub struct SwitchNode<T> {
    /// The selecting parameter. Required; a missing connection degrades
    /// to a placeholder selector with a diagnostic.
    pub parameter: Option<ScalarNodeRef>,
    /// One entry per declared option, in option-value order.
    pub options: Vec<Option<Arc<T>>>,
    pub context: MessageContext,
}

/// Content selected by variation tags.
///
/// Branches are declared in priority order: when several tags are active
/// simultaneously, the *last* declared branch wins (the generator folds
/// branches in reverse declaration order).
#[derive(Clone, Debug)]
pub struct VariationNode<T> {
    pub default_value: Option<Arc<T>>,
    pub variations: Vec<VariationBranch<T>>,
    pub context: MessageContext,
}

#[derive(Clone, Debug)]
pub struct VariationBranch<T> {
    pub tag: String,
    pub value: Option<Arc<T>>,
}

/// A per-row value drawn from a column of a value table.
#[derive(Clone, Debug)]
pub struct TableNode {
    pub table: Arc<Table>,
    pub column: String,
    /// Name of the shared row-selector parameter. Falls back to the
    /// table name when empty.
    pub parameter_name: String,
    /// Prepend a "None" option (value -1) to the selector.
    pub add_none_option: bool,
    /// Name of the row preselected as the parameter default.
    pub default_row_name: String,
    pub context: MessageContext,
}

/// A repetition axis declaration: the parameter it is attached to varies
/// per element (e.g. one value per clothing layer).
#[derive(Clone, Debug)]
pub enum RangeNode {
    FromScalar {
        name: String,
        size: Option<ScalarNodeRef>,
        context: MessageContext,
    },
}

/// One selectable value of an enumeration parameter declaration.
#[derive(Clone, Debug)]
pub struct EnumOptionDecl {
    pub value: i32,
    pub name: String,
}

/// A boolean parameter declaration.
#[derive(Clone, Debug)]
pub struct BoolParameter {
    pub name: String,
    pub uid: String,
    pub default: bool,
    pub context: MessageContext,
}

/// A scalar parameter declaration.
#[derive(Clone, Debug)]
pub struct ScalarParameter {
    pub name: String,
    pub uid: String,
    pub default: f32,
    pub ranges: Vec<RangeNodeRef>,
    pub context: MessageContext,
}

/// An enumeration parameter declaration.
#[derive(Clone, Debug)]
pub struct EnumParameter {
    pub name: String,
    pub uid: String,
    pub default: i32,
    pub options: Vec<EnumOptionDecl>,
    pub ranges: Vec<RangeNodeRef>,
    pub context: MessageContext,
}

/// A color parameter declaration.
#[derive(Clone, Debug)]
pub struct ColorParameter {
    pub name: String,
    pub uid: String,
    pub default: [f32; 4],
    pub ranges: Vec<RangeNodeRef>,
    pub context: MessageContext,
}

/// A string parameter declaration.
#[derive(Clone, Debug)]
pub struct StringParameter {
    pub name: String,
    pub uid: String,
    pub default: String,
    pub context: MessageContext,
}

/// A matrix parameter declaration.
#[derive(Clone, Debug)]
pub struct MatrixParameter {
    pub name: String,
    pub uid: String,
    pub default: [f32; 16],
    pub context: MessageContext,
}

/// A projector parameter declaration.
#[derive(Clone, Debug)]
pub struct ProjectorParameter {
    pub name: String,
    pub uid: String,
    pub default: ProjectorDesc,
    pub context: MessageContext,
}

/// An image parameter declaration; defaults to an external resource id.
#[derive(Clone, Debug)]
pub struct ImageParameter {
    pub name: String,
    pub uid: String,
    pub default_id: u32,
    pub context: MessageContext,
}

/// Authored projector value.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectorDesc {
    pub projection: morph_ir::ProjectionType,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub up: [f32; 3],
    pub scale: [f32; 3],
    pub angle: f32,
}

/// Boolean-domain source nodes.
#[derive(Clone, Debug)]
pub enum BoolNode {
    Constant { value: bool },
    Parameter(BoolParameter),
    Not { source: Option<BoolNodeRef> },
    And {
        a: Option<BoolNodeRef>,
        b: Option<BoolNodeRef>,
        context: MessageContext,
    },
}

/// Scalar-domain source nodes.
#[derive(Clone, Debug)]
pub enum ScalarNode {
    Constant { value: f32 },
    Parameter(ScalarParameter),
    EnumParameter(EnumParameter),
    Switch(SwitchNode<ScalarNode>),
    Variation(VariationNode<ScalarNode>),
    Table(TableNode),
    Arithmetic {
        op: ArithmeticOp,
        a: Option<ScalarNodeRef>,
        b: Option<ScalarNodeRef>,
        context: MessageContext,
    },
}

/// Color-domain source nodes.
#[derive(Clone, Debug)]
pub enum ColorNode {
    Constant { value: [f32; 4] },
    Parameter(ColorParameter),
    Switch(SwitchNode<ColorNode>),
    Variation(VariationNode<ColorNode>),
    Table(TableNode),
    Arithmetic {
        op: ArithmeticOp,
        a: Option<ColorNodeRef>,
        b: Option<ColorNodeRef>,
        context: MessageContext,
    },
    FromScalars {
        r: Option<ScalarNodeRef>,
        g: Option<ScalarNodeRef>,
        b: Option<ScalarNodeRef>,
        a: Option<ScalarNodeRef>,
        context: MessageContext,
    },
}

/// String-domain source nodes.
#[derive(Clone, Debug)]
pub enum StringNode {
    Constant { value: String },
    Parameter(StringParameter),
    Switch(SwitchNode<StringNode>),
    Variation(VariationNode<StringNode>),
    Table(TableNode),
}

/// Matrix-domain source nodes. No table kind: value tables have no
/// matrix column type.
#[derive(Clone, Debug)]
pub enum MatrixNode {
    Constant { value: [f32; 16] },
    Parameter(MatrixParameter),
    Switch(SwitchNode<MatrixNode>),
    Variation(VariationNode<MatrixNode>),
}

/// Projector-domain source nodes.
#[derive(Clone, Debug)]
pub enum ProjectorNode {
    Constant { value: ProjectorDesc },
    Parameter(ProjectorParameter),
}

/// Extension-data source nodes: opaque host payloads attached to the
/// built instance.
#[derive(Clone, Debug)]
pub enum ExtensionDataNode {
    Constant { data: morph_ir::ExtensionData },
    Switch(SwitchNode<ExtensionDataNode>),
    Variation(VariationNode<ExtensionDataNode>),
}

/// Placeholder image format used when a missing connection forces the
/// compiler to synthesize an image.
pub const MISSING_IMAGE_FORMAT: ImageFormat = ImageFormat::Rgb8;
