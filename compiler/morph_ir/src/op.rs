//! Operation nodes, one closed enum per value domain.
//!
//! Every node is immutable and shared through an `Arc`; children are
//! references to other nodes, forming a DAG. Structural equality and
//! hashing are derived throughout (floats go through
//! [`Real`](crate::value::Real)), which is what the downstream optimizer
//! keys its deduplication on. Two structurally identical nodes are
//! interchangeable but are not unified here.
//!
//! The enums are deliberately exhaustive: generator dispatch is a plain
//! `match`, so adding a kind without handling it everywhere fails to
//! compile instead of failing at runtime.

use std::sync::Arc;

use crate::layout::{Layout, MeshLayoutFlags};
use crate::param::Parameter;
use crate::value::{
    Color, ExtensionData, Image, ImageFormat, Matrix4, Mesh, Projector, Real,
};

pub type BoolOpRef = Arc<BoolOp>;
pub type ScalarOpRef = Arc<ScalarOp>;
pub type ColorOpRef = Arc<ColorOp>;
pub type StringOpRef = Arc<StringOp>;
pub type MatrixOpRef = Arc<MatrixOp>;
pub type ProjectorOpRef = Arc<ProjectorOp>;
pub type RangeOpRef = Arc<RangeOp>;
pub type MeshOpRef = Arc<MeshOp>;
pub type ImageOpRef = Arc<ImageOp>;
pub type ExtensionOpRef = Arc<ExtensionOp>;
pub type InstanceOpRef = Arc<InstanceOp>;

/// A parameter use site: the shared declaration plus the repetition
/// ranges attached at declaration time.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ParameterOp {
    pub param: Parameter,
    pub ranges: Vec<RangeOpRef>,
}

/// A runtime selection over integer-valued branches.
///
/// Produced from switch source nodes and from table expansion (one case
/// per table row). A `None` branch is an empty arm: legal for meshes,
/// where a table row may legitimately hold no value.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Switch<T> {
    pub selector: ScalarOpRef,
    pub cases: Vec<SwitchCase<T>>,
    pub default: Option<Arc<T>>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SwitchCase<T> {
    pub value: i32,
    pub branch: Option<Arc<T>>,
}

impl<T> SwitchCase<T> {
    pub fn new(value: i32, branch: Option<Arc<T>>) -> Self {
        SwitchCase { value, branch }
    }
}

/// A two-way runtime selection on a boolean condition.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Conditional<T> {
    pub condition: BoolOpRef,
    pub yes: Option<Arc<T>>,
    pub no: Option<Arc<T>>,
}

/// The closed arithmetic operation set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Blend function of an image layer operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BlendType {
    #[default]
    Normal,
    Multiply,
    Add,
    SoftLight,
}

/// A named channel hanging off a surface (an image, color, scalar or
/// string slot addressed by material binding name).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct NamedOp<T> {
    pub name: String,
    pub op: Arc<T>,
}

impl<T> NamedOp<T> {
    pub fn new(name: impl Into<String>, op: Arc<T>) -> Self {
        NamedOp { name: name.into(), op }
    }
}

/// Boolean-condition domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum BoolOp {
    Constant(bool),
    Parameter(ParameterOp),
    And {
        a: Option<BoolOpRef>,
        b: Option<BoolOpRef>,
    },
    Or {
        a: Option<BoolOpRef>,
        b: Option<BoolOpRef>,
    },
    Not(BoolOpRef),
    /// True when an enumeration selector currently holds `value`.
    EnumEquals { selector: ScalarOpRef, value: i32 },
}

/// Scalar domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ScalarOp {
    Constant(Real),
    Parameter(ParameterOp),
    Switch(Switch<ScalarOp>),
    Conditional(Conditional<ScalarOp>),
    Arithmetic {
        op: ArithmeticOp,
        a: ScalarOpRef,
        b: ScalarOpRef,
    },
}

/// Color domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ColorOp {
    Constant(Color),
    Parameter(ParameterOp),
    Switch(Switch<ColorOp>),
    Conditional(Conditional<ColorOp>),
    Arithmetic {
        op: ArithmeticOp,
        a: ColorOpRef,
        b: ColorOpRef,
    },
    FromScalars {
        r: ScalarOpRef,
        g: ScalarOpRef,
        b: ScalarOpRef,
        a: ScalarOpRef,
    },
}

/// String domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum StringOp {
    Constant(String),
    Parameter(ParameterOp),
    Switch(Switch<StringOp>),
    Conditional(Conditional<StringOp>),
}

/// Matrix domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MatrixOp {
    Constant(Matrix4),
    Parameter(ParameterOp),
    Switch(Switch<MatrixOp>),
    Conditional(Conditional<MatrixOp>),
}

/// Projector domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ProjectorOp {
    Constant(Projector),
    Parameter(ParameterOp),
}

/// Range domain: a parametrized repetition axis attached to a parameter.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RangeOp {
    FromScalar {
        name: String,
        size: ScalarOpRef,
    },
}

/// Extension-data domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ExtensionOp {
    Constant(ExtensionData),
    Switch(Switch<ExtensionOp>),
    Conditional(Conditional<ExtensionOp>),
}

bitflags::bitflags! {
    /// Which bindings a shape-application op rebuilds.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct ReshapeFlags: u8 {
        const SKELETON = 1;
        const PHYSICS = 1 << 1;
    }
}

/// Parameters of a clip-morph-plane mesh edit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClipMorphShape {
    pub center: [Real; 3],
    pub normal: [Real; 3],
    pub distance: Real,
    pub factor: Real,
    pub radius: Real,
}

/// Mesh domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MeshOp {
    /// A deduplicated constant mesh. `id_prefix` is the globally unique
    /// mesh id that prefixes this mesh's absolute layout-block ids.
    Constant {
        mesh: Arc<Mesh>,
        id_prefix: u32,
        layouts: Vec<Arc<Layout>>,
    },
    /// An externally stored mesh resolved by the host at link time.
    Reference { id: u32, morph: Option<String> },
    Switch(Switch<MeshOp>),
    Conditional(Conditional<MeshOp>),
    Morph {
        base: Option<MeshOpRef>,
        target: Option<MeshOpRef>,
        factor: ScalarOpRef,
    },
    /// Append one surface mesh onto another inside a component LOD.
    Merge {
        base: MeshOpRef,
        added: MeshOpRef,
    },
    /// Assign one texture layout's blocks to the mesh's UV islands.
    PrepareLayout {
        mesh: MeshOpRef,
        layout: Arc<Layout>,
        channel: u8,
        flags: MeshLayoutFlags,
    },
    ClipMorphPlane {
        source: MeshOpRef,
        shape: ClipMorphShape,
    },
    ClipWithMesh {
        source: MeshOpRef,
        clip: Option<MeshOpRef>,
    },
    ClipDeform {
        source: MeshOpRef,
        shape: Option<MeshOpRef>,
    },
    ApplyPose {
        source: MeshOpRef,
        pose: Option<MeshOpRef>,
    },
    ApplyShape {
        source: MeshOpRef,
        shape: Option<MeshOpRef>,
        flags: ReshapeFlags,
    },
}

/// Image domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ImageOp {
    Constant { image: Arc<Image> },
    /// An externally stored image resolved by the host at link time.
    Reference { id: u32 },
    Parameter(ParameterOp),
    /// A solid-color image of a fixed size.
    PlainColor {
        color: ColorOpRef,
        size: [u16; 2],
        format: ImageFormat,
        lods: u8,
    },
    Switch(Switch<ImageOp>),
    Conditional(Conditional<ImageOp>),
    Layer {
        base: ImageOpRef,
        blend: ImageOpRef,
        mask: Option<ImageOpRef>,
        blend_type: BlendType,
        apply_to_alpha: bool,
    },
    Resize {
        source: ImageOpRef,
        size: [u16; 2],
    },
    Format {
        source: ImageOpRef,
        format: ImageFormat,
    },
    Crop {
        source: ImageOpRef,
        min: [u16; 2],
        size: [u16; 2],
    },
    Patch {
        base: ImageOpRef,
        patch: ImageOpRef,
        location: [u16; 2],
    },
}

/// Instance-assembly domain: the ops that stitch surfaces, LODs and
/// components into the final per-state program root.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum InstanceOp {
    AddLod {
        lods: Vec<Option<InstanceOpRef>>,
    },
    AddComponent {
        instance: Option<InstanceOpRef>,
        component: Option<InstanceOpRef>,
        id: u16,
    },
    AddSurface {
        instance: Option<InstanceOpRef>,
        surface_id: u32,
        name: String,
        mesh: Option<MeshOpRef>,
        images: Vec<NamedOp<ImageOp>>,
        vectors: Vec<NamedOp<ColorOp>>,
        scalars: Vec<NamedOp<ScalarOp>>,
        strings: Vec<NamedOp<StringOp>>,
    },
    AddExtensionData {
        instance: Option<InstanceOpRef>,
        name: String,
        data: ExtensionOpRef,
    },
    Switch(Switch<InstanceOp>),
    Conditional(Conditional<InstanceOp>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn structurally_equal_ops_share_hash() {
        let a = ScalarOp::Arithmetic {
            op: ArithmeticOp::Add,
            a: Arc::new(ScalarOp::Constant(Real(1.0))),
            b: Arc::new(ScalarOp::Constant(Real(2.0))),
        };
        let b = ScalarOp::Arithmetic {
            op: ArithmeticOp::Add,
            a: Arc::new(ScalarOp::Constant(Real(1.0))),
            b: Arc::new(ScalarOp::Constant(Real(2.0))),
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn distinct_ops_compare_unequal() {
        let shared = Arc::new(ScalarOp::Constant(Real(0.5)));
        let cond = BoolOp::EnumEquals {
            selector: Arc::clone(&shared),
            value: 3,
        };
        let other = BoolOp::EnumEquals {
            selector: shared,
            value: 4,
        };
        assert_ne!(cond, other);
    }

    #[test]
    fn shared_children_are_dag_edges() {
        let leaf = Arc::new(ScalarOp::Constant(Real(1.0)));
        let parent = ScalarOp::Arithmetic {
            op: ArithmeticOp::Multiply,
            a: Arc::clone(&leaf),
            b: Arc::clone(&leaf),
        };
        match &parent {
            ScalarOp::Arithmetic { a, b, .. } => assert!(Arc::ptr_eq(a, b)),
            _ => unreachable!(),
        }
    }
}
