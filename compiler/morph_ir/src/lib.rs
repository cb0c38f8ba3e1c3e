//! IR types for the Morph customization compiler.
//!
//! The code generator lowers an author-facing customization graph into the
//! operation nodes defined here. The IR is a DAG, not a tree: nodes are
//! immutable once built, shared through [`std::sync::Arc`], and carry
//! structural equality and hashing so the downstream optimizer can
//! deduplicate interchangeable subgraphs. No unification happens at this
//! layer.
//!
//! # Organization
//!
//! - [`value`] — opaque value types consumed by operations (colors,
//!   matrices, projectors, meshes, images, extension payloads).
//! - [`param`] — runtime parameter descriptors and their stable external
//!   identifiers.
//! - [`layout`] — texture layouts and layout blocks with absolute block
//!   ids.
//! - [`op`] — one operation enum per value domain, plus the instance
//!   assembly ops that stitch components, LODs and surfaces together.

pub mod layout;
pub mod op;
pub mod param;
pub mod value;

pub use layout::{Layout, LayoutBlock, MeshLayoutFlags, PackStrategy, ReductionMethod, INVALID_BLOCK_ID};
pub use op::{
    ArithmeticOp, BlendType, BoolOp, BoolOpRef, ClipMorphShape, ColorOp, ColorOpRef, Conditional,
    ExtensionOp, ExtensionOpRef, ImageOp, ImageOpRef, InstanceOp, InstanceOpRef, MatrixOp,
    MatrixOpRef, MeshOp, MeshOpRef, NamedOp, ParameterOp, ProjectorOp, ProjectorOpRef, RangeOp,
    RangeOpRef, ReshapeFlags, ScalarOp, ScalarOpRef, StringOp, StringOpRef, Switch, SwitchCase,
};
pub use param::{EnumOption, ParamUid, Parameter, ParamValue, UidParseError};
pub use value::{
    Color, ExtensionData, Image, ImageFormat, Matrix4, Mesh, ProjectionType, Projector, Real,
};
