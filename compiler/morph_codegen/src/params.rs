//! Parameter op construction and the per-domain parameter caches.
//!
//! A parameter's declaration never depends on tags or states, only its
//! use sites do, so parameter ops are keyed by source node identity
//! alone and shared by every later reference. Creation is double-checked
//! against the cache: build outside the lock (range generation may
//! recurse into other generators), then keep whichever op won the store
//! race.

use std::sync::Arc;

use morph_diagnostic::{DiagnosticSink, MessageContext};
use morph_graph::{BoolParameter, ColorParameter, EnumParameter, ImageParameter, MatrixParameter,
    ProjectorParameter, ScalarParameter, StringParameter};
use morph_ir::{
    BoolOp, BoolOpRef, Color, ColorOp, ColorOpRef, EnumOption, ImageOp, ImageOpRef, MatrixOp,
    Matrix4, MatrixOpRef, ParamUid, ParamValue, Parameter, ParameterOp, ProjectorOp,
    ProjectorOpRef, RangeOpRef, Real, ScalarOp, ScalarOpRef, StringOp, StringOpRef,
};

use crate::cache::GeneratedCache;
use crate::options::NodeKey;

/// One cache per parameter-carrying domain, keyed by node identity.
pub(crate) struct ParamCaches {
    pub bools: GeneratedCache<NodeKey, BoolOpRef>,
    pub scalars: GeneratedCache<NodeKey, ScalarOpRef>,
    pub colors: GeneratedCache<NodeKey, ColorOpRef>,
    pub strings: GeneratedCache<NodeKey, StringOpRef>,
    pub matrices: GeneratedCache<NodeKey, MatrixOpRef>,
    pub projectors: GeneratedCache<NodeKey, ProjectorOpRef>,
    pub images: GeneratedCache<NodeKey, ImageOpRef>,
}

impl ParamCaches {
    pub(crate) fn new() -> Self {
        ParamCaches {
            bools: GeneratedCache::new(),
            scalars: GeneratedCache::new(),
            colors: GeneratedCache::new(),
            strings: GeneratedCache::new(),
            matrices: GeneratedCache::new(),
            projectors: GeneratedCache::new(),
            images: GeneratedCache::new(),
        }
    }
}

/// Parse an authored stable identifier, degrading to the unassigned uid
/// with an error diagnostic on malformed input.
pub(crate) fn parse_uid(sink: &DiagnosticSink, text: &str, context: &MessageContext) -> ParamUid {
    match ParamUid::parse(text) {
        Ok(uid) => uid,
        Err(error) => {
            sink.error(
                format!("malformed stable identifier `{text}`: {error}"),
                context.clone(),
            );
            ParamUid::default()
        }
    }
}

pub(crate) fn bool_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &BoolParameter,
) -> BoolOpRef {
    if let Some(hit) = caches.bools.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Bool(decl.default),
    );
    let op = Arc::new(BoolOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }));
    caches.bools.insert_shared(key, op)
}

pub(crate) fn scalar_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &ScalarParameter,
    ranges: Vec<RangeOpRef>,
) -> ScalarOpRef {
    if let Some(hit) = caches.scalars.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Scalar(Real(decl.default)),
    );
    let op = Arc::new(ScalarOp::Parameter(ParameterOp { param, ranges }));
    caches.scalars.insert_shared(key, op)
}

pub(crate) fn enum_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &EnumParameter,
    ranges: Vec<RangeOpRef>,
) -> ScalarOpRef {
    if let Some(hit) = caches.scalars.get(&key) {
        return hit;
    }
    let options = decl
        .options
        .iter()
        .map(|o| EnumOption {
            value: o.value,
            name: o.name.clone(),
        })
        .collect();
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Int(decl.default),
    )
    .with_options(options);
    let op = Arc::new(ScalarOp::Parameter(ParameterOp { param, ranges }));
    caches.scalars.insert_shared(key, op)
}

pub(crate) fn color_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &ColorParameter,
    ranges: Vec<RangeOpRef>,
) -> ColorOpRef {
    if let Some(hit) = caches.colors.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Color(Color::from_array(decl.default)),
    );
    let op = Arc::new(ColorOp::Parameter(ParameterOp { param, ranges }));
    caches.colors.insert_shared(key, op)
}

pub(crate) fn string_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &StringParameter,
) -> StringOpRef {
    if let Some(hit) = caches.strings.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::String(decl.default.clone()),
    );
    let op = Arc::new(StringOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }));
    caches.strings.insert_shared(key, op)
}

pub(crate) fn matrix_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &MatrixParameter,
) -> MatrixOpRef {
    if let Some(hit) = caches.matrices.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Matrix(Matrix4::from_array(decl.default)),
    );
    let op = Arc::new(MatrixOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }));
    caches.matrices.insert_shared(key, op)
}

pub(crate) fn projector_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &ProjectorParameter,
) -> ProjectorOpRef {
    if let Some(hit) = caches.projectors.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Projector(crate::projector::projector_value(&decl.default)),
    );
    let op = Arc::new(ProjectorOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }));
    caches.projectors.insert_shared(key, op)
}

pub(crate) fn image_parameter_op(
    caches: &ParamCaches,
    sink: &DiagnosticSink,
    key: NodeKey,
    decl: &ImageParameter,
) -> ImageOpRef {
    if let Some(hit) = caches.images.get(&key) {
        return hit;
    }
    let param = Parameter::new(
        &decl.name,
        parse_uid(sink, &decl.uid, &decl.context),
        ParamValue::Image(decl.default_id),
    );
    let op = Arc::new(ImageOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }));
    caches.images.insert_shared(key, op)
}

/// Build a synthesized enumeration parameter (group selectors, table row
/// selectors). These have no source declaration node, so the caller owns
/// any caching.
pub(crate) fn synthesized_enum_parameter(
    name: &str,
    default: i32,
    options: Vec<EnumOption>,
) -> ScalarOpRef {
    let param = Parameter::new(name, ParamUid::default(), ParamValue::Int(default))
        .with_options(options);
    Arc::new(ScalarOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }))
}

/// Build a synthesized toggle parameter (toggle-each group children).
pub(crate) fn synthesized_bool_parameter(
    sink: &DiagnosticSink,
    name: &str,
    uid: &str,
    context: &MessageContext,
) -> BoolOpRef {
    let param = Parameter::new(name, parse_uid(sink, uid, context), ParamValue::Bool(false));
    Arc::new(BoolOp::Parameter(ParameterOp {
        param,
        ranges: Vec::new(),
    }))
}
