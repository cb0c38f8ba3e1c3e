//! Boolean IR construction helpers.
//!
//! Reachability conditions are threaded through the first pass as
//! `Option<BoolOpRef>`, where `None` means "unconditionally reachable".
//! These helpers keep that convention in one place.

use std::sync::Arc;

use morph_ir::{BoolOp, BoolOpRef, ScalarOpRef};

pub(crate) fn const_bool(value: bool) -> BoolOpRef {
    Arc::new(BoolOp::Constant(value))
}

pub(crate) fn and(a: BoolOpRef, b: BoolOpRef) -> BoolOpRef {
    Arc::new(BoolOp::And {
        a: Some(a),
        b: Some(b),
    })
}

pub(crate) fn or(a: BoolOpRef, b: BoolOpRef) -> BoolOpRef {
    Arc::new(BoolOp::Or {
        a: Some(a),
        b: Some(b),
    })
}

pub(crate) fn not(a: BoolOpRef) -> BoolOpRef {
    Arc::new(BoolOp::Not(a))
}

pub(crate) fn enum_equals(selector: &ScalarOpRef, value: i32) -> BoolOpRef {
    Arc::new(BoolOp::EnumEquals {
        selector: Arc::clone(selector),
        value,
    })
}

/// AND of two optional conditions; `None` operands are unconditional.
pub(crate) fn and_opt(a: Option<BoolOpRef>, b: Option<BoolOpRef>) -> Option<BoolOpRef> {
    match (a, b) {
        (Some(a), Some(b)) => Some(and(a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// OR of two optional conditions; `None` operands mean "never true"
/// here, which is the accumulator identity when folding activators.
pub(crate) fn or_opt(a: Option<BoolOpRef>, b: Option<BoolOpRef>) -> Option<BoolOpRef> {
    match (a, b) {
        (Some(a), Some(b)) => Some(or(a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_opt_treats_none_as_unconditional() {
        let c = const_bool(true);
        assert!(and_opt(None, None).is_none());
        let kept = and_opt(Some(Arc::clone(&c)), None);
        assert!(matches!(kept.as_deref(), Some(BoolOp::Constant(true))));
        let combined = and_opt(Some(Arc::clone(&c)), Some(c));
        assert!(matches!(combined.as_deref(), Some(BoolOp::And { .. })));
    }

    #[test]
    fn enum_equals_keeps_selector_shared() {
        let selector: ScalarOpRef = Arc::new(morph_ir::ScalarOp::Constant(morph_ir::Real(2.0)));
        let a = enum_equals(&selector, 0);
        let b = enum_equals(&selector, 1);
        let (sa, sb) = match (&*a, &*b) {
            (
                BoolOp::EnumEquals { selector: sa, .. },
                BoolOp::EnumEquals { selector: sb, .. },
            ) => (sa, sb),
            _ => unreachable!(),
        };
        assert!(Arc::ptr_eq(sa, sb));
    }
}
