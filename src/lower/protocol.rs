//! The protocol methods that don't depend on the shape of the original body.

use indexmap::IndexMap;

use crate::bound::Ty;
use crate::ir::{
    Body, CapabilitySet, Expr, FailureKind, MethodDef, ProtocolMethod, Terminator, TypeName,
};

use super::fields::FieldLayout;
use super::reuse::build_get_iterator;
use super::rewrite::RewrittenBodies;

/// The element type of the untyped enumeration view.
pub const UNTYPED_ELEM: &str = "Object";

/// Assembles the protocol methods in their canonical order.
pub fn build_protocol(
    name: &TypeName,
    capabilities: CapabilitySet,
    elem_ty: &Ty,
    layout: &FieldLayout,
    bodies: RewrittenBodies,
) -> IndexMap<ProtocolMethod, MethodDef> {
    let mut methods = IndexMap::new();

    if capabilities.is_iterable() {
        methods.insert(
            ProtocolMethod::GetIterator,
            build_get_iterator(name, elem_ty, layout),
        );
        methods.insert(ProtocolMethod::GetIteratorUntyped, build_get_iterator_untyped());
    }

    methods.insert(
        ProtocolMethod::Resume,
        MethodDef {
            ret: Ty::Bool,
            body: bodies.resume,
        },
    );
    methods.insert(
        ProtocolMethod::Dispose,
        MethodDef {
            ret: Ty::Unit,
            body: bodies.dispose,
        },
    );
    methods.insert(ProtocolMethod::CurrentValue, build_current_value(elem_ty, layout));
    methods.insert(
        ProtocolMethod::ResetUnsupported,
        MethodDef {
            ret: Ty::Unit,
            body: Body::with_terminator(Terminator::Fail(FailureKind::UnsupportedOperation)),
        },
    );

    methods
}

fn build_current_value(elem_ty: &Ty, layout: &FieldLayout) -> MethodDef {
    MethodDef {
        ret: elem_ty.clone(),
        body: Body::with_terminator(Terminator::Return(Some(Expr::this_field(
            layout.current.clone(),
        )))),
    }
}

fn build_get_iterator_untyped() -> MethodDef {
    MethodDef {
        ret: Ty::Iterator(Box::new(Ty::Class(UNTYPED_ELEM.into()))),
        body: Body::with_terminator(Terminator::Return(Some(Expr::CallMethod {
            recv: Box::new(Expr::This),
            method: ProtocolMethod::GetIterator,
        }))),
    }
}
