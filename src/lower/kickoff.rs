//! The bodies that replace the original iterator methods.

use crate::bound::BoundMethod;
use crate::ir::{Body, CapabilitySet, Expr, FailureKind, Place, Terminator, TypeName};

use super::fields::FieldLayout;

fn add_params(body: &mut Body, method: &BoundMethod) {
    for param in &method.params {
        body.add_param(param.name.clone(), param.ty.clone());
    }
}

/// Builds the kickoff body: construct the state machine, capture everything it needs, return it.
pub fn build_kickoff(
    method: &BoundMethod,
    name: &TypeName,
    capabilities: CapabilitySet,
    layout: &FieldLayout,
) -> Body {
    let mut body = Body::new();
    add_params(&mut body, method);
    let params = body.params().collect::<Vec<_>>();
    let instance = body.add_local("instance", method.ret.clone());
    let entry = body.entry;

    body.assign(
        entry,
        Place::Local(instance),
        Expr::New {
            ty: name.clone(),
            args: vec![Expr::state(capabilities.initial_state())],
        },
    );

    if let Some(receiver) = &layout.receiver {
        body.assign(
            entry,
            Place::field(Expr::local(instance), receiver.clone()),
            Expr::This,
        );
    }

    for (fields, param) in layout.params.iter().zip(params) {
        // iterables keep the arguments pristine for every iterator they hand out
        let field = fields.init.as_ref().unwrap_or(&fields.proxy);
        body.assign(
            entry,
            Place::field(Expr::local(instance), field.clone()),
            Expr::local(param),
        );
    }

    body.terminate(entry, Terminator::Return(Some(Expr::local(instance))));

    body
}

/// Builds the body substituted for a method whose lowering failed.
pub fn stub_body(method: &BoundMethod) -> Body {
    let mut body = Body::with_terminator(Terminator::Fail(FailureKind::LoweringFailed));
    add_params(&mut body, method);

    body
}
