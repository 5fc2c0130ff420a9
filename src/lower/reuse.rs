use crate::bound::{BinOp, Ty};
use crate::ir::{Body, Expr, MethodDef, Place, StateId, Terminator, TypeName};

use super::fields::FieldLayout;

/// Builds `GetIterator`.
///
/// The instance hands itself out if it hasn't started yet and is asked on the thread that
/// created it. Any other request gets a fresh instance. Either way the iterator receives
/// the captured receiver and its own copy of every argument.
pub fn build_get_iterator(name: &TypeName, elem_ty: &Ty, layout: &FieldLayout) -> MethodDef {
    let ret = Ty::Iterator(Box::new(elem_ty.clone()));
    let mut body = Body::new();
    let result = body.add_local("result", ret.clone());

    let entry = body.entry;
    let reuse_bb = body.add_block();
    let fresh_bb = body.add_block();
    let copy_bb = body.add_block();

    let not_started = Expr::binary(
        BinOp::Eq,
        Expr::this_field(layout.state.clone()),
        Expr::state(StateId::NotStarted),
    );
    let cond = match &layout.thread {
        Some(thread) => Expr::binary(
            BinOp::And,
            not_started,
            Expr::binary(
                BinOp::Eq,
                Expr::this_field(thread.clone()),
                Expr::CurrentThreadId,
            ),
        ),

        None => not_started,
    };
    body.terminate(
        entry,
        Terminator::Branch {
            cond,
            then_bb: reuse_bb,
            else_bb: fresh_bb,
        },
    );

    body.assign(
        reuse_bb,
        Place::this_field(layout.state.clone()),
        Expr::state(StateId::Start),
    );
    body.assign(reuse_bb, Place::Local(result), Expr::This);
    body.terminate(reuse_bb, Terminator::Jump(copy_bb));

    body.assign(
        fresh_bb,
        Place::Local(result),
        Expr::New {
            ty: name.clone(),
            args: vec![Expr::state(StateId::Start)],
        },
    );
    body.terminate(fresh_bb, Terminator::Jump(copy_bb));

    if let Some(receiver) = &layout.receiver {
        body.assign(
            copy_bb,
            Place::field(Expr::local(result), receiver.clone()),
            Expr::this_field(receiver.clone()),
        );
    }

    for param in &layout.params {
        if let Some(init) = &param.init {
            body.assign(
                copy_bb,
                Place::field(Expr::local(result), param.proxy.clone()),
                Expr::this_field(init.clone()),
            );
        }
    }

    body.terminate(copy_bb, Terminator::Return(Some(Expr::local(result))));

    MethodDef { ret, body }
}
