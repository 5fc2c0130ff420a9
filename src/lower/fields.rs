//! Field allocation and the constructor of the state machine type.

use indexmap::IndexMap;
use tracing::trace;

use crate::bound::{BoundMethod, LocalSymbol, Ty};
use crate::ir::{
    Body, CapabilitySet, Expr, FieldDef, FieldName, FieldRole, MethodDef, Place, Terminator,
};

use super::error::LoweringError;

pub const STATE_FIELD: &str = "$state";
pub const CURRENT_FIELD: &str = "$current";
pub const THREAD_FIELD: &str = "$thread";
pub const RECEIVER_FIELD: &str = "$this";

#[derive(Debug, Clone)]
pub struct ParamFields {
    pub proxy: FieldName,
    pub init: Option<FieldName>,
}

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub fields: IndexMap<FieldName, FieldDef>,
    pub state: FieldName,
    pub current: FieldName,
    pub thread: Option<FieldName>,
    pub receiver: Option<FieldName>,
    pub params: Vec<ParamFields>,
    pub hoisted: IndexMap<LocalSymbol, FieldName>,
}

impl FieldLayout {
    /// Allocates the fields known before the body is rewritten.
    ///
    /// The order is fixed: state, current value, thread affinity, receiver, parameters.
    pub fn new(
        method: &BoundMethod,
        capabilities: CapabilitySet,
        elem_ty: &Ty,
        thread_identity: bool,
    ) -> Result<Self, LoweringError> {
        let mut fields = IndexMap::new();
        let mut add = |name: FieldName, ty: Ty, role: FieldRole| {
            add_field(&mut fields, name, ty, role)
        };

        let state = add(STATE_FIELD.into(), Ty::Int, FieldRole::State)?;
        let current = add(CURRENT_FIELD.into(), elem_ty.clone(), FieldRole::Current)?;
        let thread = (capabilities.is_iterable() && thread_identity)
            .then(|| add(THREAD_FIELD.into(), Ty::Int, FieldRole::ThreadAffinity))
            .transpose()?;
        let receiver = (!method.is_static)
            .then(|| {
                add(
                    RECEIVER_FIELD.into(),
                    Ty::Class(method.container.clone()),
                    FieldRole::Receiver,
                )
            })
            .transpose()?;

        let mut params = Vec::with_capacity(method.params.len());

        for (symbol, param) in method.param_symbols().zip(&method.params) {
            let proxy = add(
                FieldName::new(param.name.clone()),
                param.ty.clone(),
                FieldRole::ParamProxy(symbol),
            )?;
            let init = capabilities
                .is_iterable()
                .then(|| {
                    add(
                        FieldName::new(format!("$init.{}", param.name)),
                        param.ty.clone(),
                        FieldRole::ParamInit(symbol),
                    )
                })
                .transpose()?;

            params.push(ParamFields { proxy, init });
        }

        Ok(Self {
            fields,
            state,
            current,
            thread,
            receiver,
            params,
            hoisted: IndexMap::new(),
        })
    }

    /// Adds a field holding the local across suspension points.
    pub fn hoist(
        &mut self,
        method: &BoundMethod,
        local: LocalSymbol,
    ) -> Result<FieldName, LoweringError> {
        if let Some(name) = self.hoisted.get(&local) {
            return Ok(name.clone());
        }

        let decl = method.local(local).ok_or(LoweringError::UnknownLocal(local))?;
        let name = add_field(
            &mut self.fields,
            FieldName::new(format!("{}${}", decl.name, local.0)),
            decl.ty.clone(),
            FieldRole::Hoisted(local),
        )?;
        self.hoisted.insert(local, name.clone());

        Ok(name)
    }

    pub fn into_fields(self) -> IndexMap<FieldName, FieldDef> {
        self.fields
    }
}

fn add_field(
    fields: &mut IndexMap<FieldName, FieldDef>,
    name: FieldName,
    ty: Ty,
    role: FieldRole,
) -> Result<FieldName, LoweringError> {
    if fields.contains_key(&name) {
        return Err(LoweringError::FieldCollision(name));
    }

    trace!(%name, %ty, ?role, "allocating a field");
    fields.insert(name.clone(), FieldDef { name: name.clone(), ty, role });

    Ok(name)
}

/// Builds the constructor, which takes the initial state as its only parameter.
///
/// Captured values are stored by the callers, not here.
pub fn build_ctor(layout: &FieldLayout) -> MethodDef {
    let mut body = Body::new();
    let initial_state = body.add_param("initial_state", Ty::Int);
    let entry = body.entry;

    body.assign(
        entry,
        Place::this_field(layout.state.clone()),
        Expr::local(initial_state),
    );

    if let Some(thread) = &layout.thread {
        body.assign(entry, Place::this_field(thread.clone()), Expr::CurrentThreadId);
    }

    body.terminate(entry, Terminator::Return(None));

    MethodDef {
        ret: Ty::Unit,
        body,
    }
}
