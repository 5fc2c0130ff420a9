//! Iterator-method lowering: turns methods containing suspension points into state machines.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::bound::BoundMethod;
use crate::errors::Diagnostics;
use crate::ir::{BaseType, Body, StateMachineType, TypeName};

pub mod error;
pub mod fields;
pub mod kickoff;
pub mod liveness;
pub mod protocol;
pub mod reuse;
pub mod rewrite;
pub mod states;
pub mod synth;
pub mod validate;

pub use error::LoweringError;
pub use liveness::PromotionPolicy;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Whether the target exposes the identity of the current thread.
    pub thread_identity: bool,
    pub promotion: PromotionPolicy,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            thread_identity: true,
            promotion: Default::default(),
        }
    }
}

/// Produces deterministic names for the synthesized types.
#[derive(Debug, Default)]
pub struct NameAllocator {
    next: IndexMap<String, usize>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, method: &BoundMethod) -> TypeName {
        let method = method.qualified_name();
        let ordinal = self.next.entry(method.clone()).or_default();
        let name = TypeName::new(format!("{}$iter{}", method, ordinal));
        *ordinal += 1;

        name
    }
}

/// A method of the output program.
#[derive(Serialize, Debug, Clone)]
pub struct LoweredMethod {
    pub name: String,
    pub container: String,
    pub is_static: bool,

    /// The type synthesized for the method, if its lowering succeeded.
    pub state_machine: Option<TypeName>,
    pub body: Body,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct LoweringOutput {
    pub types: IndexMap<TypeName, StateMachineType>,

    /// Keyed by the qualified method name.
    pub methods: IndexMap<String, LoweredMethod>,
}

impl LoweringOutput {
    pub fn method(&self, name: &str) -> Option<&LoweredMethod> {
        self.methods.get(name)
    }

    pub fn state_machine_of(&self, name: &str) -> Option<&StateMachineType> {
        self.method(name)?
            .state_machine
            .as_ref()
            .and_then(|ty| self.types.get(ty))
    }
}

/// Lowers a single iterator method.
///
/// Returns the synthesized type along with the body replacing the original one.
#[instrument(skip_all, fields(method = %method.qualified_name(), ty = %name))]
pub fn lower_iterator_method(
    method: &BoundMethod,
    name: TypeName,
    options: &LoweringOptions,
) -> Result<(StateMachineType, Body), LoweringError> {
    let (capabilities, elem_ty) = synth::select_capabilities(&method.ret)?;
    let suspension_points = validate::check_method(method)?;
    debug!(%capabilities, %elem_ty, suspension_points, "synthesizing a state machine");

    let mut layout =
        fields::FieldLayout::new(method, capabilities, &elem_ty, options.thread_identity)?;
    let bodies = rewrite::rewrite(method, &mut layout, options.promotion)?;
    validate::check_dispatch(&bodies.resume, &bodies.table, suspension_points)?;

    let kickoff = kickoff::build_kickoff(method, &name, capabilities, &layout);
    let ctor = fields::build_ctor(&layout);
    let states = bodies.table.clone();
    let methods = protocol::build_protocol(&name, capabilities, &elem_ty, &layout, bodies);

    let ty = StateMachineType {
        name,
        base: BaseType::Object,
        capabilities,
        elem_ty,
        fields: layout.into_fields(),
        ctor,
        methods,
        states,
    };

    Ok((ty, kickoff))
}

/// Lowers every method of the program.
///
/// A method whose lowering fails is reported as an internal error and gets a body that fails
/// when called. The remaining methods are still lowered.
pub fn lower_methods(
    methods: &[BoundMethod],
    options: &LoweringOptions,
    diagnostics: &mut Diagnostics<'_>,
) -> LoweringOutput {
    let mut names = NameAllocator::new();
    let mut output = LoweringOutput::default();

    for method in methods {
        let qualified_name = method.qualified_name();
        let name = names.allocate(method);

        let (state_machine, body) = match lower_iterator_method(method, name, options) {
            Ok((ty, body)) => {
                let name = ty.name.clone();
                output.types.insert(name.clone(), ty);

                (Some(name), body)
            }

            Err(e) => {
                diagnostics
                    .internal()
                    .with_method(qualified_name.clone())
                    .with_error(e)
                    .emit();

                (None, kickoff::stub_body(method))
            }
        };

        output.methods.insert(
            qualified_name,
            LoweredMethod {
                name: method.name.clone(),
                container: method.container.clone(),
                is_static: method.is_static,
                state_machine,
                body,
            },
        );
    }

    output
}
