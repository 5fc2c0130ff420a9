use std::borrow::Borrow;
use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::Serialize;

use crate::bound::{LocalSymbol, ParamSymbol, Ty};

use super::body::Body;
use super::state::StateId;

macro_rules! define_name {
    ($( $(#[$attr:meta])* pub struct $name:ident; )+) => {
        $(
            $(#[$attr])*
            #[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn new(name: impl Into<String>) -> Self {
                    Self(name.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl Borrow<str> for $name {
                fn borrow(&self) -> &str {
                    &self.0
                }
            }

            impl From<&str> for $name {
                fn from(name: &str) -> Self {
                    Self::new(name)
                }
            }
        )+
    };
}

define_name! {
    pub struct TypeName;
    pub struct FieldName;
}

/// The capabilities a state machine type exposes, decided once when the type is synthesized.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilitySet {
    /// Can produce fresh iterators and serve as its own first iterator.
    IterableIterator,
    IteratorOnly,
}

impl CapabilitySet {
    pub fn is_iterable(self) -> bool {
        self == Self::IterableIterator
    }

    /// The state a freshly constructed instance starts in when returned by the original method.
    pub fn initial_state(self) -> StateId {
        match self {
            Self::IterableIterator => StateId::NotStarted,
            Self::IteratorOnly => StateId::Start,
        }
    }
}

impl Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterableIterator => write!(f, "iterable + iterator"),
            Self::IteratorOnly => write!(f, "iterator"),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    /// An opaque reference type with no inherited behavior.
    Object,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    State,
    Current,
    ThreadAffinity,
    Receiver,

    /// The working copy of a parameter used by the body.
    ParamProxy(ParamSymbol),

    /// The argument as passed to the original method, copied into the working proxy of
    /// every iterator handed out.
    ParamInit(ParamSymbol),

    /// A local that lives across a suspension point.
    Hoisted(LocalSymbol),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: FieldName,
    pub ty: Ty,
    pub role: FieldRole,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolMethod {
    GetIterator,
    GetIteratorUntyped,
    Resume,
    Dispose,
    CurrentValue,
    ResetUnsupported,
}

impl ProtocolMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::GetIterator => "GetIterator",
            Self::GetIteratorUntyped => "GetIteratorUntyped",
            Self::Resume => "Resume",
            Self::Dispose => "Dispose",
            Self::CurrentValue => "CurrentValue",
            Self::ResetUnsupported => "ResetUnsupported",
        }
    }
}

impl Display for ProtocolMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct MethodDef {
    pub ret: Ty,
    pub body: Body,
}

/// A suspension point of the lowered body along with the exception regions enclosing it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SuspensionPoint {
    pub state: StateId,

    /// Indices into [`StateTable::regions`], innermost first.
    pub regions: Vec<usize>,
}

/// Bookkeeping produced by the body rewriter.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTable {
    pub points: Vec<SuspensionPoint>,

    /// The number of `try`/`finally` regions enclosing at least one suspension point.
    pub regions: usize,
}

impl StateTable {
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.points.iter().map(|point| point.state)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct StateMachineType {
    pub name: TypeName,
    pub base: BaseType,
    pub capabilities: CapabilitySet,
    pub elem_ty: Ty,
    pub fields: IndexMap<FieldName, FieldDef>,
    pub ctor: MethodDef,
    pub methods: IndexMap<ProtocolMethod, MethodDef>,
    pub states: StateTable,
}

impl StateMachineType {
    pub fn field_by_role(&self, role: FieldRole) -> Option<&FieldDef> {
        self.fields.values().find(|field| field.role == role)
    }

    pub fn method(&self, method: ProtocolMethod) -> Option<&MethodDef> {
        self.methods.get(&method)
    }
}
