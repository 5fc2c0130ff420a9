//! The artifacts synthesized by the lowering pass.

pub mod body;
mod display;
pub mod state;
pub mod ty;

pub use body::{Block, BlockData, Body, Const, Expr, FailureKind, Instr, LocalId, Place, Terminator};
pub use display::SignatureDisplay;
pub use state::StateId;
pub use ty::{
    BaseType, CapabilitySet, FieldDef, FieldName, FieldRole, MethodDef, ProtocolMethod,
    StateMachineType, StateTable, SuspensionPoint, TypeName,
};
