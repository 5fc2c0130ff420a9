use std::error::Error;
use std::fmt::{self, Display};

use crate::bound::{LocalSymbol, ParamSymbol, Ty};
use crate::ir::{FieldName, StateId};

/// An internal-consistency fault detected while lowering a method.
///
/// None of these can be caused by a program that passed semantic analysis: each one means
/// an earlier stage or the pass itself is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoweringError {
    UnexpectedReturnShape(Ty),
    SuspensionInFinally,
    JumpOutOfFinally,
    JumpOutsideLoop,
    UnknownLocal(LocalSymbol),
    UnknownParam(ParamSymbol),
    ReceiverInStaticMethod,

    /// The rewriter allocated a different number of states than the body has suspension points.
    StateCountMismatch {
        expected: usize,
        allocated: usize,
    },
    NumberingCollision(StateId),
    DispatchMissing(StateId),

    /// Two synthesized fields were given the same name.
    FieldCollision(FieldName),
}

impl Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedReturnShape(ty) => write!(
                f,
                "the return type `{}` is neither an iterable nor an iterator",
                ty
            ),

            Self::SuspensionInFinally => {
                write!(f, "encountered a suspension point inside a finally block")
            }

            Self::JumpOutOfFinally => write!(f, "control leaves a finally block"),
            Self::JumpOutsideLoop => write!(f, "encountered a loop jump outside of a loop"),
            Self::UnknownLocal(local) => write!(f, "unknown local symbol #{}", local.0),
            Self::UnknownParam(param) => write!(f, "unknown parameter symbol #{}", param.0),

            Self::ReceiverInStaticMethod => {
                write!(f, "the receiver is referenced in a static method")
            }

            Self::StateCountMismatch {
                expected,
                allocated,
            } => write!(
                f,
                "found {} suspension points but allocated {} states",
                expected, allocated
            ),

            Self::NumberingCollision(state) => {
                write!(f, "the state {} was assigned more than once", state)
            }

            Self::DispatchMissing(state) => {
                write!(f, "the dispatch table has no entry for the state {}", state)
            }

            Self::FieldCollision(name) => {
                write!(f, "the field `{}` was allocated more than once", name)
            }
        }
    }
}

impl Error for LoweringError {}
