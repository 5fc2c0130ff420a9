use std::error::Error;
use std::fmt::{self, Display};

use crate::ir::ProtocolMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// `ResetUnsupported` was called. This is the contractual outcome, not a bug.
    UnsupportedOperation,

    /// A method whose lowering failed was called.
    LoweringFailed,
    UnknownMethod(String),
    UnknownType(String),
    NoSuchProtocolMethod {
        class: String,
        method: ProtocolMethod,
    },
    UnknownField {
        class: String,
        field: String,
    },
    MissingReceiver,
    ArgumentCount {
        expected: usize,
        found: usize,
    },
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    NullDereference,
    DanglingReference,
    DivisionByZero,
    UnreachableExecuted,
    OutOfFuel,

    /// The host could not carry out an external call.
    Host(String),
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOperation => write!(f, "the operation is not supported"),
            Self::LoweringFailed => write!(f, "called a method whose lowering had failed"),
            Self::UnknownMethod(name) => write!(f, "unknown method `{}`", name),
            Self::UnknownType(name) => write!(f, "unknown type `{}`", name),

            Self::NoSuchProtocolMethod { class, method } => {
                write!(f, "the type `{}` does not implement `{}`", class, method)
            }

            Self::UnknownField { class, field } => {
                write!(f, "the object of type `{}` has no field `{}`", class, field)
            }

            Self::MissingReceiver => write!(f, "an instance method was called without a receiver"),

            Self::ArgumentCount { expected, found } => write!(
                f,
                "wrong number of arguments: expected {}, got {}",
                expected, found
            ),

            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, got {}", expected, found)
            }

            Self::NullDereference => write!(f, "null dereference"),
            Self::DanglingReference => write!(f, "the reference points to a freed object"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::UnreachableExecuted => write!(f, "executed an unreachable block"),
            Self::OutOfFuel => write!(f, "the execution limit was exceeded"),
            Self::Host(msg) => write!(f, "the host failed: {}", msg),
        }
    }
}

impl Error for RuntimeError {}
