use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::Serialize;
use slotmap::new_key_type;

use crate::ir::Const;

use super::error::RuntimeError;

new_key_type! {
    pub struct ObjectId;
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Ref(ObjectId),
    Null,
    Unit,
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Ref(_) => "reference",
            Self::Null => "null",
            Self::Unit => "unit",
        }
    }

    fn mismatch(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match *self {
            Self::Int(value) => Ok(value),
            _ => Err(self.mismatch("int")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match *self {
            Self::Bool(value) => Ok(value),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn as_object(&self) -> Result<ObjectId, RuntimeError> {
        match *self {
            Self::Ref(id) => Ok(id),
            Self::Null => Err(RuntimeError::NullDereference),
            _ => Err(self.mismatch("reference")),
        }
    }
}

impl From<Const> for Value {
    fn from(value: Const) -> Self {
        match value {
            Const::Int(value) => Self::Int(value),
            Const::Bool(value) => Self::Bool(value),
            Const::Null => Self::Null,
            Const::Unit => Self::Unit,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Ref(id) => write!(f, "<object {:?}>", id),
            Self::Null => write!(f, "null"),
            Self::Unit => write!(f, "()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub class: String,
    pub fields: IndexMap<String, Value>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: IndexMap::new(),
        }
    }
}
