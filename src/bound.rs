//! The bound method model consumed by the lowering pass.
//!
//! Name binding and type checking happen upstream: by the time a method gets here, every
//! local and parameter reference has been resolved to a symbol and every expression is
//! well-typed. The pass never mutates these trees.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub mod visit;

pub use visit::{DefaultVisitor, Visitor};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Bool,
    Unit,
    Class(String),
    Iterable(Box<Ty>),
    Iterator(Box<Ty>),
}

impl Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Unit => write!(f, "unit"),
            Self::Class(name) => write!(f, "{}", name),
            Self::Iterable(elem) => write!(f, "iterable<{}>", elem),
            Self::Iterator(elem) => write!(f, "iterator<{}>", elem),
        }
    }
}

/// The declared return shape of a method, as far as the iterator lowering is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape<'a> {
    Iterable(&'a Ty),
    Iterator(&'a Ty),
    Other,
}

impl Ty {
    pub fn return_shape(&self) -> ReturnShape<'_> {
        match self {
            Self::Iterable(elem) => ReturnShape::Iterable(elem),
            Self::Iterator(elem) => ReturnShape::Iterator(elem),
            _ => ReturnShape::Other,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LocalSymbol(pub u32);

impl LocalSymbol {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ParamSymbol(pub u32);

impl ParamSymbol {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub name: String,
    pub ty: Ty,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BoundMethod {
    pub name: String,
    pub container: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub params: Vec<Param>,
    pub ret: Ty,
    #[serde(default)]
    pub locals: Vec<LocalDecl>,
    pub body: Vec<Stmt>,
}

impl BoundMethod {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.container, self.name)
    }

    pub fn param(&self, param: ParamSymbol) -> Option<&Param> {
        self.params.get(param.idx())
    }

    pub fn local(&self, local: LocalSymbol) -> Option<&LocalDecl> {
        self.locals.get(local.idx())
    }

    pub fn local_symbols(&self) -> impl Iterator<Item = LocalSymbol> + '_ {
        (0..self.locals.len()).map(|idx| LocalSymbol(idx as u32))
    }

    pub fn param_symbols(&self) -> impl Iterator<Item = ParamSymbol> + '_ {
        (0..self.params.len()).map(|idx| ParamSymbol(idx as u32))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundProgram {
    pub methods: Vec<BoundMethod>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Let {
        local: LocalSymbol,
        #[serde(default)]
        init: Option<Expr>,
    },
    Assign {
        target: Target,
        value: Expr,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,

    /// Produces a value and suspends until the next resumption.
    Yield(Expr),

    /// Signals that no more values will be produced.
    YieldBreak,

    Try {
        body: Vec<Stmt>,
        finally: Vec<Stmt>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local(LocalSymbol),
    Param(ParamSymbol),
    Field { obj: Expr, name: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Local(LocalSymbol),
    Param(ParamSymbol),
    This,
    Field {
        obj: Box<Expr>,
        name: String,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },

    /// A call to a function outside of the method being lowered.
    Call {
        func: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            func: func.into(),
            args,
        }
    }

    pub fn field(obj: Expr, name: impl Into<String>) -> Self {
        Self::Field {
            obj: Box::new(obj),
            name: name.into(),
        }
    }
}
