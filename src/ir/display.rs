use std::fmt::{self, Display, Write};

use itertools::Itertools;
use slotmap::SecondaryMap;

use crate::util::Indented;

use super::body::{Block, Body, Const, Expr, Instr, LocalId, Place, Terminator};
use super::ty::StateMachineType;

impl Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.idx())
    }
}

impl Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Null => write!(f, "null"),
            Self::Unit => write!(f, "()"),
        }
    }
}

impl Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(local) => write!(f, "{}", local),
            Self::Field { obj, field } => write!(f, "{}.{}", obj, field),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => write!(f, "{}", value),
            Self::Load(place) => write!(f, "{}", place),
            Self::This => write!(f, "this"),
            Self::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Self::Unary { op, expr } => write!(f, "{}{}", op.symbol(), expr),
            Self::Call { func, args } => write!(f, "{}({})", func, args.iter().join(", ")),
            Self::CallMethod { recv, method } => write!(f, "{}.{}()", recv, method),
            Self::New { ty, args } => write!(f, "new {}({})", ty, args.iter().join(", ")),
            Self::CurrentThreadId => write!(f, "current_thread_id()"),
        }
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign { place, value } => write!(f, "{} = {}", place, value),
            Self::Eval(expr) => write!(f, "{}", expr),
        }
    }
}

struct TerminatorDisplay<'a> {
    terminator: &'a Terminator,
    labels: &'a SecondaryMap<Block, usize>,
}

impl TerminatorDisplay<'_> {
    fn label(&self, block: Block) -> String {
        match self.labels.get(block) {
            Some(idx) => format!("bb{}", idx),
            None => "bb?".to_owned(),
        }
    }
}

impl Display for TerminatorDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terminator {
            Terminator::Jump(target) => write!(f, "jump {}", self.label(*target)),

            Terminator::Branch {
                cond,
                then_bb,
                else_bb,
            } => write!(
                f,
                "branch {} then {} else {}",
                cond,
                self.label(*then_bb),
                self.label(*else_bb)
            ),

            Terminator::Switch {
                discr,
                arms,
                default,
            } => write!(
                f,
                "switch {} [{}] else {}",
                discr,
                arms.iter()
                    .map(|&(state, block)| format!("{} => {}", state.raw(), self.label(block)))
                    .join(", "),
                self.label(*default)
            ),

            Terminator::Return(None) => write!(f, "return"),
            Terminator::Return(Some(value)) => write!(f, "return {}", value),
            Terminator::Fail(kind) => write!(f, "fail {:?}", kind),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self
            .blocks
            .keys()
            .enumerate()
            .map(|(idx, block)| (block, idx))
            .collect::<SecondaryMap<_, _>>();

        for (idx, local) in self.locals.iter().enumerate() {
            let kind = if idx < self.param_count { "param" } else { "local" };
            writeln!(f, "{} _{}: {} ({})", kind, idx, local.ty, local.name)?;
        }

        for (block, data) in &self.blocks {
            let entry = if block == self.entry { " (entry)" } else { "" };
            writeln!(f, "bb{}{}:", labels[block], entry)?;

            for instr in &data.instrs {
                writeln!(f, "    {}", instr)?;
            }

            writeln!(
                f,
                "    {}",
                TerminatorDisplay {
                    terminator: &data.terminator,
                    labels: &labels,
                }
            )?;
        }

        Ok(())
    }
}

/// Displays the shape of a state machine type without method bodies.
pub struct SignatureDisplay<'a>(&'a StateMachineType);

impl Display for SignatureDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.0;

        writeln!(
            f,
            "type {}: {:?} [{}] of {} {{",
            ty.name, ty.base, ty.capabilities, ty.elem_ty
        )?;

        for field in ty.fields.values() {
            writeln!(f, "    field {}: {}", field.name, field.ty)?;
        }

        let ctor_params = ty
            .ctor
            .body
            .params()
            .map(|param| &ty.ctor.body.locals[param.idx()].ty)
            .join(", ");
        writeln!(f, "    ctor({})", ctor_params)?;

        for (method, def) in &ty.methods {
            writeln!(f, "    method {}() -> {}", method, def.ret)?;
        }

        write!(f, "}}")
    }
}

impl StateMachineType {
    pub fn signature(&self) -> SignatureDisplay<'_> {
        SignatureDisplay(self)
    }
}

impl Display for StateMachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.signature())?;

        writeln!(f, "ctor:")?;
        write!(Indented::new(f), "{}", self.ctor.body)?;

        for (method, def) in &self.methods {
            writeln!(f, "{}:", method)?;
            write!(Indented::new(f), "{}", def.body)?;
        }

        Ok(())
    }
}
