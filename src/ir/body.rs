use serde::Serialize;
use slotmap::{new_key_type, SlotMap};

use crate::bound::{BinOp, Ty, UnOp};

use super::state::StateId;
use super::ty::{FieldName, ProtocolMethod, TypeName};

new_key_type! {
    pub struct Block;
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LocalId(u32);

impl LocalId {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub name: String,
    pub ty: Ty,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Const {
    Int(i64),
    Bool(bool),
    Null,
    Unit,
}

impl Const {
    /// The value a slot of type `ty` holds before anything is stored in it.
    pub fn default_for(ty: &Ty) -> Self {
        match ty {
            Ty::Int => Self::Int(0),
            Ty::Bool => Self::Bool(false),
            Ty::Unit => Self::Unit,
            Ty::Class(_) | Ty::Iterable(_) | Ty::Iterator(_) => Self::Null,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Place {
    Local(LocalId),
    Field { obj: Box<Expr>, field: FieldName },
}

impl Place {
    pub fn field(obj: Expr, field: FieldName) -> Self {
        Self::Field {
            obj: Box::new(obj),
            field,
        }
    }

    /// A field of the instance the method runs on.
    pub fn this_field(field: FieldName) -> Self {
        Self::field(Expr::This, field)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(Const),
    Load(Box<Place>),
    This,
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    CallMethod {
        recv: Box<Expr>,
        method: ProtocolMethod,
    },
    New {
        ty: TypeName,
        args: Vec<Expr>,
    },

    /// The identity of the thread executing the expression.
    CurrentThreadId,
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Self::Const(Const::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Const(Const::Bool(value))
    }

    pub fn state(state: StateId) -> Self {
        Self::int(state.raw())
    }

    pub fn load(place: Place) -> Self {
        Self::Load(Box::new(place))
    }

    pub fn local(local: LocalId) -> Self {
        Self::load(Place::Local(local))
    }

    pub fn this_field(field: FieldName) -> Self {
        Self::load(Place::this_field(field))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Assign { place: Place, value: Expr },
    Eval(Expr),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    UnsupportedOperation,

    /// The body of a method whose lowering was aborted.
    LoweringFailed,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Jump(Block),
    Branch {
        cond: Expr,
        then_bb: Block,
        else_bb: Block,
    },
    Switch {
        discr: Expr,
        arms: Vec<(StateId, Block)>,
        default: Block,
    },
    Return(Option<Expr>),
    Fail(FailureKind),

    /// The terminator of a block that is still under construction.
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<Block> {
        match self {
            Self::Jump(target) => vec![*target],
            Self::Branch { then_bb, else_bb, .. } => vec![*then_bb, *else_bb],

            Self::Switch { arms, default, .. } => arms
                .iter()
                .map(|&(_, block)| block)
                .chain([*default])
                .collect(),

            Self::Return(_) | Self::Fail(_) | Self::Unreachable => vec![],
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct BlockData {
    pub instrs: Vec<Instr>,
    pub terminator: Terminator,
}

impl BlockData {
    pub fn new(terminator: Terminator) -> Self {
        Self {
            instrs: vec![],
            terminator,
        }
    }
}

/// A method body in control-flow-graph form.
///
/// Parameters occupy the first `param_count` locals.
#[derive(Serialize, Debug, Clone)]
pub struct Body {
    pub locals: Vec<LocalDecl>,
    pub param_count: usize,
    pub blocks: SlotMap<Block, BlockData>,
    pub entry: Block,
}

impl Body {
    pub fn new() -> Self {
        let mut blocks = SlotMap::with_key();
        let entry = blocks.insert(BlockData::new(Terminator::Unreachable));

        Self {
            locals: vec![],
            param_count: 0,
            blocks,
            entry,
        }
    }

    /// Creates a body made of a single block with the given terminator.
    pub fn with_terminator(terminator: Terminator) -> Self {
        let mut body = Self::new();
        body.terminate(body.entry, terminator);

        body
    }

    /// Adds a parameter.
    ///
    /// Panics if a non-parameter local has already been added.
    pub fn add_param(&mut self, name: impl Into<String>, ty: Ty) -> LocalId {
        assert_eq!(
            self.param_count,
            self.locals.len(),
            "parameters must precede the locals"
        );
        self.param_count += 1;

        self.add_local(name, ty)
    }

    pub fn add_local(&mut self, name: impl Into<String>, ty: Ty) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalDecl {
            name: name.into(),
            ty,
        });

        id
    }

    pub fn params(&self) -> impl Iterator<Item = LocalId> {
        (0..self.param_count).map(|idx| LocalId(idx as u32))
    }

    pub fn add_block(&mut self) -> Block {
        self.blocks.insert(BlockData::new(Terminator::Unreachable))
    }

    pub fn push(&mut self, block: Block, instr: Instr) {
        self.blocks[block].instrs.push(instr);
    }

    pub fn assign(&mut self, block: Block, place: Place, value: Expr) {
        self.push(block, Instr::Assign { place, value });
    }

    pub fn terminate(&mut self, block: Block, terminator: Terminator) {
        self.blocks[block].terminator = terminator;
    }

    /// Returns the blocks reachable from the entry block in depth-first preorder.
    pub fn reachable_blocks(&self) -> Vec<Block> {
        let mut visited = slotmap::SecondaryMap::new();
        let mut order = vec![];
        let mut stack = vec![self.entry];

        while let Some(block) = stack.pop() {
            if visited.insert(block, ()).is_some() {
                continue;
            }

            order.push(block);

            for succ in self.blocks[block].terminator.successors().into_iter().rev() {
                if !visited.contains_key(succ) {
                    stack.push(succ);
                }
            }
        }

        order
    }

    /// Drops every block unreachable from the entry block.
    pub fn remove_unreachable_blocks(&mut self) {
        let reachable = self.reachable_blocks();
        let mut keep = slotmap::SecondaryMap::new();

        for block in reachable {
            keep.insert(block, ());
        }

        self.blocks.retain(|block, _| keep.contains_key(block));
    }

    /// Drops the locals for which `keep` returns `false` and renumbers the rest.
    ///
    /// The dropped locals must no longer be referenced by the body. Parameters are always kept.
    pub fn retain_locals(&mut self, keep: impl Fn(LocalId) -> bool) {
        let mut remap = Vec::with_capacity(self.locals.len());
        let mut locals = Vec::with_capacity(self.locals.len());

        for (idx, decl) in self.locals.drain(..).enumerate() {
            let id = LocalId(idx as u32);

            if idx < self.param_count || keep(id) {
                remap.push(Some(LocalId(locals.len() as u32)));
                locals.push(decl);
            } else {
                remap.push(None);
            }
        }

        self.locals = locals;
        self.map_places(&mut |place| match place {
            Place::Local(id) => Place::Local(
                remap[id.idx()].expect("a dropped local is still referenced by the body"),
            ),
            place => place,
        });
    }

    /// Rewrites every place of the body in-place, innermost first.
    pub fn map_places(&mut self, f: &mut impl FnMut(Place) -> Place) {
        for (_, block) in &mut self.blocks {
            for instr in &mut block.instrs {
                match instr {
                    Instr::Assign { place, value } => {
                        map_place_in_place(place, f);
                        map_places_in_expr(value, f);
                    }

                    Instr::Eval(expr) => map_places_in_expr(expr, f),
                }
            }

            match &mut block.terminator {
                Terminator::Branch { cond: expr, .. }
                | Terminator::Switch { discr: expr, .. }
                | Terminator::Return(Some(expr)) => map_places_in_expr(expr, f),

                Terminator::Jump(_)
                | Terminator::Return(None)
                | Terminator::Fail(_)
                | Terminator::Unreachable => {}
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

fn map_place_in_place(place: &mut Place, f: &mut impl FnMut(Place) -> Place) {
    if let Place::Field { obj, .. } = place {
        map_places_in_expr(obj, f);
    }

    let old = std::mem::replace(place, Place::Local(LocalId(0)));
    *place = f(old);
}

fn map_places_in_expr(expr: &mut Expr, f: &mut impl FnMut(Place) -> Place) {
    match expr {
        Expr::Const(_) | Expr::This | Expr::CurrentThreadId => {}
        Expr::Load(place) => map_place_in_place(place, f),

        Expr::Binary { lhs, rhs, .. } => {
            map_places_in_expr(lhs, f);
            map_places_in_expr(rhs, f);
        }

        Expr::Unary { expr, .. } => map_places_in_expr(expr, f),
        Expr::CallMethod { recv, .. } => map_places_in_expr(recv, f),

        Expr::Call { args, .. } | Expr::New { args, .. } => {
            for arg in args {
                map_places_in_expr(arg, f);
            }
        }
    }
}
