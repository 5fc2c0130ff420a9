//! Live variable analysis deciding which locals get promoted to fields.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::bound::visit::BoundRecurse;
use crate::bound::{DefaultVisitor, Expr as BoundExpr, LocalSymbol, Stmt};
use crate::ir::{Block, Body, Expr, Instr, LocalId, Place, Terminator};

/// Which locals of the original method become fields of the state machine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PromotionPolicy {
    /// Only the locals whose values survive a suspension point.
    #[default]
    LiveAcrossSuspension,

    /// Every local, regardless of liveness.
    AllLocals,
}

#[derive(Debug, Clone, Default)]
struct BlockEffects {
    uses: BTreeSet<LocalId>,
    defs: BTreeSet<LocalId>,
}

impl BlockEffects {
    fn read(&mut self, local: LocalId) {
        if !self.defs.contains(&local) {
            self.uses.insert(local);
        }
    }

    fn read_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Const(_) | Expr::This | Expr::CurrentThreadId => {}
            Expr::Load(place) => self.read_place(place),

            Expr::Binary { lhs, rhs, .. } => {
                self.read_expr(lhs);
                self.read_expr(rhs);
            }

            Expr::Unary { expr, .. } => self.read_expr(expr),
            Expr::CallMethod { recv, .. } => self.read_expr(recv),

            Expr::Call { args, .. } | Expr::New { args, .. } => {
                for arg in args {
                    self.read_expr(arg);
                }
            }
        }
    }

    fn read_place(&mut self, place: &Place) {
        match place {
            Place::Local(local) => self.read(*local),
            Place::Field { obj, .. } => self.read_expr(obj),
        }
    }

    fn compute(body: &Body, block: Block) -> Self {
        let mut effects = Self::default();
        let data = &body.blocks[block];

        for instr in &data.instrs {
            match instr {
                Instr::Assign { place, value } => {
                    effects.read_expr(value);

                    match place {
                        Place::Local(local) => {
                            effects.defs.insert(*local);
                        }

                        Place::Field { obj, .. } => effects.read_expr(obj),
                    }
                }

                Instr::Eval(expr) => effects.read_expr(expr),
            }
        }

        match &data.terminator {
            Terminator::Branch { cond: expr, .. }
            | Terminator::Switch { discr: expr, .. }
            | Terminator::Return(Some(expr)) => effects.read_expr(expr),

            Terminator::Jump(_)
            | Terminator::Return(None)
            | Terminator::Fail(_)
            | Terminator::Unreachable => {}
        }

        effects
    }
}

/// Computes the set of locals live on entry to each block.
pub fn live_in(body: &Body) -> SecondaryMap<Block, BTreeSet<LocalId>> {
    let blocks = body.blocks.keys().collect::<Vec<_>>();
    let effects = blocks
        .iter()
        .map(|&block| (block, BlockEffects::compute(body, block)))
        .collect::<SecondaryMap<_, _>>();
    let mut live_in = blocks
        .iter()
        .map(|&block| (block, BTreeSet::new()))
        .collect::<SecondaryMap<_, _>>();

    let mut changed = true;

    while changed {
        changed = false;

        for &block in blocks.iter().rev() {
            let mut live = BTreeSet::new();

            for succ in body.blocks[block].terminator.successors() {
                live.extend(live_in[succ].iter().copied());
            }

            let BlockEffects { uses, defs } = &effects[block];
            live.retain(|local| !defs.contains(local));
            live.extend(uses.iter().copied());

            if live != live_in[block] {
                live_in[block] = live;
                changed = true;
            }
        }
    }

    live_in
}

#[derive(Default)]
struct LocalReads {
    reads: BTreeSet<LocalSymbol>,
    declared: BTreeSet<LocalSymbol>,
}

impl DefaultVisitor for LocalReads {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::Let { local, .. } = stmt {
            self.declared.insert(*local);
        }

        stmt.recurse(self);
    }

    fn visit_expr(&mut self, expr: &BoundExpr) {
        if let BoundExpr::Local(local) = expr {
            self.reads.insert(*local);
        }

        expr.recurse(self);
    }
}

/// Returns the locals read by `stmts` that are declared elsewhere.
pub fn outer_locals_read_by(stmts: &[Stmt]) -> BTreeSet<LocalSymbol> {
    let mut collector = LocalReads::default();
    crate::bound::visit::walk_stmts(&mut collector, stmts);

    collector
        .reads
        .difference(&collector.declared)
        .copied()
        .collect()
}
