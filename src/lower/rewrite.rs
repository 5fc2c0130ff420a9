//! Suspension point lowering.
//!
//! The original statement tree is lowered into a control-flow graph where every suspension
//! point ends its block with a `return true` and the code following it starts a fresh
//! resume block. `Resume` enters through a switch on the state field that maps each state
//! onto its resume block, so no control flow ever needs to jump into the middle of a block.
//!
//! `finally` blocks are inlined at every exit of their region: falling off the end,
//! `break`/`continue` leaving the region, and `yield break`. `Dispose` gets its own copy
//! of the chain of finally blocks enclosing each suspension point.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::bound::{self, BoundMethod, LocalSymbol, Stmt, Target};
use crate::ir::{
    Block, Body, Const, Expr, FieldName, Instr, LocalId, Place, StateId, StateTable,
    SuspensionPoint, Terminator,
};

use super::error::LoweringError;
use super::fields::FieldLayout;
use super::liveness::{self, PromotionPolicy};
use super::states::StateAllocator;

#[derive(Debug, Clone)]
pub struct RewrittenBodies {
    pub resume: Body,
    pub dispose: Body,
    pub table: StateTable,
}

#[derive(Debug, Clone)]
enum LocalSlot {
    Local(LocalId),
    Field(FieldName),
}

#[derive(Debug, Clone, Copy)]
struct LoopFrame {
    break_bb: Block,
    continue_bb: Block,
    finally_depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct FinallyFrame<'m> {
    region: usize,
    body: &'m [Stmt],
}

#[derive(Debug, Clone)]
struct ResumePoint {
    state: StateId,
    block: Block,

    /// Innermost first.
    regions: Vec<usize>,
}

#[derive(Debug, Default)]
struct SuspensionCtx {
    states: StateAllocator,
    points: Vec<ResumePoint>,
}

struct BodyLowerer<'m, 'l> {
    method: &'m BoundMethod,
    layout: &'l FieldLayout,
    body: Body,
    current: Block,
    slots: Vec<Option<LocalSlot>>,
    loops: Vec<LoopFrame>,
    finally_stack: Vec<FinallyFrame<'m>>,
    regions: Vec<&'m [Stmt]>,

    /// `None` when lowering code that must not suspend.
    suspension: Option<SuspensionCtx>,
}

impl<'m, 'l> BodyLowerer<'m, 'l> {
    fn new(
        method: &'m BoundMethod,
        layout: &'l FieldLayout,
        suspension: Option<SuspensionCtx>,
    ) -> Self {
        let body = Body::new();
        let current = body.entry;

        Self {
            method,
            layout,
            body,
            current,
            slots: vec![None; method.locals.len()],
            loops: vec![],
            finally_stack: vec![],
            regions: vec![],
            suspension,
        }
    }

    fn this_field(&self, field: &FieldName) -> Place {
        Place::this_field(field.clone())
    }

    fn state_place(&self) -> Place {
        self.this_field(&self.layout.state)
    }

    fn set_state(&mut self, state: StateId) {
        let place = self.state_place();
        self.body.assign(self.current, place, Expr::state(state));
    }

    fn terminate(&mut self, terminator: Terminator) {
        self.body.terminate(self.current, terminator);
    }

    /// Ends the current block with a jump and continues in a block nothing jumps to yet.
    fn jump_away(&mut self, target: Block) {
        self.terminate(Terminator::Jump(target));
        self.current = self.body.add_block();
    }

    fn local_place(&mut self, local: LocalSymbol) -> Result<Place, LoweringError> {
        let slot = self
            .slots
            .get_mut(local.idx())
            .ok_or(LoweringError::UnknownLocal(local))?;

        let slot = match slot {
            Some(slot) => slot.clone(),

            None => {
                let decl = &self.method.locals[local.idx()];
                let id = self.body.add_local(decl.name.clone(), decl.ty.clone());
                *slot = Some(LocalSlot::Local(id));

                LocalSlot::Local(id)
            }
        };

        Ok(match slot {
            LocalSlot::Local(id) => Place::Local(id),
            LocalSlot::Field(field) => Place::this_field(field),
        })
    }

    fn lower_target(&mut self, target: &Target) -> Result<Place, LoweringError> {
        match target {
            Target::Local(local) => self.local_place(*local),

            Target::Param(param) => {
                let fields = self
                    .layout
                    .params
                    .get(param.idx())
                    .ok_or(LoweringError::UnknownParam(*param))?;

                Ok(Place::this_field(fields.proxy.clone()))
            }

            Target::Field { obj, name } => {
                Ok(Place::field(self.lower_expr(obj)?, FieldName::new(name.clone())))
            }
        }
    }

    fn lower_expr(&mut self, expr: &bound::Expr) -> Result<Expr, LoweringError> {
        Ok(match expr {
            bound::Expr::Int(value) => Expr::int(*value),
            bound::Expr::Bool(value) => Expr::bool(*value),
            bound::Expr::Local(local) => Expr::load(self.local_place(*local)?),
            bound::Expr::Param(param) => Expr::load(self.lower_target(&Target::Param(*param))?),

            bound::Expr::This => match &self.layout.receiver {
                Some(receiver) => Expr::this_field(receiver.clone()),
                None => return Err(LoweringError::ReceiverInStaticMethod),
            },

            bound::Expr::Field { obj, name } => Expr::load(Place::field(
                self.lower_expr(obj)?,
                FieldName::new(name.clone()),
            )),

            bound::Expr::Binary { op, lhs, rhs } => {
                Expr::binary(*op, self.lower_expr(lhs)?, self.lower_expr(rhs)?)
            }

            bound::Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(self.lower_expr(expr)?),
            },

            bound::Expr::Call { func, args } => Expr::Call {
                func: func.clone(),
                args: args
                    .iter()
                    .map(|arg| self.lower_expr(arg))
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    fn lower_stmts(&mut self, stmts: &'m [Stmt]) -> Result<(), LoweringError> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }

        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &'m Stmt) -> Result<(), LoweringError> {
        match stmt {
            Stmt::Block(stmts) => self.lower_stmts(stmts)?,

            Stmt::Let { local, init } => {
                let value = match init {
                    Some(init) => self.lower_expr(init)?,

                    None => {
                        let decl = self
                            .method
                            .local(*local)
                            .ok_or(LoweringError::UnknownLocal(*local))?;

                        Expr::Const(Const::default_for(&decl.ty))
                    }
                };
                let place = self.local_place(*local)?;
                self.body.assign(self.current, place, value);
            }

            Stmt::Assign { target, value } => {
                let place = self.lower_target(target)?;
                let value = self.lower_expr(value)?;
                self.body.assign(self.current, place, value);
            }

            Stmt::Expr(expr) => {
                let expr = self.lower_expr(expr)?;
                self.body.push(self.current, Instr::Eval(expr));
            }

            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(cond)?;
                let then_bb = self.body.add_block();
                let else_bb = self.body.add_block();
                let join_bb = self.body.add_block();
                self.terminate(Terminator::Branch {
                    cond,
                    then_bb,
                    else_bb,
                });

                self.current = then_bb;
                self.lower_stmts(then)?;
                self.terminate(Terminator::Jump(join_bb));

                self.current = else_bb;
                self.lower_stmts(otherwise)?;
                self.terminate(Terminator::Jump(join_bb));

                self.current = join_bb;
            }

            Stmt::While { cond, body } => {
                let header_bb = self.body.add_block();
                self.terminate(Terminator::Jump(header_bb));
                self.current = header_bb;

                let cond = self.lower_expr(cond)?;
                let body_bb = self.body.add_block();
                let exit_bb = self.body.add_block();
                self.terminate(Terminator::Branch {
                    cond,
                    then_bb: body_bb,
                    else_bb: exit_bb,
                });

                self.loops.push(LoopFrame {
                    break_bb: exit_bb,
                    continue_bb: header_bb,
                    finally_depth: self.finally_stack.len(),
                });
                self.current = body_bb;
                let result = self.lower_stmts(body);
                self.loops.pop();
                result?;

                self.terminate(Terminator::Jump(header_bb));
                self.current = exit_bb;
            }

            Stmt::Break | Stmt::Continue => {
                let frame = *self.loops.last().ok_or(LoweringError::JumpOutsideLoop)?;
                self.exit_regions(frame.finally_depth)?;

                self.jump_away(match stmt {
                    Stmt::Break => frame.break_bb,
                    _ => frame.continue_bb,
                });
            }

            Stmt::Yield(value) => {
                let value = self.lower_expr(value)?;
                self.suspend(value)?;
            }

            Stmt::YieldBreak => {
                if self.suspension.is_none() {
                    return Err(LoweringError::JumpOutOfFinally);
                }

                self.exit_regions(0)?;
                self.finish();
                self.current = self.body.add_block();
            }

            Stmt::Try { body, finally } => {
                let region = self.regions.len();
                self.regions.push(finally);

                self.finally_stack.push(FinallyFrame {
                    region,
                    body: finally,
                });
                let result = self.lower_stmts(body);
                self.finally_stack.pop();
                result?;

                self.lower_stmts(finally)?;
            }
        }

        Ok(())
    }

    /// Emits `current := value; state := k; return true` and continues in the resume block of `k`.
    fn suspend(&mut self, value: Expr) -> Result<(), LoweringError> {
        let regions = self
            .finally_stack
            .iter()
            .rev()
            .map(|frame| frame.region)
            .collect::<Vec<_>>();
        let Some(suspension) = &mut self.suspension else {
            return Err(LoweringError::SuspensionInFinally);
        };
        let state = suspension.states.allocate();
        trace!(%state, ?regions, "lowering a suspension point");

        let current = self.this_field(&self.layout.current);
        self.body.assign(self.current, current, value);
        self.set_state(state);
        self.terminate(Terminator::Return(Some(Expr::bool(true))));

        let resume_bb = self.body.add_block();
        self.current = resume_bb;
        self.set_state(StateId::Finished);

        if let Some(suspension) = &mut self.suspension {
            suspension.points.push(ResumePoint {
                state,
                block: resume_bb,
                regions,
            });
        }

        Ok(())
    }

    /// Emits `state := -1; return false`.
    fn finish(&mut self) {
        let already_finished = matches!(
            self.body.blocks[self.current].instrs.last(),
            Some(Instr::Assign { place, value })
                if *place == self.state_place() && *value == Expr::state(StateId::Finished)
        );

        if !already_finished {
            self.set_state(StateId::Finished);
        }

        self.terminate(Terminator::Return(Some(Expr::bool(false))));
    }

    /// Runs the finally blocks of the regions being left, innermost first.
    fn exit_regions(&mut self, down_to: usize) -> Result<(), LoweringError> {
        let saved = self.finally_stack.clone();
        let mut result = Ok(());

        while self.finally_stack.len() > down_to {
            let Some(frame) = self.finally_stack.pop() else {
                break;
            };

            result = self.lower_stmts(frame.body);

            if result.is_err() {
                break;
            }
        }

        self.finally_stack = saved;

        result
    }
}

/// Rewrites the method body into the bodies of `Resume` and `Dispose`.
///
/// Locals the bodies need across suspension points are added to `layout`.
pub fn rewrite(
    method: &BoundMethod,
    layout: &mut FieldLayout,
    policy: PromotionPolicy,
) -> Result<RewrittenBodies, LoweringError> {
    let (mut resume, slots, regions, points) = {
        let mut lowerer = BodyLowerer::new(method, layout, Some(SuspensionCtx::default()));

        // one body local per symbol, in declaration order
        for local in method.local_symbols() {
            lowerer.local_place(local)?;
        }

        let dispatch_bb = lowerer.body.entry;
        let start_bb = lowerer.body.add_block();
        lowerer.current = start_bb;
        lowerer.set_state(StateId::Finished);
        lowerer.lower_stmts(&method.body)?;

        // falling off the end is a terminal suspension
        lowerer.finish();

        let finished_bb = lowerer.body.add_block();
        lowerer
            .body
            .terminate(finished_bb, Terminator::Return(Some(Expr::bool(false))));

        let points = lowerer.suspension.take().unwrap_or_default().points;
        let arms = [(StateId::Start, start_bb)]
            .into_iter()
            .chain(points.iter().map(|point| (point.state, point.block)))
            .collect();
        let discr = Expr::load(lowerer.state_place());
        lowerer.body.terminate(
            dispatch_bb,
            Terminator::Switch {
                discr,
                arms,
                default: finished_bb,
            },
        );
        lowerer.body.remove_unreachable_blocks();

        (lowerer.body, lowerer.slots, lowerer.regions, points)
    };

    let promoted = select_promoted(method, &resume, &points, &regions, &slots, policy);
    debug!(
        suspension_points = points.len(),
        promoted = promoted.len(),
        "rewrote the body"
    );

    let mut promoted_ids = BTreeSet::new();

    for &local in &promoted {
        let field = layout.hoist(method, local)?;

        if let Some(Some(LocalSlot::Local(id))) = slots.get(local.idx()) {
            promoted_ids.insert(*id);
            let id = *id;

            resume.map_places(&mut |place| match place {
                Place::Local(local) if local == id => Place::this_field(field.clone()),
                place => place,
            });
        }
    }

    resume.retain_locals(|id| !promoted_ids.contains(&id));

    let (table, chains) = build_state_table(&points);
    let dispose = build_dispose(method, layout, &regions, &chains)?;

    Ok(RewrittenBodies {
        resume,
        dispose,
        table,
    })
}

fn select_promoted(
    method: &BoundMethod,
    resume: &Body,
    points: &[ResumePoint],
    regions: &[&[Stmt]],
    slots: &[Option<LocalSlot>],
    policy: PromotionPolicy,
) -> BTreeSet<LocalSymbol> {
    if policy == PromotionPolicy::AllLocals {
        return method.local_symbols().collect();
    }

    let live_in = liveness::live_in(resume);
    let mut promoted = BTreeSet::new();

    for point in points {
        if let Some(live) = live_in.get(point.block) {
            promoted.extend(method.local_symbols().filter(|local| {
                matches!(&slots[local.idx()], Some(LocalSlot::Local(id)) if live.contains(id))
            }));
        }

        // Dispose may run these finally blocks in place of the rest of the body
        for &region in &point.regions {
            promoted.extend(liveness::outer_locals_read_by(regions[region]));
        }
    }

    promoted
}

/// Numbers the regions enclosing suspension points densely, in order of first appearance.
///
/// Returns the table along with the region chains keyed by the dense numbers, each mapped
/// to the original region index.
fn build_state_table(points: &[ResumePoint]) -> (StateTable, Vec<(StateId, Vec<usize>)>) {
    let mut dense = IndexMap::new();
    let mut table = StateTable::default();
    let mut chains = Vec::with_capacity(points.len());

    for point in points {
        let regions = point
            .regions
            .iter()
            .map(|&region| {
                let next = dense.len();
                *dense.entry(region).or_insert(next)
            })
            .collect();

        table.points.push(SuspensionPoint {
            state: point.state,
            regions,
        });
        chains.push((point.state, point.regions.clone()));
    }

    table.regions = dense.len();

    (table, chains)
}

/// Builds `Dispose`: run the finally chain of the current state, then mark the instance finished.
fn build_dispose(
    method: &BoundMethod,
    layout: &FieldLayout,
    regions: &[&[Stmt]],
    chains: &[(StateId, Vec<usize>)],
) -> Result<Body, LoweringError> {
    let mut lowerer = BodyLowerer::new(method, layout, None);

    for (local, field) in &layout.hoisted {
        if let Some(slot) = lowerer.slots.get_mut(local.idx()) {
            *slot = Some(LocalSlot::Field(field.clone()));
        }
    }

    let dispatch_bb = lowerer.body.entry;
    let noop_bb = lowerer.body.add_block();
    lowerer.body.terminate(noop_bb, Terminator::Return(None));

    let mut groups: IndexMap<&[usize], Vec<StateId>> = IndexMap::new();
    groups.entry(&[]).or_default().push(StateId::Start);

    for (state, chain) in chains {
        groups.entry(chain.as_slice()).or_default().push(*state);
    }

    let mut arms = vec![];

    for (chain, states) in groups {
        let bb = lowerer.body.add_block();
        lowerer.current = bb;

        for &region in chain {
            lowerer.lower_stmts(regions[region])?;
        }

        lowerer.set_state(StateId::Finished);
        lowerer.terminate(Terminator::Return(None));

        arms.extend(states.into_iter().map(|state| (state, bb)));
    }

    let discr = Expr::load(lowerer.state_place());
    lowerer.body.terminate(
        dispatch_bb,
        Terminator::Switch {
            discr,
            arms,
            default: noop_bb,
        },
    );
    lowerer.body.remove_unreachable_blocks();

    Ok(lowerer.body)
}
