//! Consistency checks run around the body rewriter.

use std::collections::HashSet;

use crate::bound::visit::BoundRecurse;
use crate::bound::{BoundMethod, DefaultVisitor, Expr, LocalSymbol, ParamSymbol, Stmt};
use crate::ir::{Body, StateId, StateTable, Terminator};
use crate::try_match;

use super::error::LoweringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Loop,
    Finally,
}

struct BodyChecker<'m> {
    method: &'m BoundMethod,
    scopes: Vec<Scope>,
    suspension_points: usize,
    error: Option<LoweringError>,
}

impl BodyChecker<'_> {
    fn fail(&mut self, error: LoweringError) {
        self.error.get_or_insert(error);
    }

    fn in_finally(&self) -> bool {
        self.scopes.contains(&Scope::Finally)
    }

    fn check_loop_jump(&mut self) {
        match self.scopes.last() {
            Some(Scope::Loop) => {}
            // a loop enclosing the finally block doesn't count
            Some(Scope::Finally) => self.fail(LoweringError::JumpOutOfFinally),
            None => self.fail(LoweringError::JumpOutsideLoop),
        }
    }

    fn with_scope(&mut self, scope: Scope, stmts: &[Stmt]) {
        self.scopes.push(scope);

        for stmt in stmts {
            self.visit_stmt(stmt);
        }

        self.scopes.pop();
    }
}

impl DefaultVisitor for BodyChecker<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Yield(_) if self.in_finally() => self.fail(LoweringError::SuspensionInFinally),
            Stmt::YieldBreak if self.in_finally() => self.fail(LoweringError::JumpOutOfFinally),

            Stmt::Yield(value) => {
                self.suspension_points += 1;
                self.visit_expr(value);
            }

            Stmt::Break | Stmt::Continue => self.check_loop_jump(),

            Stmt::While { cond, body } => {
                self.visit_expr(cond);
                self.with_scope(Scope::Loop, body);
            }

            Stmt::Try { body, finally } => {
                for stmt in body {
                    self.visit_stmt(stmt);
                }

                self.with_scope(Scope::Finally, finally);
            }

            _ => stmt.recurse(self),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if *expr == Expr::This && self.method.is_static {
            self.fail(LoweringError::ReceiverInStaticMethod);
        }

        expr.recurse(self);
    }

    fn visit_local(&mut self, local: &LocalSymbol) {
        if self.method.local(*local).is_none() {
            self.fail(LoweringError::UnknownLocal(*local));
        }
    }

    fn visit_param(&mut self, param: &ParamSymbol) {
        if self.method.param(*param).is_none() {
            self.fail(LoweringError::UnknownParam(*param));
        }
    }
}

/// Checks that the method body is something the rewriter can lower.
///
/// Returns the number of value-producing suspension points.
pub fn check_method(method: &BoundMethod) -> Result<usize, LoweringError> {
    let mut checker = BodyChecker {
        method,
        scopes: vec![],
        suspension_points: 0,
        error: None,
    };
    checker.visit_method(method);

    match checker.error {
        Some(error) => Err(error),
        None => Ok(checker.suspension_points),
    }
}

/// Checks that every suspension point got a unique state and the entry dispatch of `resume`
/// covers each of them.
pub fn check_dispatch(
    resume: &Body,
    table: &StateTable,
    expected: usize,
) -> Result<(), LoweringError> {
    if table.points.len() != expected {
        return Err(LoweringError::StateCountMismatch {
            expected,
            allocated: table.points.len(),
        });
    }

    let mut seen = HashSet::new();

    for state in table.states() {
        if !seen.insert(state) || !state.is_resumable() {
            return Err(LoweringError::NumberingCollision(state));
        }
    }

    let arms = try_match!(
        &resume.blocks[resume.entry].terminator,
        Terminator::Switch { arms, .. } => arms
    )
    .ok_or(LoweringError::DispatchMissing(StateId::Start))?;
    let dispatched = arms.iter().map(|&(state, _)| state).collect::<HashSet<_>>();

    if dispatched.len() != arms.len() {
        let mut seen = HashSet::new();
        let duplicate = arms
            .iter()
            .map(|&(state, _)| state)
            .find(|state| !seen.insert(*state))
            .unwrap_or(StateId::Start);

        return Err(LoweringError::NumberingCollision(duplicate));
    }

    for state in [StateId::Start].into_iter().chain(table.states()) {
        if !dispatched.contains(&state) {
            return Err(LoweringError::DispatchMissing(state));
        }
    }

    Ok(())
}
