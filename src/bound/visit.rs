use super::*;

pub trait BoundRecurse {
    fn recurse<V: DefaultVisitor>(&self, visitor: &mut V);
}

macro_rules! define_visitor {
    ($( $type:ident { $( $name:ident ( $arg:ident : $ty:ty ) );+ $(;)? } )+) => {
        pub trait Visitor
        where
            Self: Sized,
        {
            type Output;

            $(
                $(
                    fn $name(&mut self, $arg: &$ty) -> Self::Output;
                )+
            )+
        }

        pub trait DefaultVisitor
        where
            Self: Sized,
        {
            $( define_visitor!(@ $type { $( $name ( $arg : &$ty ); )+ } ); )+
        }

        impl<T> Visitor for T
        where
            T: DefaultVisitor,
        {
            type Output = ();

            $(
                $(
                    fn $name(&mut self, $arg: &$ty) {
                        <Self as DefaultVisitor>::$name(self, $arg);
                    }
                )+
            )+
        }
    };

    (@ NonTerminal { $( $name:ident ( $arg:ident : $ty:ty ); )+ }) => {
        $(
            fn $name(&mut self, $arg: $ty) {
                $arg.recurse(self);
            }
        )+
    };

    (@ Terminal { $( $name:ident ( $arg:ident : $ty:ty ); )+ }) => {
        $(
            #[allow(unused_variables)]
            fn $name(&mut self, $arg: $ty) {}
        )+
    };
}

define_visitor! {
    NonTerminal {
        visit_method(method: BoundMethod);
        visit_stmt(stmt: Stmt);
        visit_target(target: Target);
        visit_expr(expr: Expr);
    }

    Terminal {
        visit_local(local: LocalSymbol);
        visit_param(param: ParamSymbol);
    }
}

/// Walks a statement list with the given visitor.
pub fn walk_stmts<V: DefaultVisitor>(visitor: &mut V, stmts: &[Stmt]) {
    for stmt in stmts {
        DefaultVisitor::visit_stmt(visitor, stmt);
    }
}

impl BoundRecurse for BoundMethod {
    fn recurse<V: DefaultVisitor>(&self, visitor: &mut V) {
        walk_stmts(visitor, &self.body);
    }
}

impl BoundRecurse for Stmt {
    fn recurse<V: DefaultVisitor>(&self, visitor: &mut V) {
        match self {
            Stmt::Block(stmts) => walk_stmts(visitor, stmts),

            Stmt::Let { local, init } => {
                visitor.visit_local(local);

                if let Some(init) = init {
                    visitor.visit_expr(init);
                }
            }

            Stmt::Assign { target, value } => {
                visitor.visit_target(target);
                visitor.visit_expr(value);
            }

            Stmt::Expr(expr) | Stmt::Yield(expr) => visitor.visit_expr(expr),

            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                visitor.visit_expr(cond);
                walk_stmts(visitor, then);
                walk_stmts(visitor, otherwise);
            }

            Stmt::While { cond, body } => {
                visitor.visit_expr(cond);
                walk_stmts(visitor, body);
            }

            Stmt::Break | Stmt::Continue | Stmt::YieldBreak => {}

            Stmt::Try { body, finally } => {
                walk_stmts(visitor, body);
                walk_stmts(visitor, finally);
            }
        }
    }
}

impl BoundRecurse for Target {
    fn recurse<V: DefaultVisitor>(&self, visitor: &mut V) {
        match self {
            Target::Local(local) => visitor.visit_local(local),
            Target::Param(param) => visitor.visit_param(param),
            Target::Field { obj, .. } => visitor.visit_expr(obj),
        }
    }
}

impl BoundRecurse for Expr {
    fn recurse<V: DefaultVisitor>(&self, visitor: &mut V) {
        match self {
            Expr::Int(_) | Expr::Bool(_) | Expr::This => {}
            Expr::Local(local) => visitor.visit_local(local),
            Expr::Param(param) => visitor.visit_param(param),
            Expr::Field { obj, .. } => visitor.visit_expr(obj),

            Expr::Binary { lhs, rhs, .. } => {
                visitor.visit_expr(lhs);
                visitor.visit_expr(rhs);
            }

            Expr::Unary { expr, .. } => visitor.visit_expr(expr),

            Expr::Call { args, .. } => {
                for arg in args {
                    visitor.visit_expr(arg);
                }
            }
        }
    }
}
