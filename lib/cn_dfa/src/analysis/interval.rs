//! Interval analysis.
//!
//! Owns the interval environment domain and evaluates binding
//! statements into it. Depends on the symbol resolver so that region
//! bindings exist by the time intervals are recorded.

use crate::analysis::{matchers, Analysis, AnalysisDef, VisitPhase};
use crate::analysis_context::AnalysisContext;
use crate::analysis_manager::AnalysisManager;
use crate::domain::interval::{Itv, ItvDom};
use crate::domain::{Dom, Dump};
use crate::ids::{analysis_id, AnalysisKind};
use cn_ast::{BinOp, Stmt, StmtId, StmtKind, UnOp};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct IntervalAnalysis;

impl IntervalAnalysis {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Analysis for IntervalAnalysis {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Interval
    }
}

impl AnalysisDef for IntervalAnalysis {
    const KIND: AnalysisKind = AnalysisKind::Interval;

    fn register_callbacks(this: &Rc<Self>, mgr: &mut AnalysisManager) {
        let id = analysis_id(Self::KIND);
        mgr.add_domain_dependency::<Self, ItvDom>();

        mgr.register_begin_function(
            id,
            Box::new(|ctx| {
                if let Some(frame) = ctx.current_stack_frame() {
                    let name = ctx.ast_context().decl(frame.decl()).name().to_string();
                    log::debug!("interval analysis enters `{name}`");
                }
            }),
        );

        let me = Rc::clone(this);
        mgr.register_stmt(
            id,
            Box::new(move |stmt, ctx| me.eval_binding(stmt, ctx)),
            matchers::binding,
            VisitPhase::Eval,
        );

        mgr.register_end_function(
            id,
            Box::new(|_exit, ctx| {
                if let Some(env) = ctx.state().get_dom::<ItvDom>() {
                    log::debug!("intervals at function exit: {}", Dump(env));
                }
            }),
        );
    }
}

impl IntervalAnalysis {
    fn eval_binding(&self, stmt: &Stmt, ctx: &mut AnalysisContext) {
        let (target, value) = match stmt.kind() {
            StmtKind::Decl { decl, init } => (*decl, *init),
            StmtKind::Assign { target, value } => (*target, Some(*value)),
            _ => return,
        };
        let ast = ctx.ast_context();
        let region = ctx.region_manager().region_of_decl(ast.decl(target));
        let Some(region) = region else {
            return;
        };

        let mut env = ctx
            .state()
            .get_dom::<ItvDom>()
            .cloned()
            .unwrap_or_else(ItvDom::default_val);
        let itv = match value {
            Some(value) => self.eval_expr(value, &env, ctx),
            None => Itv::top(),
        };
        log::trace!("interval {} := {}", region, itv);
        env.set(region.id(), itv);
        let state = ctx.state().set_dom(env);
        ctx.set_state(state);
    }

    fn eval_expr(&self, sid: StmtId, env: &ItvDom, ctx: &AnalysisContext) -> Itv {
        let ast = ctx.ast_context();
        match ast.stmt(sid).kind() {
            StmtKind::IntLit(v) => Itv::singleton(*v),
            StmtKind::DeclRef(decl) => ctx
                .region_manager()
                .region_of_decl(ast.decl(*decl))
                .map(|region| env.get(region.id()))
                .unwrap_or_else(Itv::top),
            StmtKind::Unary { op, operand } => match op {
                UnOp::Neg => self.eval_expr(*operand, env, ctx).neg(),
                UnOp::Not => Itv::of(0, 1),
            },
            StmtKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval_expr(*lhs, env, ctx);
                let rhs = self.eval_expr(*rhs, env, ctx);
                match op {
                    BinOp::Add => lhs.add(rhs),
                    BinOp::Sub => lhs.sub(rhs),
                    BinOp::Mul => lhs.mul(rhs),
                    BinOp::Div => Itv::top(),
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
                        Itv::of(0, 1)
                    }
                }
            }
            _ => Itv::top(),
        }
    }
}
