//! Symbol resolution analysis.
//!
//! Privileged analysis that gives every binding statement a symbolic
//! expression and records it in the auxiliary state maps, where later
//! analyses can look values up by region or by statement.

use crate::analysis::{matchers, Analysis, AnalysisDef, VisitPhase};
use crate::analysis_context::AnalysisContext;
use crate::analysis_manager::AnalysisManager;
use crate::ids::{analysis_id, AnalysisKind};
use crate::symbol::SExprRef;
use cn_ast::{DeclId, Stmt, StmtId, StmtKind};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct SymbolResolver;

impl SymbolResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Analysis for SymbolResolver {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::SymbolResolver
    }
}

impl AnalysisDef for SymbolResolver {
    const KIND: AnalysisKind = AnalysisKind::SymbolResolver;

    fn register_callbacks(this: &Rc<Self>, mgr: &mut AnalysisManager) {
        let id = analysis_id(Self::KIND);
        let me = Rc::clone(this);
        mgr.register_stmt(
            id,
            Box::new(move |stmt, ctx| me.resolve_stmt(stmt, ctx)),
            matchers::any,
            VisitPhase::Eval,
        );
    }
}

impl SymbolResolver {
    fn resolve_stmt(&self, stmt: &Stmt, ctx: &mut AnalysisContext) {
        match stmt.kind() {
            StmtKind::Decl { decl, init } => {
                let sexpr = match init {
                    Some(init) => self.resolve_expr(*init, ctx),
                    None => ctx.symbol_manager().conjure(stmt.id()),
                };
                self.bind(*decl, stmt.id(), sexpr, ctx);
            }
            StmtKind::Assign { target, value } => {
                let sexpr = self.resolve_expr(*value, ctx);
                self.bind(*target, stmt.id(), sexpr, ctx);
            }
            StmtKind::Call { .. } => {
                // An unknown callee can produce anything.
                let sym = ctx.symbol_manager().conjure(stmt.id());
                let state = ctx.state().set_stmt_sexpr(stmt.id(), sym);
                ctx.set_state(state);
            }
            _ => {}
        }
    }

    fn bind(&self, decl: DeclId, stmt: StmtId, sexpr: SExprRef, ctx: &mut AnalysisContext) {
        let ast = ctx.ast_context();
        let region = ctx.region_manager().region_of_decl(ast.decl(decl));
        let Some(region) = region else {
            return;
        };
        log::trace!("resolve {} := {}", region, sexpr);
        let state = ctx
            .state()
            .set_region_sexpr(region.id(), Rc::clone(&sexpr))
            .set_stmt_sexpr(stmt, sexpr);
        ctx.set_state(state);
    }

    fn resolve_expr(&self, sid: StmtId, ctx: &AnalysisContext) -> SExprRef {
        let ast = ctx.ast_context();
        match ast.stmt(sid).kind() {
            StmtKind::IntLit(v) => ctx.symbol_manager().int_const(*v),
            StmtKind::DeclRef(decl) => {
                let region = ctx.region_manager().region_of_decl(ast.decl(*decl));
                match region {
                    Some(region) => ctx
                        .state()
                        .get_region_sexpr(region.id())
                        .cloned()
                        .unwrap_or_else(|| ctx.symbol_manager().region_val(region.id())),
                    None => ctx.symbol_manager().conjure(sid),
                }
            }
            StmtKind::Unary { op, operand } => {
                let operand = self.resolve_expr(*operand, ctx);
                ctx.symbol_manager().unary(*op, operand)
            }
            StmtKind::Binary { op, lhs, rhs } => {
                let lhs = self.resolve_expr(*lhs, ctx);
                let rhs = self.resolve_expr(*rhs, ctx);
                ctx.symbol_manager().binary(*op, lhs, rhs)
            }
            _ => ctx.symbol_manager().conjure(sid),
        }
    }
}
