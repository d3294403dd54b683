//! Base types for data flow analyses.
//!
//! An analysis is a named client of the core: it installs callbacks,
//! owns one or more domains, and reads and writes the program state
//! through the analysis context during dispatch.

use crate::analysis_manager::AnalysisManager;
use crate::ids::{analysis_id, analysis_name, AnalysisKind};
use std::rc::Rc;

pub mod interval;
pub mod symbol_resolver;

/// Object-safe base of every analysis instance.
pub trait Analysis: 'static {
    fn kind(&self) -> AnalysisKind;

    fn name(&self) -> &'static str {
        analysis_name(analysis_id(self.kind()))
    }
}

/// Compile-time registration contract of a concrete analysis.
///
/// `register_callbacks` receives the shared instance and installs its
/// callbacks and domains into the manager; the closures it registers
/// capture clones of the instance handle.
pub trait AnalysisDef: Analysis + Sized {
    const KIND: AnalysisKind;

    fn register_callbacks(this: &Rc<Self>, mgr: &mut AnalysisManager);
}

/// When a per-statement callback fires relative to the driver's
/// evaluation of the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitPhase {
    Pre,
    Eval,
    Post,
}

/// Statement predicate deciding whether a callback is interested.
pub type MatchStmtFn = fn(&cn_ast::Stmt) -> bool;

/// Stock statement matchers for callback registration.
pub mod matchers {
    use cn_ast::{Stmt, StmtKind};

    pub fn any(_: &Stmt) -> bool {
        true
    }

    pub fn decl_stmt(stmt: &Stmt) -> bool {
        stmt.is_decl_stmt()
    }

    pub fn assign(stmt: &Stmt) -> bool {
        stmt.is_assign()
    }

    pub fn call(stmt: &Stmt) -> bool {
        stmt.is_call()
    }

    pub fn return_stmt(stmt: &Stmt) -> bool {
        stmt.is_return()
    }

    pub fn binding(stmt: &Stmt) -> bool {
        stmt.is_decl_stmt() || stmt.is_assign()
    }

    pub fn loop_stmt(stmt: &Stmt) -> bool {
        matches!(stmt.kind(), StmtKind::While { .. })
    }
}
