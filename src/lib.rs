//! # `Cairn`
//!
//! `cairn` is the main crate of the `Cairn` data-flow analysis project.
//! The project is subdivided into multiple crates, `cairn` acts as entry
//! point by reexporting important structs and functions from those
//! sub-crates. Most of the reexports are done within the
//! `cairn::prelude` namespace.
//!
//! ## Library basics
//!
//! A driver builds (or receives from a front-end) an AST through
//! [`cn_ast`], wires the analyses it wants into an `AnalysisManager`,
//! and runs functions to fixpoint:
//!
//! ```rust
//! use cairn::prelude::*;
//! use std::rc::Rc;
//!
//! let mut ast = AstContext::new();
//! let x = ast.var("x", Ty::Int);
//! let one = ast.int_lit(1);
//! let bind = ast.decl_stmt(x, Some(one));
//! let main = ast.function("main", vec![]);
//! ast.set_function_body(main, vec![bind]);
//!
//! let ctx = Rc::new(CairnContext::new(
//!     Rc::new(ast),
//!     Rc::new(SourceManager::new()),
//! ));
//! let mut mgr = AnalysisManager::new(Rc::clone(&ctx));
//! let resolver = mgr.register_analysis(SymbolResolver::new());
//! let intervals = mgr.register_analysis(IntervalAnalysis::new());
//! mgr.set_analysis_privileged::<SymbolResolver>()?;
//! mgr.add_analysis_dependency(
//!     analysis_id(AnalysisKind::Interval),
//!     analysis_id(AnalysisKind::SymbolResolver),
//! )?;
//! mgr.compute_required_by_dependencies();
//! mgr.compute_full_order_after_registry()?;
//! mgr.enable_analysis(resolver)?;
//! mgr.enable_analysis(intervals)?;
//!
//! let mut frames = StackFrameManager::new();
//! let states = cairn::dfa::analyze_function(&mgr, &mut frames, main)?;
//! assert!(!states.exits.is_empty());
//! # Ok::<(), CairnError>(())
//! ```
//!
//! ## Sub-crates
//!
//! The `Cairn` project is divided into several crates:
//!
//!  - [`cn_ast`] contains the C-family AST handles, source locations and
//!    the arena front-ends build translation units in,
//!  - [`cn_dfa`] contains the analysis core: the analysis manager and
//!    scheduler, the hash-consed program state store, the abstract
//!    domain interface and the fixpoint engine.

mod errors;

pub use cn_ast as ast;
pub use cn_dfa as dfa;

/// Reexport module of commonly used structures and functions from
/// `Cairn` project sub-crates:
///
/// ```rust
/// use cairn::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{CairnError, CairnResult};

    pub use cn_dfa::analysis::interval::IntervalAnalysis;
    pub use cn_dfa::analysis::symbol_resolver::SymbolResolver;
    pub use cn_dfa::analysis::{matchers, Analysis, AnalysisDef, VisitPhase};
    pub use cn_dfa::domain::interval::{Itv, ItvDom};
    pub use cn_dfa::domain::{AbsDom, Dom};
    pub use cn_dfa::engine::FunctionStates;
    pub use cn_dfa::ids::{
        analysis_id, analysis_name, domain_id, domain_name, AnalysisId, AnalysisKind, DomainId,
        DomainKind,
    };
    pub use cn_dfa::stack_frame::StackFrameManager;
    pub use cn_dfa::{
        AnalysisContext, AnalysisManager, CairnContext, DfaError, DfaResult, ProgramStateManager,
        StateRef,
    };

    pub use cn_ast::{AstContext, SourceManager, Ty};

    /// Initialises the process logger from the `CAIRN_LOG` environment,
    /// optionally forced to debug or trace verbosity.
    pub fn init_logger(debug: bool, trace: bool) {
        let env = env_logger::Env::new()
            .filter_or("CAIRN_LOG", "info")
            .write_style("CAIRN_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if trace {
            builder.filter_level(log::LevelFilter::Trace);
        } else if debug {
            builder.filter_level(log::LevelFilter::Debug);
        }
        let _ = builder.try_init();
    }
}
