//! This crate provides the data-flow analysis core of the `Cairn`
//! project.
//!
//! The core is a library consumed by a driver: analyses and their
//! abstract domains register into an [`AnalysisManager`], which computes
//! a dependency-respecting execution order and dispatches begin-function,
//! end-function and per-statement callbacks; the shared
//! [`ProgramState`](program_state::ProgramState) threads through the
//! traversal as interned, reference-counted handles vended by the
//! [`ProgramStateManager`](program_state::ProgramStateManager).

pub mod analysis;
pub mod analysis_context;
pub mod analysis_manager;
pub mod context;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod proc_cfg;
pub mod program_state;
pub mod region;
pub mod stack_frame;
pub mod symbol;

pub use analysis::{Analysis, AnalysisDef, VisitPhase};
pub use analysis_context::AnalysisContext;
pub use analysis_manager::AnalysisManager;
pub use context::CairnContext;
pub use errors::{DfaError, DfaResult};
pub use program_state::{ProgramStateManager, StateRef};

use crate::engine::FunctionStates;
use crate::stack_frame::StackFrameManager;
use cn_ast::DeclId;

/// Runs every enabled analysis over one function to fixpoint.
///
/// # Errors
///
/// This function may generate errors resulting of CFG construction
/// (functions without a body, for instance).
pub fn analyze_function(
    mgr: &AnalysisManager,
    frames: &mut StackFrameManager,
    func: DeclId,
) -> DfaResult<FunctionStates> {
    engine::run_to_fixpoint(mgr, frames, func)
}
