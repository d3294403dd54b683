//! Per-traversal analysis context.

use crate::context::CairnContext;
use crate::program_state::StateRef;
use crate::region::RegionManager;
use crate::stack_frame::StackFrame;
use crate::symbol::SymbolManager;
use cn_ast::{AstContext, SourceManager};
use std::cell::RefMut;
use std::rc::Rc;

/// The scratch state a callback sees: the current program state, the
/// current stack frame, and read-through accessors to the ambient
/// session services.
///
/// `set_state` and `set_current_stack_frame` are the only mutators;
/// callbacks read the state, build a new one through the state manager,
/// and write the handle back.
pub struct AnalysisContext<'ctx> {
    ctx: &'ctx CairnContext,
    state: StateRef,
    frame: Option<Rc<StackFrame>>,
}

impl<'ctx> AnalysisContext<'ctx> {
    #[must_use]
    pub fn new(ctx: &'ctx CairnContext, initial_state: StateRef) -> Self {
        Self {
            ctx,
            state: initial_state,
            frame: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &StateRef {
        &self.state
    }

    pub fn set_state(&mut self, state: StateRef) {
        self.state = state;
    }

    #[must_use]
    pub fn current_stack_frame(&self) -> Option<&Rc<StackFrame>> {
        self.frame.as_ref()
    }

    pub fn set_current_stack_frame(&mut self, frame: Rc<StackFrame>) {
        self.frame = Some(frame);
    }

    #[must_use]
    pub fn ast_context(&self) -> &'ctx AstContext {
        self.ctx.ast()
    }

    #[must_use]
    pub fn source_manager(&self) -> &'ctx SourceManager {
        self.ctx.source_manager()
    }

    pub fn region_manager(&self) -> RefMut<'ctx, RegionManager> {
        self.ctx.regions()
    }

    pub fn symbol_manager(&self) -> RefMut<'ctx, SymbolManager> {
        self.ctx.symbols()
    }
}
