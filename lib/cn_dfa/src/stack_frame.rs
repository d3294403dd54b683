//! Stack frames of the current analysis.

use crate::errors::DfaResult;
use crate::proc_cfg::{NodeRef, ProcCfg};
use cn_ast::{AstContext, DeclId, StmtId};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Where a child frame was entered from.
#[derive(Debug, Clone, Copy)]
pub struct CallSiteInfo {
    /// The call expression.
    pub callsite: StmtId,
    /// The CFG node of the caller holding the call.
    pub node: NodeRef,
    /// Index of the call inside that node's statement run.
    pub stmt_idx: usize,
}

/// One function activation on the abstract call stack.
#[derive(Debug)]
pub struct StackFrame {
    decl: DeclId,
    parent: Option<Rc<StackFrame>>,
    call_site: Option<CallSiteInfo>,
}

impl StackFrame {
    #[must_use]
    pub fn decl(&self) -> DeclId {
        self.decl
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Rc<StackFrame>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn is_top_frame(&self) -> bool {
        self.parent.is_none()
    }

    /// The call site this frame was entered from.
    ///
    /// # Panics
    ///
    /// Panics on the top frame, which has no call site.
    #[must_use]
    pub fn call_site(&self) -> &CallSiteInfo {
        self.call_site
            .as_ref()
            .expect("top frame has no call site info")
    }

    /// Walks the parent chain of `other` looking for `self`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &StackFrame) -> bool {
        let mut cur = other.parent.as_deref();
        while let Some(frame) = cur {
            if std::ptr::eq(self, frame) {
                return true;
            }
            cur = frame.parent.as_deref();
        }
        false
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.call_site {
            None => write!(f, "frame({})", self.decl),
            Some(site) => write!(f, "frame({}) from {}", self.decl, site.callsite),
        }
    }
}

/// Creates stack frames and caches one CFG per analysed function.
#[derive(Debug, Default)]
pub struct StackFrameManager {
    cfgs: BTreeMap<DeclId, Rc<ProcCfg>>,
}

impl StackFrameManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached CFG of `decl`, if one was built.
    #[must_use]
    pub fn cfg(&self, decl: DeclId) -> Option<Rc<ProcCfg>> {
        self.cfgs.get(&decl).map(Rc::clone)
    }

    fn ensure_cfg(&mut self, ast: &AstContext, decl: DeclId) -> DfaResult<Rc<ProcCfg>> {
        if let Some(cfg) = self.cfgs.get(&decl) {
            return Ok(Rc::clone(cfg));
        }
        let cfg = Rc::new(ProcCfg::build(ast, decl)?);
        self.cfgs.insert(decl, Rc::clone(&cfg));
        Ok(cfg)
    }

    /// Creates the frame of an analysis entry function.
    ///
    /// # Errors
    ///
    /// Fails when no CFG can be built for `decl`.
    pub fn create_top_frame(
        &mut self,
        ast: &AstContext,
        decl: DeclId,
    ) -> DfaResult<Rc<StackFrame>> {
        self.ensure_cfg(ast, decl)?;
        Ok(Rc::new(StackFrame {
            decl,
            parent: None,
            call_site: None,
        }))
    }

    /// Creates the frame of `callee` entered from `call_site` in `parent`.
    ///
    /// # Errors
    ///
    /// Fails when no CFG can be built for `callee`.
    pub fn create_from_site(
        &mut self,
        ast: &AstContext,
        parent: Rc<StackFrame>,
        callee: DeclId,
        call_site: CallSiteInfo,
    ) -> DfaResult<Rc<StackFrame>> {
        self.ensure_cfg(ast, callee)?;
        Ok(Rc::new(StackFrame {
            decl: callee,
            parent: Some(parent),
            call_site: Some(call_site),
        }))
    }
}
