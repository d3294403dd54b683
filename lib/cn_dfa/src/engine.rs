//! Intra-procedural forward fixpoint iterator.
//!
//! Drives the analysis manager's dispatch entry points over one
//! function's CFG until the per-block states stop changing. Interning
//! makes the change check a pointer comparison.

use crate::analysis_context::AnalysisContext;
use crate::analysis_manager::AnalysisManager;
use crate::errors::{DfaError, DfaResult};
use crate::proc_cfg::{NodeRef, ProcCfg};
use crate::program_state::{ProgramStateManager, StateRef};
use crate::stack_frame::{StackFrame, StackFrameManager};
use cn_ast::DeclId;
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

/// Loop-head revisits tolerated before widening takes over.
const WIDENING_DELAY: u32 = 4;

/// Fixpoint result: entry and exit states of every reachable block.
#[derive(Debug)]
pub struct FunctionStates {
    pub entries: BTreeMap<NodeRef, StateRef>,
    pub exits: BTreeMap<NodeRef, StateRef>,
}

/// Runs one function to fixpoint.
///
/// # Errors
///
/// Fails when no CFG can be built for `func`.
pub fn run_to_fixpoint(
    mgr: &AnalysisManager,
    frames: &mut StackFrameManager,
    func: DeclId,
) -> DfaResult<FunctionStates> {
    IntraProceduralFixpoint::new(mgr, frames, func)?.run()
}

/// Forward worklist iterator over one procedure.
pub struct IntraProceduralFixpoint<'a> {
    mgr: &'a AnalysisManager,
    state_mgr: ProgramStateManager,
    frame: Rc<StackFrame>,
    cfg: Rc<ProcCfg>,
}

impl<'a> IntraProceduralFixpoint<'a> {
    /// Builds the iterator for `func`: its top frame, its CFG and a
    /// fresh state manager seeded from the required analyses.
    ///
    /// # Errors
    ///
    /// Fails when no CFG can be built for `func`.
    pub fn new(
        mgr: &'a AnalysisManager,
        frames: &mut StackFrameManager,
        func: DeclId,
    ) -> DfaResult<Self> {
        let frame = frames.create_top_frame(mgr.context().ast(), func)?;
        let cfg = frames
            .cfg(func)
            .ok_or_else(|| DfaError::Internal(format!("no CFG cached for {func}")))?;
        Ok(Self {
            mgr,
            state_mgr: ProgramStateManager::new(mgr),
            frame,
            cfg,
        })
    }

    #[must_use]
    pub fn state_manager(&self) -> &ProgramStateManager {
        &self.state_mgr
    }

    #[must_use]
    pub fn cfg(&self) -> &Rc<ProcCfg> {
        &self.cfg
    }

    /// Iterates to fixpoint and returns the per-block state tables.
    ///
    /// # Errors
    ///
    /// Currently infallible once constructed; kept fallible for drivers
    /// that layer checks on top.
    pub fn run(&self) -> DfaResult<FunctionStates> {
        let ast = self.mgr.context().ast();
        let mut ctx =
            AnalysisContext::new(self.mgr.context().as_ref(), self.state_mgr.default_state());
        ctx.set_current_stack_frame(Rc::clone(&self.frame));

        self.mgr.run_begin_function(&mut ctx);
        let begin_state = ctx.state().clone();

        let graph = self.cfg.graph();

        // For forward dataflow, optimal order is reverse postorder;
        // the postorder is reversed by popping from the back.
        let mut worklist: VecDeque<NodeRef> = VecDeque::new();
        let mut postorder = DfsPostOrder::new(graph, self.cfg.entry());
        while let Some(node) = postorder.next(graph) {
            worklist.push_back(node);
        }

        let mut entries: BTreeMap<NodeRef, StateRef> = BTreeMap::new();
        let mut exits: BTreeMap<NodeRef, StateRef> = BTreeMap::new();
        let mut visits: BTreeMap<NodeRef, u32> = BTreeMap::new();

        while let Some(node) = worklist.pop_back() {
            log::debug!("    ---- block #{}", node.index());

            // Recompose the entry state from the exits of the already
            // computed predecessors.
            let computed: Vec<NodeRef> = graph
                .edges_directed(node, Direction::Incoming)
                .map(|edge| edge.source())
                .filter(|source| exits.contains_key(source))
                .collect();
            let loop_head = self.cfg.is_loop_head(node);
            let mut entry = match computed.split_first() {
                None => {
                    if node == self.cfg.entry() {
                        begin_state.clone()
                    } else {
                        self.state_mgr.bottom_state()
                    }
                }
                Some((first, rest)) => {
                    let mut acc = exits[first].clone();
                    for pred in rest {
                        acc = if loop_head {
                            acc.join_at_loop_head(&exits[pred])
                        } else {
                            acc.join(&exits[pred])
                        };
                    }
                    acc
                }
            };

            // At loop heads, successive iterations are combined and,
            // past the delay, widened to force convergence.
            let visit_count = visits.get(&node).copied().unwrap_or(0);
            if loop_head {
                if let Some(prev) = entries.get(&node) {
                    entry = if visit_count >= WIDENING_DELAY {
                        prev.widen(&entry)
                    } else {
                        prev.join_consecutive_iter(&entry)
                    };
                }
            }
            visits.insert(node, visit_count + 1);

            log::debug!("    -- entry state: {entry}");
            entries.insert(node, entry.clone());
            ctx.set_state(entry);

            for &sid in self.cfg.block(node).stmts() {
                let stmt = ast.stmt(sid);
                log::trace!("transfer( {stmt} )");
                self.mgr.run_pre_stmt(&mut ctx, stmt);
                self.mgr.run_eval_stmt(&mut ctx, stmt);
                self.mgr.run_post_stmt(&mut ctx, stmt);
            }

            let exit_state = ctx.state().clone();
            log::debug!("    -- exit state:  {exit_state}");

            // Requeue successors when the exit state moved; pointer
            // comparison is sound because states are interned.
            let changed = exits.get(&node) != Some(&exit_state);
            if changed {
                for edge in graph.edges_directed(node, Direction::Outgoing) {
                    if !worklist.contains(&edge.target()) {
                        worklist.push_front(edge.target());
                    }
                }
            }
            exits.insert(node, exit_state);
        }

        // End-of-function callbacks observe the state flowing into the
        // exit node.
        let final_state = entries
            .get(&self.cfg.exit())
            .cloned()
            .unwrap_or_else(|| self.state_mgr.bottom_state());
        ctx.set_state(final_state);
        self.mgr.run_end_function(&mut ctx, self.cfg.exit());
        exits.insert(self.cfg.exit(), ctx.state().clone());

        Ok(FunctionStates { entries, exits })
    }
}
