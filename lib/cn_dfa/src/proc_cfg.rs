//! Procedure control flow graph.
//!
//! Blocks carry the statement handles of one straight-line run; edges
//! carry the branch kind that leads into the successor. The graph is
//! built once per function and cached by the stack frame manager.

use crate::errors::{DfaError, DfaResult};
use cn_ast::{AstContext, DeclId, StmtId, StmtKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::fmt;

pub type NodeRef = NodeIndex;

/// The kind of control transfer an edge stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Unconditional fallthrough.
    Jump,
    /// Condition held.
    True,
    /// Condition did not hold.
    False,
    /// Back edge from a loop body to its head.
    LoopBack,
}

/// A basic block: a run of statements with no internal branching.
#[derive(Debug, Default)]
pub struct Block {
    stmts: Vec<StmtId>,
}

impl Block {
    #[must_use]
    pub fn stmts(&self) -> &[StmtId] {
        &self.stmts
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.stmts.is_empty() {
            return write!(f, "<empty>");
        }
        for (i, stmt) in self.stmts.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

/// Control flow graph of one function body.
#[derive(Debug)]
pub struct ProcCfg {
    graph: DiGraph<Block, Branch>,
    entry: NodeIndex,
    exit: NodeIndex,
}

struct Builder<'a> {
    ast: &'a AstContext,
    graph: DiGraph<Block, Branch>,
    exit: NodeIndex,
}

impl<'a> Builder<'a> {
    fn new_block(&mut self) -> NodeIndex {
        self.graph.add_node(Block::default())
    }

    /// Lays out a statement sequence starting in `cur`; returns the open
    /// tail block, or `None` when the sequence terminated with a return.
    fn seq(&mut self, stmts: &[StmtId], mut cur: NodeIndex) -> Option<NodeIndex> {
        for &sid in stmts {
            match self.ast.stmt(sid).kind() {
                StmtKind::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    self.graph[cur].stmts.push(sid);
                    let join = self.new_block();
                    let then_head = self.new_block();
                    self.graph.add_edge(cur, then_head, Branch::True);
                    if let Some(tail) = self.seq(then_body, then_head) {
                        self.graph.add_edge(tail, join, Branch::Jump);
                    }
                    if else_body.is_empty() {
                        self.graph.add_edge(cur, join, Branch::False);
                    } else {
                        let else_head = self.new_block();
                        self.graph.add_edge(cur, else_head, Branch::False);
                        if let Some(tail) = self.seq(else_body, else_head) {
                            self.graph.add_edge(tail, join, Branch::Jump);
                        }
                    }
                    cur = join;
                }
                StmtKind::While { body, .. } => {
                    let head = self.new_block();
                    self.graph.add_edge(cur, head, Branch::Jump);
                    self.graph[head].stmts.push(sid);
                    let body_head = self.new_block();
                    self.graph.add_edge(head, body_head, Branch::True);
                    if let Some(tail) = self.seq(body, body_head) {
                        self.graph.add_edge(tail, head, Branch::LoopBack);
                    }
                    let after = self.new_block();
                    self.graph.add_edge(head, after, Branch::False);
                    cur = after;
                }
                StmtKind::Return(_) => {
                    self.graph[cur].stmts.push(sid);
                    self.graph.add_edge(cur, self.exit, Branch::Jump);
                    return None;
                }
                _ => self.graph[cur].stmts.push(sid),
            }
        }
        Some(cur)
    }
}

impl ProcCfg {
    /// Builds the CFG of `func`.
    ///
    /// # Errors
    ///
    /// Fails with [`DfaError::NoCode`] when the function has no body and
    /// with [`DfaError::Internal`] when `func` is not a function.
    pub fn build(ast: &AstContext, func: DeclId) -> DfaResult<Self> {
        let decl = ast.decl(func);
        if !decl.is_function() {
            return Err(DfaError::Internal(format!(
                "cannot build a CFG for non-function `{}`",
                decl.name()
            )));
        }
        let body: Vec<StmtId> = decl
            .body()
            .ok_or_else(|| DfaError::NoCode(decl.name().to_string()))?
            .to_vec();

        let mut graph = DiGraph::new();
        let entry = graph.add_node(Block::default());
        let exit = graph.add_node(Block::default());
        let mut builder = Builder { ast, graph, exit };
        if let Some(tail) = builder.seq(&body, entry) {
            builder.graph.add_edge(tail, exit, Branch::Jump);
        }
        Ok(Self {
            graph: builder.graph,
            entry,
            exit,
        })
    }

    #[must_use]
    pub fn entry(&self) -> NodeRef {
        self.entry
    }

    #[must_use]
    pub fn exit(&self) -> NodeRef {
        self.exit
    }

    #[must_use]
    pub fn graph(&self) -> &DiGraph<Block, Branch> {
        &self.graph
    }

    #[must_use]
    pub fn block(&self, node: NodeRef) -> &Block {
        &self.graph[node]
    }

    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.graph.node_count()
    }

    /// A node is a loop head when a back edge targets it.
    #[must_use]
    pub fn is_loop_head(&self, node: NodeRef) -> bool {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .any(|edge| *edge.weight() == Branch::LoopBack)
    }
}
