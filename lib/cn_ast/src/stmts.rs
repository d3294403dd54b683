//! Statement and expression nodes.
//!
//! Expressions are statement nodes too, the way a flattened clang CFG
//! treats them: a function body is a list of statement handles, and the
//! nodes that have sub-expressions reference them by handle.

use crate::{DeclId, StmtId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Neg => write!(f, "-"),
            Self::Not => write!(f, "!"),
        }
    }
}

/// The different kinds of statement nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// A local declaration statement, with an optional initialiser.
    Decl {
        decl: DeclId,
        init: Option<StmtId>,
    },
    /// An integer literal expression.
    IntLit(i64),
    /// A reference to a value declaration.
    DeclRef(DeclId),
    /// A unary operation.
    Unary { op: UnOp, operand: StmtId },
    /// A binary operation.
    Binary {
        op: BinOp,
        lhs: StmtId,
        rhs: StmtId,
    },
    /// An assignment to a declared variable.
    Assign { target: DeclId, value: StmtId },
    /// A call expression.
    Call { callee: DeclId, args: Vec<StmtId> },
    /// A return statement.
    Return(Option<StmtId>),
    /// An if statement with optional else branch.
    If {
        cond: StmtId,
        then_body: Vec<StmtId>,
        else_body: Vec<StmtId>,
    },
    /// A while loop.
    While { cond: StmtId, body: Vec<StmtId> },
}

/// A statement node, owned by the [`AstContext`](crate::AstContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub(crate) id: StmtId,
    pub(crate) kind: StmtKind,
}

impl Stmt {
    #[must_use]
    pub fn id(&self) -> StmtId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &StmtKind {
        &self.kind
    }

    #[must_use]
    pub fn is_decl_stmt(&self) -> bool {
        matches!(self.kind, StmtKind::Decl { .. })
    }

    #[must_use]
    pub fn is_assign(&self) -> bool {
        matches!(self.kind, StmtKind::Assign { .. })
    }

    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(self.kind, StmtKind::Call { .. })
    }

    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_))
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            StmtKind::Decl { decl, init: None } => write!(f, "decl {decl}"),
            StmtKind::Decl {
                decl,
                init: Some(init),
            } => write!(f, "decl {decl} = {init}"),
            StmtKind::IntLit(v) => write!(f, "{v}"),
            StmtKind::DeclRef(d) => write!(f, "ref {d}"),
            StmtKind::Unary { op, operand } => write!(f, "{op}{operand}"),
            StmtKind::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            StmtKind::Assign { target, value } => write!(f, "{target} := {value}"),
            StmtKind::Call { callee, args } => write!(f, "call {callee}/{}", args.len()),
            StmtKind::Return(None) => write!(f, "return"),
            StmtKind::Return(Some(v)) => write!(f, "return {v}"),
            StmtKind::If { cond, .. } => write!(f, "if {cond}"),
            StmtKind::While { cond, .. } => write!(f, "while {cond}"),
        }
    }
}
