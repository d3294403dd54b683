//! This crate provides the C-family AST handles used by the `Cairn`
//! analysis project.
//!
//! It intentionally carries no lexer or parser: front-ends build
//! declarations and statements through the [`AstContext`] arena, and the
//! analysis crates only ever see the stable integer handles ([`DeclId`],
//! [`StmtId`]) and kind enumerations defined here.

use std::fmt;

mod context;
mod decls;
mod source;
mod stmts;

pub use context::AstContext;
pub use decls::{Decl, DeclKind, Ty};
pub use source::{FileId, SourceLocation, SourceManager};
pub use stmts::{BinOp, Stmt, StmtKind, UnOp};

/// Stable handle of a declaration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Stable handle of a statement node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub(crate) u32);

impl StmtId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}
