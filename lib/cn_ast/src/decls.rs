//! Declaration nodes.

use crate::source::SourceLocation;
use crate::{DeclId, StmtId};
use std::fmt;

/// The C-family types carried by value declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Float,
    Ptr,
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Ptr => write!(f, "ptr"),
        }
    }
}

/// The different kinds of declarations a translation unit can contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    /// A function, with its parameters and an optional body.
    Function {
        params: Vec<DeclId>,
        body: Option<Vec<StmtId>>,
    },
    /// A local variable.
    Var { ty: Ty },
    /// A function parameter.
    Param { ty: Ty },
    /// A type alias. Carries no storage.
    Typedef,
    /// A struct/union definition. Carries no storage of its own.
    Record,
}

/// A declaration node, owned by the [`AstContext`](crate::AstContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub(crate) id: DeclId,
    pub(crate) kind: DeclKind,
    pub(crate) name: String,
    pub(crate) loc: Option<SourceLocation>,
}

impl Decl {
    #[must_use]
    pub fn id(&self) -> DeclId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &DeclKind {
        &self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn loc(&self) -> Option<SourceLocation> {
        self.loc
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self.kind, DeclKind::Function { .. })
    }

    /// Returns the body statements when `self` is a function with a body.
    #[must_use]
    pub fn body(&self) -> Option<&[StmtId]> {
        match &self.kind {
            DeclKind::Function { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            DeclKind::Function { params, .. } => {
                write!(f, "fn {}/{}", self.name, params.len())
            }
            DeclKind::Var { ty } => write!(f, "{} {}", ty, self.name),
            DeclKind::Param { ty } => write!(f, "{} {}", ty, self.name),
            DeclKind::Typedef => write!(f, "typedef {}", self.name),
            DeclKind::Record => write!(f, "record {}", self.name),
        }
    }
}
