//! Symbolic expressions.
//!
//! A symbolic expression names the value a region or statement held at
//! some program point. The lattice machinery treats them as opaque
//! payload: they only matter to analyses that read the auxiliary state
//! maps, and to state interning, which compares them structurally.

use crate::region::RegionId;
use cn_ast::{BinOp, StmtId, Ty, UnOp};
use std::fmt;
use std::rc::Rc;

pub type SExprRef = Rc<SExpr>;

/// A symbolic expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SExpr {
    /// The value currently stored in a region.
    RegionVal(RegionId),
    /// A fresh symbol conjured for a statement whose value the resolver
    /// cannot express otherwise.
    Conjured { stmt: StmtId, seq: u32 },
    /// An integer constant.
    IntConst(i64),
    /// A cast of another expression.
    Cast { ty: Ty, operand: SExprRef },
    /// A unary operation.
    Unary { op: UnOp, operand: SExprRef },
    /// A binary operation.
    Binary {
        op: BinOp,
        lhs: SExprRef,
        rhs: SExprRef,
    },
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RegionVal(r) => write!(f, "val({r})"),
            Self::Conjured { stmt, seq } => write!(f, "$conj{seq}@{stmt}"),
            Self::IntConst(v) => write!(f, "{v}"),
            Self::Cast { ty, operand } => write!(f, "({ty}){operand}"),
            Self::Unary { op, operand } => write!(f, "{op}({operand})"),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}

/// Builds symbolic expressions and numbers conjured symbols.
#[derive(Debug, Default)]
pub struct SymbolManager {
    next_conjured: u32,
}

impl SymbolManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh symbol for a statement; every call yields a distinct one.
    pub fn conjure(&mut self, stmt: StmtId) -> SExprRef {
        let seq = self.next_conjured;
        self.next_conjured += 1;
        Rc::new(SExpr::Conjured { stmt, seq })
    }

    #[must_use]
    pub fn region_val(&self, region: RegionId) -> SExprRef {
        Rc::new(SExpr::RegionVal(region))
    }

    #[must_use]
    pub fn int_const(&self, value: i64) -> SExprRef {
        Rc::new(SExpr::IntConst(value))
    }

    #[must_use]
    pub fn cast(&self, ty: Ty, operand: SExprRef) -> SExprRef {
        Rc::new(SExpr::Cast { ty, operand })
    }

    #[must_use]
    pub fn unary(&self, op: UnOp, operand: SExprRef) -> SExprRef {
        Rc::new(SExpr::Unary { op, operand })
    }

    #[must_use]
    pub fn binary(&self, op: BinOp, lhs: SExprRef, rhs: SExprRef) -> SExprRef {
        Rc::new(SExpr::Binary { op, lhs, rhs })
    }
}
