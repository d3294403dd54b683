//! The AST arena and its builder API.

use crate::decls::{Decl, DeclKind, Ty};
use crate::source::SourceLocation;
use crate::stmts::{BinOp, Stmt, StmtKind, UnOp};
use crate::{DeclId, StmtId};

/// Owns every declaration and statement node of one translation unit.
///
/// Nodes are created through the builder methods and referenced by their
/// stable ids afterwards; the arena is append-only, apart from
/// [`set_function_body`](AstContext::set_function_body) which fills in a
/// function body declared earlier.
#[derive(Debug, Default)]
pub struct AstContext {
    decls: Vec<Decl>,
    stmts: Vec<Stmt>,
}

impl AstContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    #[must_use]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn decls(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter()
    }

    /// Iterates over the function declarations of the unit.
    pub fn functions(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter().filter(|d| d.is_function())
    }

    fn add_decl(&mut self, kind: DeclKind, name: &str, loc: Option<SourceLocation>) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl {
            id,
            kind,
            name: name.to_string(),
            loc,
        });
        id
    }

    fn add_stmt(&mut self, kind: StmtKind) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(Stmt { id, kind });
        id
    }

    pub fn function(&mut self, name: &str, params: Vec<DeclId>) -> DeclId {
        self.add_decl(DeclKind::Function { params, body: None }, name, None)
    }

    pub fn function_at(
        &mut self,
        name: &str,
        params: Vec<DeclId>,
        loc: SourceLocation,
    ) -> DeclId {
        self.add_decl(DeclKind::Function { params, body: None }, name, Some(loc))
    }

    /// Attaches a body to a previously declared function.
    ///
    /// # Panics
    ///
    /// Panics if `func` does not name a function declaration.
    pub fn set_function_body(&mut self, func: DeclId, stmts: Vec<StmtId>) {
        match &mut self.decls[func.index()].kind {
            DeclKind::Function { body, .. } => *body = Some(stmts),
            _ => panic!("{func} is not a function declaration"),
        }
    }

    pub fn var(&mut self, name: &str, ty: Ty) -> DeclId {
        self.add_decl(DeclKind::Var { ty }, name, None)
    }

    pub fn param(&mut self, name: &str, ty: Ty) -> DeclId {
        self.add_decl(DeclKind::Param { ty }, name, None)
    }

    pub fn typedef(&mut self, name: &str) -> DeclId {
        self.add_decl(DeclKind::Typedef, name, None)
    }

    pub fn record(&mut self, name: &str) -> DeclId {
        self.add_decl(DeclKind::Record, name, None)
    }

    pub fn decl_stmt(&mut self, decl: DeclId, init: Option<StmtId>) -> StmtId {
        self.add_stmt(StmtKind::Decl { decl, init })
    }

    pub fn int_lit(&mut self, value: i64) -> StmtId {
        self.add_stmt(StmtKind::IntLit(value))
    }

    pub fn decl_ref(&mut self, decl: DeclId) -> StmtId {
        self.add_stmt(StmtKind::DeclRef(decl))
    }

    pub fn unary(&mut self, op: UnOp, operand: StmtId) -> StmtId {
        self.add_stmt(StmtKind::Unary { op, operand })
    }

    pub fn binary(&mut self, op: BinOp, lhs: StmtId, rhs: StmtId) -> StmtId {
        self.add_stmt(StmtKind::Binary { op, lhs, rhs })
    }

    pub fn assign(&mut self, target: DeclId, value: StmtId) -> StmtId {
        self.add_stmt(StmtKind::Assign { target, value })
    }

    pub fn call(&mut self, callee: DeclId, args: Vec<StmtId>) -> StmtId {
        self.add_stmt(StmtKind::Call { callee, args })
    }

    pub fn ret(&mut self, value: Option<StmtId>) -> StmtId {
        self.add_stmt(StmtKind::Return(value))
    }

    pub fn if_stmt(
        &mut self,
        cond: StmtId,
        then_body: Vec<StmtId>,
        else_body: Vec<StmtId>,
    ) -> StmtId {
        self.add_stmt(StmtKind::If {
            cond,
            then_body,
            else_body,
        })
    }

    pub fn while_stmt(&mut self, cond: StmtId, body: Vec<StmtId>) -> StmtId {
        self.add_stmt(StmtKind::While { cond, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_read_back() {
        let mut ast = AstContext::new();
        let x = ast.var("x", Ty::Int);
        let init = ast.int_lit(3);
        let s = ast.decl_stmt(x, Some(init));

        assert_eq!(ast.decl(x).name(), "x");
        assert!(ast.stmt(s).is_decl_stmt());
        assert_eq!(
            ast.stmt(init).kind(),
            &StmtKind::IntLit(3),
        );
    }

    #[test]
    fn function_body_roundtrip() {
        let mut ast = AstContext::new();
        let p = ast.param("n", Ty::Int);
        let f = ast.function("main", vec![p]);
        assert!(ast.decl(f).body().is_none());

        let r = ast.ret(None);
        ast.set_function_body(f, vec![r]);
        assert_eq!(ast.decl(f).body(), Some(&[r][..]));
        assert_eq!(ast.functions().count(), 1);
    }
}
