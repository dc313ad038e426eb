//! Semantic checking
//!
//! A thin checker that walks the AST with the symbol table: functions,
//! parameters and locals are registered, duplicate definitions and unknown
//! identifiers are collected as diagnostics. It has no user-visible effect
//! on compilation; the driver merely reports its findings in verbose mode.

use crate::ast::{Decl, Expr, ExprKind, FunctionDecl, Stmt, StmtKind, TranslationUnit, VarDecl};
use crate::symtab::SymbolTable;

/// The semantic checker.
#[derive(Default)]
pub struct TypeChecker {
    symtab: SymbolTable,
    diagnostics: Vec<String>,
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            symtab: SymbolTable::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Walk a translation unit and collect diagnostics. The scope stack is
    /// balanced back to empty on return.
    pub fn check(&mut self, tu: &TranslationUnit) -> Vec<String> {
        self.symtab.enter_scope(); // global scope

        for decl in &tu.decls {
            match decl {
                Decl::Function(func) => self.check_function(func),
                Decl::Var(var) => self.check_var_decl(var),
            }
        }

        self.symtab.exit_scope();
        std::mem::take(&mut self.diagnostics)
    }

    /// Current scope depth, exposed for balance checks.
    pub fn scope_depth(&self) -> usize {
        self.symtab.depth()
    }

    fn check_function(&mut self, func: &FunctionDecl) {
        if !self.symtab.define(&func.name, &func.return_type, true) {
            // redeclaring a function (prototype plus definition) is fine
            let clashes_with_variable = self
                .symtab
                .lookup(&func.name)
                .map(|s| !s.is_function)
                .unwrap_or(false);
            if clashes_with_variable {
                self.report(format!("'{}' redefined as a function", func.name));
            }
        }

        let Some(body) = &func.body else {
            return;
        };

        self.symtab.enter_scope(); // function scope
        for param in &func.params {
            if !param.name.is_empty() && !self.symtab.define(&param.name, &param.ty, false) {
                self.report(format!("parameter '{}' redefined", param.name));
            }
        }
        self.check_stmt(body);
        self.symtab.exit_scope();
    }

    fn check_var_decl(&mut self, var: &VarDecl) {
        if self.symtab.exists_in_current_scope(&var.name) {
            self.report(format!("variable '{}' redefined", var.name));
        } else {
            self.symtab.define(&var.name, &var.ty, false);
        }
        if let Some(init) = &var.init {
            self.check_expr(init);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(expr);
                }
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(expr);
                }
            }
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.check_expr(cond);
                self.check_stmt(then_stmt);
                if let Some(else_stmt) = else_stmt {
                    self.check_stmt(else_stmt);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.check_stmt(body);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.symtab.enter_scope(); // for-init scope
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(step) = step {
                    self.check_expr(step);
                }
                self.check_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Compound(stmts) => {
                self.symtab.enter_scope();
                for stmt in stmts {
                    self.check_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::VarDecl(var) => self.check_var_decl(var),
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                if self.symtab.lookup(name).is_none() {
                    self.report(format!("undefined identifier '{}'", name));
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Call { callee, args } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::ArraySubscript { base, index } => {
                self.check_expr(base);
                self.check_expr(index);
            }
            ExprKind::Member { base, .. } => self.check_expr(base),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.check_expr(cond);
                self.check_expr(then_expr);
                self.check_expr(else_expr);
            }
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_) => {}
        }
    }

    fn report(&mut self, message: String) {
        self.diagnostics.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_builder::build_translation_unit;
    use crate::parser::parse;

    fn check(source: &str) -> (Vec<String>, usize) {
        let (tree, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let tu = build_translation_unit(&tree).unwrap();
        let mut checker = TypeChecker::new();
        let diags = checker.check(&tu);
        (diags, checker.scope_depth())
    }

    #[test]
    fn test_clean_program() {
        let (diags, depth) = check("int add(int a, int b) { return a + b; }");
        assert!(diags.is_empty(), "diagnostics: {:?}", diags);
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_scope_depth_balanced_after_nested_blocks() {
        let src = "int main() { int x = 1; { int y = x; { int z = y; } } return x; }";
        let (diags, depth) = check(src);
        assert!(diags.is_empty());
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_undefined_identifier() {
        let (diags, _) = check("int main() { return missing; }");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("missing"));
    }

    #[test]
    fn test_duplicate_local() {
        let (diags, _) = check("int main() { int x; int x; return 0; }");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("redefined"));
    }

    #[test]
    fn test_shadowing_is_not_a_duplicate() {
        let (diags, _) = check("int main() { int x = 1; { int x = 2; } return x; }");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_prototype_then_definition_allowed() {
        // the definition re-defines the prototype's name at global scope; a
        // prototype alone never reports
        let (diags, _) = check("int even(int); int odd(int n) { return even(n - 1); }");
        assert!(diags.is_empty(), "diagnostics: {:?}", diags);
    }

    #[test]
    fn test_for_init_scope() {
        let (diags, depth) = check("int main() { for (int i = 0; i < 3; i = i + 1) { int j = i; } return 0; }");
        assert!(diags.is_empty(), "diagnostics: {:?}", diags);
        assert_eq!(depth, 0);
    }
}
