//! Type checking (pass 3)
//!
//! Fills in the types of declarations that carry no annotation from the
//! type of their initializer, and rejects initializers whose type does not
//! match an explicit annotation. Only literals and names are inferred.

use crate::frontend::ast::*;
use crate::semantic::context::{CompilerContext, ModulePhase};
use crate::semantic::diagnostics::Phase;
use crate::semantic::symbols::ScopeId;
use crate::semantic::Unit;
use crate::types::{PrimitiveType, Type};
use crate::utils::Span;

/// Default type of an untyped literal
pub fn literal_type(lit: &Literal) -> Type {
    Type::primitive(match lit {
        Literal::Int(..) => PrimitiveType::I32,
        Literal::Float(..) => PrimitiveType::F64,
        Literal::String(..) => PrimitiveType::Str,
        Literal::Bool(..) => PrimitiveType::Bool,
    })
}

/// Pass 3 driver
pub struct TypeChecker<'a> {
    ctx: &'a mut CompilerContext,
}

impl<'a> TypeChecker<'a> {
    pub fn new(ctx: &'a mut CompilerContext) -> Self {
        Self { ctx }
    }

    /// Check the module registered under `key`, then mark it `Typechecked`
    pub fn check(&mut self, key: &str) {
        if !self.ctx.can_process_phase(key, ModulePhase::Typechecked) {
            let phase = self.ctx.module_phase(key);
            if phase < ModulePhase::Typechecked {
                let file = self.ctx.module(key).map_or_else(|| key.to_string(), |m| m.file_name());
                self.ctx.diagnostics.critical_error(
                    &file,
                    Span::dummy(),
                    format!("module '{}' is not ready for type checking (phase: {})", key, phase),
                    Phase::Typechecking,
                );
            }
            return;
        }

        let Some(unit) = Unit::of(self.ctx, key) else {
            return;
        };
        log::debug!("type checking '{}'", key);

        self.check_stmts(&unit, &unit.ast.stmts, unit.root);
        self.ctx.set_module_phase(key, ModulePhase::Typechecked);
    }

    fn check_stmts(&mut self, unit: &Unit, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.check_stmt(unit, stmt, scope);
        }
    }

    fn check_stmt(&mut self, unit: &Unit, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Import(import) => {
                let alias = import.alias_name();
                if let Some(target) = self.ctx.scopes.import_path(scope, &alias).map(str::to_string) {
                    if self.ctx.can_process_phase(&target, ModulePhase::Typechecked) {
                        self.check(&target);
                    }
                }
            }
            Stmt::Function(func) => self.check_function(unit, func, scope),
            Stmt::Method(method) => {
                let TypeExpr::Named(type_name) = &method.receiver.ty else {
                    return;
                };
                if let Some(members) = self.ctx.scopes.member_scope(scope, &type_name.name) {
                    self.check_function(unit, &method.function, members);
                }
            }
            Stmt::VarDecl(decl) => self.check_var_decl(unit, decl, scope),
            Stmt::TypeDecl(_) => {}
            Stmt::Assign(assign) => {
                for expr in assign.targets.iter().chain(&assign.values) {
                    self.check_expr(unit, expr, scope);
                }
            }
            Stmt::If(stmt) => {
                self.check_expr(unit, &stmt.cond, scope);
                self.check_stmts(unit, &stmt.then_block.stmts, scope);
                if let Some(branch) = &stmt.else_branch {
                    self.check_stmt(unit, branch, scope);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(unit, value, scope);
                }
            }
            Stmt::Block(block) => self.check_stmts(unit, &block.stmts, scope),
            Stmt::Expr(expr) => self.check_expr(unit, expr, scope),
        }
    }

    /// `scope` is where the function's symbol lives
    fn check_function(&mut self, unit: &Unit, func: &Function, scope: ScopeId) {
        if let Some(body) = self.ctx.scopes.owned_scope(scope, &func.name.name, func.name.span) {
            self.check_stmts(unit, &func.body.stmts, body);
        }
    }

    /// Only function literals need visiting inside expressions
    fn check_expr(&mut self, unit: &Unit, expr: &Expr, scope: ScopeId) {
        match expr {
            Expr::Function(func) => self.check_function(unit, func, scope),
            Expr::Binary { left, right, .. } => {
                self.check_expr(unit, left, scope);
                self.check_expr(unit, right, scope);
            }
            Expr::Unary { expr, .. } | Expr::Field { expr, .. } => self.check_expr(unit, expr, scope),
            Expr::Call { func, args, .. } => {
                self.check_expr(unit, func, scope);
                for arg in args {
                    self.check_expr(unit, arg, scope);
                }
            }
            Expr::Index { expr, index, .. } => {
                self.check_expr(unit, expr, scope);
                self.check_expr(unit, index, scope);
            }
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.check_expr(unit, element, scope);
                }
            }
            Expr::Literal(_) | Expr::Ident(_) | Expr::Scoped { .. } => {}
        }
    }

    fn check_var_decl(&mut self, unit: &Unit, decl: &VarDecl, scope: ScopeId) {
        for value in &decl.values {
            self.check_expr(unit, value, scope);
        }

        for (target, value) in decl.targets.iter().zip(&decl.values) {
            let name = &target.name;
            if !self.ctx.scopes.is_declared_at(scope, &name.name, name.span) {
                continue;
            }
            let Some(inferred) = self.infer(value, scope) else {
                continue;
            };

            let declared = self
                .ctx
                .scopes
                .lookup_local(scope, &name.name)
                .and_then(|symbol| symbol.ty.clone());
            match declared {
                None if target.ty.is_none() => {
                    self.ctx.scopes.set_type(scope, &name.name, inferred);
                }
                None => {}
                Some(declared) => {
                    if !declared.accepts(&inferred) {
                        self.ctx.diagnostics.semantic_error(
                            &unit.file,
                            value.span(),
                            format!(
                                "cannot assign value of type '{}' to variable '{}' of type '{}'",
                                inferred, name.name, declared
                            ),
                            Phase::Typechecking,
                        );
                    }
                }
            }
        }
    }

    fn infer(&self, expr: &Expr, scope: ScopeId) -> Option<Type> {
        match expr {
            Expr::Literal(lit) => Some(literal_type(lit)),
            Expr::Ident(ident) => self.ctx.scopes.lookup(scope, &ident.name)?.ty.clone(),
            Expr::Scoped { module, name, .. } => {
                let table = self.ctx.scopes.imported_table(scope, &module.name).ok()?;
                self.ctx.scopes.lookup_local(table, &name.name)?.ty.clone()
            }
            Expr::Function(func) => self.ctx.scopes.lookup_local(scope, &func.name.name)?.ty.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;
    use crate::frontend::module::{MemorySources, ModuleLoader, SourceParser};
    use crate::semantic::collector::Collector;
    use crate::semantic::resolver::Resolver;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn check(source: &str) -> CompilerContext {
        let sources = MemorySources::new().with_file("/proj/main.sbl", source);
        let mut host = ModuleLoader::new(CompilerOptions::new("/proj"), sources);
        let mut ctx = CompilerContext::new().unwrap();
        let entry = Path::new("/proj/main.sbl");
        let program = host.parse(entry).unwrap();
        ctx.add_module("main", entry, program);
        Collector::new(&mut ctx, &mut host).collect("main");
        Resolver::new(&mut ctx).resolve("main");
        TypeChecker::new(&mut ctx).check("main");
        ctx
    }

    fn type_of(ctx: &CompilerContext, name: &str) -> Option<String> {
        let root = ctx.get_module("main").unwrap().scope;
        ctx.scopes
            .lookup_local(root, name)
            .and_then(|s| s.ty.as_ref())
            .map(Type::to_string)
    }

    #[test]
    fn test_literal_defaults() {
        let ctx = check("let a, b, c, d := 1, 2.5, \"s\", true;");
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(type_of(&ctx, "a"), Some("i32".to_string()));
        assert_eq!(type_of(&ctx, "b"), Some("f64".to_string()));
        assert_eq!(type_of(&ctx, "c"), Some("str".to_string()));
        assert_eq!(type_of(&ctx, "d"), Some("bool".to_string()));
        assert_eq!(ctx.module_phase("main"), ModulePhase::Typechecked);
    }

    #[test]
    fn test_inference_through_names() {
        let ctx = check("fn add(a: i32, b: i32) -> i32 { return a + b; } let f := add; let g := f;");
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(type_of(&ctx, "g"), Some("fn(i32, i32) -> i32".to_string()));
    }

    #[test]
    fn test_annotation_mismatch() {
        let ctx = check("let n: i32 = \"nine\"; let ok: f64 = 1.5;");
        let messages: Vec<String> = ctx.diagnostics.iter().map(|d| d.message.clone()).collect();
        assert_eq!(
            messages,
            vec!["cannot assign value of type 'str' to variable 'n' of type 'i32'".to_string()]
        );
    }

    #[test]
    fn test_alias_accepts_underlying_type() {
        let ctx = check("type Count i32; let c: Count = 3;");
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(type_of(&ctx, "c"), Some("Count".to_string()));
    }

    #[test]
    fn test_inside_function_bodies() {
        let ctx = check("fn f() { let local := 4; let s: str = local; }");
        assert_eq!(ctx.diagnostics.len(), 1);
        let root = ctx.get_module("main").unwrap().scope;
        let body = ctx.scopes.lookup_local(root, "f").unwrap().scope.unwrap();
        assert_eq!(
            ctx.scopes.lookup_local(body, "local").unwrap().ty,
            Some(Type::primitive(PrimitiveType::I32))
        );
    }
}
