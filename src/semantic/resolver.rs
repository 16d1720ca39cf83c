//! Name and type resolution (pass 2)
//!
//! Walks each collected module again, derives the types written in
//! signatures, declarations and type aliases, attaches them to the
//! symbols created by the collector and reports uses of unknown names.
//! Imported modules are resolved before the statement that imports them
//! returns.

use crate::frontend::ast::*;
use crate::semantic::context::{CompilerContext, ModulePhase};
use crate::semantic::derive::{derive_type, derive_type_decl};
use crate::semantic::diagnostics::Phase;
use crate::semantic::symbols::ScopeId;
use crate::semantic::Unit;
use crate::types::Type;
use crate::utils::Span;

/// Pass 2 driver
pub struct Resolver<'a> {
    ctx: &'a mut CompilerContext,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a mut CompilerContext) -> Self {
        Self { ctx }
    }

    /// Resolve the module registered under `key`, then mark it `Resolved`
    pub fn resolve(&mut self, key: &str) {
        if !self.ctx.can_process_phase(key, ModulePhase::Resolved) {
            let phase = self.ctx.module_phase(key);
            if phase >= ModulePhase::Resolved {
                log::trace!("module '{}' already resolved", key);
            } else {
                let file = self.ctx.module(key).map_or_else(|| key.to_string(), |m| m.file_name());
                self.ctx.diagnostics.critical_error(
                    &file,
                    Span::dummy(),
                    format!("module '{}' is not ready for resolution (phase: {})", key, phase),
                    Phase::Resolving,
                );
            }
            return;
        }

        let Some(unit) = Unit::of(self.ctx, key) else {
            return;
        };
        log::debug!("resolving '{}'", key);

        for stmt in &unit.ast.stmts {
            self.resolve_stmt(&unit, stmt, unit.root);
        }
        self.ctx.set_module_phase(key, ModulePhase::Resolved);
    }

    fn error(&mut self, unit: &Unit, span: Span, message: impl Into<String>) {
        self.ctx
            .diagnostics
            .semantic_error(&unit.file, span, message, Phase::Resolving);
    }

    /// Derive `ty`, reporting failures
    fn derive(&mut self, unit: &Unit, scope: ScopeId, ty: &TypeExpr) -> Option<Type> {
        match derive_type(&self.ctx.scopes, scope, ty) {
            Ok(ty) => Some(ty),
            Err(err) => {
                let span = err.span().unwrap_or_else(|| ty.span());
                self.error(unit, span, err.to_string());
                None
            }
        }
    }

    fn resolve_stmt(&mut self, unit: &Unit, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Import(import) => self.resolve_import(unit, import, scope),
            Stmt::Function(func) => self.resolve_function(unit, func, scope),
            Stmt::Method(method) => self.resolve_method(unit, method, scope),
            Stmt::VarDecl(decl) => self.resolve_var_decl(unit, decl, scope),
            Stmt::TypeDecl(decl) => self.resolve_type_decl(unit, decl, scope),
            Stmt::Assign(assign) => {
                if assign.targets.len() != assign.values.len() {
                    self.error(
                        unit,
                        assign.span,
                        format!(
                            "assignment mismatch: {} variables but {} values",
                            assign.targets.len(),
                            assign.values.len()
                        ),
                    );
                }
                for expr in assign.targets.iter().chain(&assign.values) {
                    self.resolve_expr(unit, expr, scope);
                }
            }
            Stmt::If(stmt) => {
                self.resolve_expr(unit, &stmt.cond, scope);
                self.resolve_block(unit, &stmt.then_block, scope);
                if let Some(branch) = &stmt.else_branch {
                    self.resolve_stmt(unit, branch, scope);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.resolve_expr(unit, value, scope);
                }
            }
            Stmt::Block(block) => self.resolve_block(unit, block, scope),
            Stmt::Expr(expr) => self.resolve_expr(unit, expr, scope),
        }
    }

    fn resolve_block(&mut self, unit: &Unit, block: &Block, scope: ScopeId) {
        for stmt in &block.stmts {
            self.resolve_stmt(unit, stmt, scope);
        }
    }

    fn resolve_import(&mut self, unit: &Unit, import: &Import, scope: ScopeId) {
        let alias = import.alias_name();
        let Some(target) = self.ctx.scopes.import_path(scope, &alias).map(str::to_string) else {
            // the import failed during collection and was reported there
            return;
        };
        if self.ctx.can_process_phase(&target, ModulePhase::Resolved) {
            self.resolve(&target);
        }
        log::trace!("'{}' sees '{}' as '{}'", unit.key, target, alias);
    }

    fn resolve_var_decl(&mut self, unit: &Unit, decl: &VarDecl, scope: ScopeId) {
        for target in &decl.targets {
            let Some(annotation) = &target.ty else {
                continue;
            };
            let Some(ty) = self.derive(unit, scope, annotation) else {
                continue;
            };
            if self.ctx.scopes.is_declared_at(scope, &target.name.name, target.name.span) {
                self.ctx.scopes.set_type(scope, &target.name.name, ty);
            }
        }
        if !decl.values.is_empty() && decl.targets.len() != decl.values.len() {
            self.error(
                unit,
                decl.span,
                format!(
                    "assignment mismatch: {} variables but {} values",
                    decl.targets.len(),
                    decl.values.len()
                ),
            );
        }
        for value in &decl.values {
            self.resolve_expr(unit, value, scope);
        }
    }

    fn resolve_type_decl(&mut self, unit: &Unit, decl: &TypeDecl, scope: ScopeId) {
        let name = &decl.name;
        let Some(members) = self.ctx.scopes.owned_scope(scope, &name.name, name.span) else {
            return;
        };

        match derive_type_decl(&self.ctx.scopes, scope, &name.name, &decl.ty) {
            Ok(ty) => {
                if let Type::Struct { fields, .. } = ty.unwrap_alias() {
                    for (field, field_ty) in fields {
                        self.ctx.scopes.set_type(members, field, field_ty.clone());
                    }
                }
                self.ctx.scopes.set_type(scope, &name.name, ty);
            }
            Err(err) => {
                let span = err.span().unwrap_or(decl.span);
                self.error(unit, span, err.to_string());
            }
        }
    }

    /// Derive parameter and return types, typing each parameter symbol in
    /// `body`. Returns the signature if every part derived.
    fn resolve_signature(&mut self, unit: &Unit, func: &Function, scope: ScopeId, body: ScopeId) -> Option<Type> {
        let mut params = Vec::with_capacity(func.params.len());
        let mut complete = true;

        for param in &func.params {
            match self.derive(unit, scope, &param.ty) {
                Some(ty) => {
                    if self.ctx.scopes.is_declared_at(body, &param.name.name, param.name.span) {
                        self.ctx.scopes.set_type(body, &param.name.name, ty.clone());
                    }
                    params.push(ty);
                }
                None => complete = false,
            }
        }

        let ret = match &func.ret_type {
            Some(ret) => match self.derive(unit, scope, ret) {
                Some(ty) => Some(ty),
                None => {
                    complete = false;
                    None
                }
            },
            None => None,
        };

        complete.then(|| Type::function(params, ret))
    }

    fn resolve_function(&mut self, unit: &Unit, func: &Function, scope: ScopeId) {
        let name = &func.name;
        let Some(body) = self.ctx.scopes.owned_scope(scope, &name.name, name.span) else {
            // duplicate declaration, reported during collection
            return;
        };

        if let Some(signature) = self.resolve_signature(unit, func, scope, body) {
            self.ctx.scopes.set_type(scope, &name.name, signature);
        }
        self.resolve_block(unit, &func.body, body);
    }

    fn resolve_method(&mut self, unit: &Unit, method: &Method, scope: ScopeId) {
        let TypeExpr::Named(type_name) = &method.receiver.ty else {
            return;
        };
        let Some(members) = self.ctx.scopes.member_scope(scope, &type_name.name) else {
            return;
        };

        let func = &method.function;
        let Some(body) = self.ctx.scopes.owned_scope(members, &func.name.name, func.name.span) else {
            return;
        };

        let receiver = &method.receiver;
        if let Some(ty) = self.derive(unit, scope, &receiver.ty) {
            if self.ctx.scopes.is_declared_at(body, &receiver.name.name, receiver.name.span) {
                self.ctx.scopes.set_type(body, &receiver.name.name, ty);
            }
        }

        if let Some(signature) = self.resolve_signature(unit, func, scope, body) {
            self.ctx.scopes.set_type(members, &func.name.name, signature);
        }
        self.resolve_block(unit, &func.body, body);
    }

    fn resolve_expr(&mut self, unit: &Unit, expr: &Expr, scope: ScopeId) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Ident(ident) => {
                if self.ctx.scopes.lookup(scope, &ident.name).is_none() {
                    self.error(unit, ident.span, format!("undefined symbol: {}", ident.name));
                }
            }
            Expr::Scoped { module, name, .. } => match self.ctx.scopes.imported_table(scope, &module.name) {
                Ok(table) => {
                    if self.ctx.scopes.lookup_local(table, &name.name).is_none() {
                        self.error(
                            unit,
                            name.span,
                            format!("symbol '{}' not found in module '{}'", name.name, module.name),
                        );
                    }
                }
                Err(err) => self.error(unit, module.span, err.to_string()),
            },
            Expr::Function(func) => self.resolve_function(unit, func, scope),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(unit, left, scope);
                self.resolve_expr(unit, right, scope);
            }
            // field names need the object's type, which is checked later
            Expr::Unary { expr, .. } | Expr::Field { expr, .. } => self.resolve_expr(unit, expr, scope),
            Expr::Call { func, args, .. } => {
                self.resolve_expr(unit, func, scope);
                for arg in args {
                    self.resolve_expr(unit, arg, scope);
                }
            }
            Expr::Index { expr, index, .. } => {
                self.resolve_expr(unit, expr, scope);
                self.resolve_expr(unit, index, scope);
            }
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.resolve_expr(unit, element, scope);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;
    use crate::frontend::module::{MemorySources, ModuleLoader, SourceParser};
    use crate::semantic::collector::Collector;
    use crate::types::PrimitiveType;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn analyze(files: &[(&str, &str)]) -> CompilerContext {
        let mut sources = MemorySources::new();
        for (name, text) in files {
            sources.insert(Path::new("/proj").join(name), *text);
        }
        let mut host = ModuleLoader::new(CompilerOptions::new("/proj"), sources);
        let mut ctx = CompilerContext::new().unwrap();
        let entry = Path::new("/proj/main.sbl");
        let program = host.parse(entry).unwrap();
        ctx.add_module("main", entry, program);
        Collector::new(&mut ctx, &mut host).collect("main");
        Resolver::new(&mut ctx).resolve("main");
        ctx
    }

    fn type_of(ctx: &CompilerContext, key: &str, name: &str) -> Option<String> {
        let root = ctx.get_module(key).unwrap().scope;
        ctx.scopes
            .lookup_local(root, name)
            .and_then(|s| s.ty.as_ref())
            .map(Type::to_string)
    }

    fn messages(ctx: &CompilerContext) -> Vec<String> {
        ctx.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn test_function_signature() {
        let ctx = analyze(&[("main.sbl", "fn add(a: i32, b: i32) -> i32 { return a + b; }")]);
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(type_of(&ctx, "main", "add"), Some("fn(i32, i32) -> i32".to_string()));

        let root = ctx.get_module("main").unwrap().scope;
        let body = ctx.scopes.lookup_local(root, "add").unwrap().scope.unwrap();
        assert_eq!(
            ctx.scopes.lookup_local(body, "a").unwrap().ty,
            Some(Type::primitive(PrimitiveType::I32))
        );
        assert_eq!(ctx.module_phase("main"), ModulePhase::Resolved);
    }

    #[test]
    fn test_type_alias_and_fields() {
        let ctx = analyze(&[(
            "main.sbl",
            "type Point struct { .x: i32, .y: f64 }; let origin: Point; type Ids []u64;",
        )]);
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(type_of(&ctx, "main", "origin"), Some("Point".to_string()));

        let root = ctx.get_module("main").unwrap().scope;
        let point = ctx.scopes.lookup_local(root, "Point").unwrap();
        let ty = point.ty.clone().unwrap();
        assert_eq!(ty.unwrap_alias().to_string(), "Point { x: i32, y: f64 }");
        let members = point.scope.unwrap();
        assert_eq!(
            ctx.scopes.lookup_local(members, "y").unwrap().ty,
            Some(Type::primitive(PrimitiveType::F64))
        );
        let ids = ctx.scopes.lookup_local(root, "Ids").unwrap().ty.clone().unwrap();
        assert_eq!(ids.unwrap_alias().to_string(), "[]u64");
    }

    #[test]
    fn test_self_referential_type() {
        let ctx = analyze(&[("main.sbl", "type Node struct { .next: []Node };")]);
        assert!(ctx.diagnostics.is_empty());
        let root = ctx.get_module("main").unwrap().scope;
        let node = ctx.scopes.lookup_local(root, "Node").unwrap().ty.clone().unwrap();
        assert_eq!(node.unwrap_alias().to_string(), "Node { next: []Node }");
    }

    #[test]
    fn test_unknown_names() {
        let ctx = analyze(&[(
            "main.sbl",
            "fn f(p: Missing) -> i32 { return q; }",
        )]);
        assert_eq!(
            messages(&ctx),
            vec![
                "type 'Missing' not found in symbol table".to_string(),
                "undefined symbol: q".to_string(),
            ]
        );
        // the body is still resolved but the signature stays absent
        assert_eq!(type_of(&ctx, "main", "f"), None);
    }

    #[test]
    fn test_method_signature() {
        let ctx = analyze(&[(
            "main.sbl",
            "type Point struct { .x: i32 }; fn (p: Point) scaled(k: i32) -> i32 { return p.x * k; }",
        )]);
        assert!(ctx.diagnostics.is_empty());
        let root = ctx.get_module("main").unwrap().scope;
        let members = ctx.scopes.lookup_local(root, "Point").unwrap().scope.unwrap();
        let method = ctx.scopes.lookup_local(members, "scaled").unwrap();
        assert_eq!(method.ty.as_ref().map(Type::to_string), Some("fn(i32) -> i32".to_string()));
        let receiver = ctx.scopes.lookup_local(method.scope.unwrap(), "p").unwrap();
        assert_eq!(receiver.ty.as_ref().map(Type::to_string), Some("Point".to_string()));
    }

    #[test]
    fn test_imported_types_and_symbols() {
        let ctx = analyze(&[
            ("main.sbl", "import \"geo\" as g; let at: g::Coord; fn f() { g::origin; g::nothing; nope::x; }"),
            ("geo.sbl", "type Coord struct { .x: i64 }; let origin: Coord;"),
        ]);
        assert_eq!(
            messages(&ctx),
            vec![
                "symbol 'nothing' not found in module 'g'".to_string(),
                "imported module 'nope' not found".to_string(),
            ]
        );
        assert_eq!(ctx.module_phase("geo"), ModulePhase::Resolved);
        assert_eq!(type_of(&ctx, "main", "at"), Some("Coord".to_string()));
        assert_eq!(type_of(&ctx, "geo", "origin"), Some("Coord".to_string()));
    }

    #[test]
    fn test_scoped_type_without_import() {
        let ctx = analyze(&[("main.sbl", "let at: geo::Coord;")]);
        assert_eq!(messages(&ctx), vec!["module 'geo' is not imported".to_string()]);
    }

    #[test]
    fn test_function_literal_signature() {
        let ctx = analyze(&[("main.sbl", "let f := fn(n: i32) -> bool { return n > 0; };")]);
        assert!(ctx.diagnostics.is_empty());
        assert_eq!(type_of(&ctx, "main", "__fn_lit_0"), Some("fn(i32) -> bool".to_string()));
    }

    #[test]
    fn test_assignment_arity() {
        let ctx = analyze(&[("main.sbl", "let a, b := 1, 2; a, b = 3;")]);
        assert_eq!(
            messages(&ctx),
            vec!["assignment mismatch: 2 variables but 1 values".to_string()]
        );
    }

    #[test]
    fn test_declaration_arity() {
        let ctx = analyze(&[("main.sbl", "let a, b := 1; let c := 2, 3; let d: i32;")]);
        assert_eq!(
            messages(&ctx),
            vec![
                "assignment mismatch: 2 variables but 1 values".to_string(),
                "assignment mismatch: 1 variables but 2 values".to_string(),
            ]
        );
    }

    #[test]
    fn test_method_on_function_does_not_leak_into_its_body() {
        let ctx = analyze(&[("main.sbl", "fn g() { m; } fn (p: g) m() {}")]);
        assert_eq!(
            messages(&ctx),
            vec![
                "receiver 'g' is not a type".to_string(),
                "undefined symbol: m".to_string(),
            ]
        );
    }

    #[test]
    fn test_unready_module_reports_its_file() {
        let mut host = ModuleLoader::new(
            CompilerOptions::new("/proj"),
            MemorySources::new().with_file("/proj/main.sbl", "let a := 1;"),
        );
        let mut ctx = CompilerContext::new().unwrap();
        let entry = Path::new("/proj/main.sbl");
        let program = host.parse(entry).unwrap();
        ctx.add_module("main", entry, program);

        Resolver::new(&mut ctx).resolve("main");
        let report = ctx.diagnostics.iter().next().unwrap();
        assert_eq!(report.file, "/proj/main.sbl");
        assert_eq!(report.message, "module 'main' is not ready for resolution (phase: Parsed)");
        assert!(ctx.diagnostics.should_stop());
        assert_eq!(ctx.module_phase("main"), ModulePhase::Parsed);
    }
}
