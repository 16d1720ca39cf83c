//! Symbol collection (pass 1)
//!
//! Declares every named entity of a module in the scope tree, following
//! imports depth-first so that imported modules are collected before the
//! module that imports them finishes. No types are assigned here.

use std::path::PathBuf;

use crate::frontend::ast::*;
use crate::frontend::module::ModuleHost;
use crate::semantic::context::{CompilerContext, ModulePhase};
use crate::semantic::diagnostics::{Diagnostic, Phase, Severity};
use crate::semantic::symbols::{ScopeId, Symbol, SymbolKind};
use crate::semantic::Unit;
use crate::utils::Span;

/// Pass 1 driver
pub struct Collector<'a> {
    ctx: &'a mut CompilerContext,
    host: &'a mut dyn ModuleHost,
}

impl<'a> Collector<'a> {
    pub fn new(ctx: &'a mut CompilerContext, host: &'a mut dyn ModuleHost) -> Self {
        Self { ctx, host }
    }

    /// Collect the module registered under `key`, then mark it `Collected`
    pub fn collect(&mut self, key: &str) {
        if !self.ctx.can_process_phase(key, ModulePhase::Collected) {
            let phase = self.ctx.module_phase(key);
            if phase >= ModulePhase::Collected {
                log::trace!("module '{}' already collected", key);
            } else {
                let file = self.ctx.module(key).map_or_else(|| key.to_string(), |m| m.file_name());
                self.ctx.diagnostics.critical_error(
                    &file,
                    Span::dummy(),
                    format!("module '{}' is not ready for symbol collection (phase: {})", key, phase),
                    Phase::Collecting,
                );
            }
            return;
        }

        let Some(unit) = Unit::of(self.ctx, key) else {
            return;
        };
        log::debug!("collecting symbols for '{}'", key);

        for stmt in &unit.ast.stmts {
            self.collect_stmt(&unit, stmt, unit.root);
        }
        self.ctx.set_module_phase(key, ModulePhase::Collected);
    }

    fn collect_stmt(&mut self, unit: &Unit, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Import(import) => self.collect_import(unit, import, scope),
            Stmt::Function(func) => self.collect_function(unit, func, scope),
            Stmt::Method(method) => self.collect_method(unit, method, scope),
            Stmt::VarDecl(decl) => self.collect_var_decl(unit, decl, scope),
            Stmt::TypeDecl(decl) => self.collect_type_decl(unit, decl, scope),
            Stmt::Assign(assign) => {
                for expr in assign.targets.iter().chain(&assign.values) {
                    self.collect_expr(unit, expr, scope);
                }
            }
            Stmt::If(stmt) => self.collect_if(unit, stmt, scope),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.collect_expr(unit, value, scope);
                }
            }
            Stmt::Block(block) => self.collect_block(unit, block, scope),
            Stmt::Expr(expr) => self.collect_expr(unit, expr, scope),
        }
    }

    fn collect_block(&mut self, unit: &Unit, block: &Block, scope: ScopeId) {
        for stmt in &block.stmts {
            self.collect_stmt(unit, stmt, scope);
        }
    }

    fn collect_if(&mut self, unit: &Unit, stmt: &IfStmt, scope: ScopeId) {
        self.collect_expr(unit, &stmt.cond, scope);
        self.collect_block(unit, &stmt.then_block, scope);
        if let Some(branch) = &stmt.else_branch {
            self.collect_stmt(unit, branch, scope);
        }
    }

    /// Only function literals declare anything inside expressions
    fn collect_expr(&mut self, unit: &Unit, expr: &Expr, scope: ScopeId) {
        match expr {
            Expr::Function(func) => self.collect_function(unit, func, scope),
            Expr::Binary { left, right, .. } => {
                self.collect_expr(unit, left, scope);
                self.collect_expr(unit, right, scope);
            }
            Expr::Unary { expr, .. } | Expr::Field { expr, .. } => {
                self.collect_expr(unit, expr, scope)
            }
            Expr::Call { func, args, .. } => {
                self.collect_expr(unit, func, scope);
                for arg in args {
                    self.collect_expr(unit, arg, scope);
                }
            }
            Expr::Index { expr, index, .. } => {
                self.collect_expr(unit, expr, scope);
                self.collect_expr(unit, index, scope);
            }
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.collect_expr(unit, element, scope);
                }
            }
            Expr::Literal(_) | Expr::Ident(_) | Expr::Scoped { .. } => {}
        }
    }

    /// Declare `symbol` and return its member scope, if it has one.
    /// Failures are reported here and yield `None`.
    fn declare(&mut self, unit: &Unit, scope: ScopeId, symbol: Symbol) -> Option<ScopeId> {
        if symbol.name.is_empty() {
            self.error(unit, symbol.span, format!("{} declaration is missing a name", symbol.kind));
            return None;
        }
        let span = symbol.span;
        match self.ctx.scopes.declare(scope, symbol) {
            Ok(members) => members,
            Err(err) => {
                self.error(unit, span, err.to_string());
                None
            }
        }
    }

    fn error(&mut self, unit: &Unit, span: Span, message: String) {
        self.ctx
            .diagnostics
            .semantic_error(&unit.file, span, message, Phase::Collecting);
    }

    fn collect_var_decl(&mut self, unit: &Unit, decl: &VarDecl, scope: ScopeId) {
        let kind = if decl.is_const { SymbolKind::Const } else { SymbolKind::Var };
        for target in &decl.targets {
            let symbol = Symbol::new(target.name.name.clone(), kind, target.name.span);
            // a failed name does not stop its siblings
            self.declare(unit, scope, symbol);
        }
        for value in &decl.values {
            self.collect_expr(unit, value, scope);
        }
    }

    fn collect_type_decl(&mut self, unit: &Unit, decl: &TypeDecl, scope: ScopeId) {
        let symbol = Symbol::new(decl.name.name.clone(), SymbolKind::Type, decl.name.span);
        let Some(members) = self.declare(unit, scope, symbol) else {
            return;
        };
        if let TypeExpr::Struct { fields, .. } = &decl.ty {
            for field in fields {
                let symbol = Symbol::new(field.name.name.clone(), SymbolKind::Field, field.name.span);
                self.declare(unit, members, symbol);
            }
        }
    }

    fn collect_function(&mut self, unit: &Unit, func: &Function, scope: ScopeId) {
        let symbol = Symbol::new(func.name.name.clone(), SymbolKind::Func, func.name.span);
        let Some(body) = self.declare(unit, scope, symbol) else {
            return;
        };
        self.collect_signature_and_body(unit, func, body);
    }

    fn collect_signature_and_body(&mut self, unit: &Unit, func: &Function, body: ScopeId) {
        for param in &func.params {
            let symbol = Symbol::new(param.name.name.clone(), SymbolKind::Var, param.name.span);
            self.declare(unit, body, symbol);
        }
        self.collect_block(unit, &func.body, body);
    }

    fn collect_method(&mut self, unit: &Unit, method: &Method, scope: ScopeId) {
        let receiver = &method.receiver;
        let TypeExpr::Named(type_name) = &receiver.ty else {
            self.error(
                unit,
                receiver.ty.span(),
                "method receiver must be a user-defined type".to_string(),
            );
            return;
        };

        let found = self
            .ctx
            .scopes
            .lookup(scope, &type_name.name)
            .map(|symbol| (symbol.kind.is_type(), symbol.scope));
        let members = match found {
            None => {
                self.error(
                    unit,
                    type_name.span,
                    format!("receiver type '{}' not found in symbol table", type_name.name),
                );
                return;
            }
            Some((false, _)) => {
                self.error(unit, type_name.span, format!("receiver '{}' is not a type", type_name.name));
                return;
            }
            Some((true, None)) => {
                self.error(
                    unit,
                    type_name.span,
                    format!("receiver '{}' is not a type with members", type_name.name),
                );
                return;
            }
            Some((true, Some(members))) => members,
        };

        let func = &method.function;
        let symbol = Symbol::new(func.name.name.clone(), SymbolKind::Method, func.name.span);
        let Some(body) = self.declare(unit, members, symbol) else {
            return;
        };
        let this = Symbol::new(receiver.name.name.clone(), SymbolKind::Var, receiver.name.span);
        self.declare(unit, body, this);
        self.collect_signature_and_body(unit, func, body);
    }

    fn collect_import(&mut self, unit: &Unit, import: &Import, scope: ScopeId) {
        let alias = import.alias_name();
        let current = PathBuf::from(&unit.file);

        let physical = match self.host.resolve(&import.path, &current) {
            Ok(path) => path,
            Err(err) => {
                let diagnostic = Diagnostic::new(
                    unit.file.as_str(),
                    import.span,
                    err.to_string(),
                    Severity::CriticalError,
                    Phase::Collecting,
                );
                self.ctx.diagnostics.add(diagnostic);
                return;
            }
        };
        let key = self.host.import_key(&physical);

        // Must run before the target is parsed or collected
        let fresh_edge = !self.ctx.graph.has_edge(&unit.key, &key);
        if let Some(cycle) = self.ctx.graph.detect_cycle(&unit.key, &key) {
            let diagnostic = Diagnostic::new(
                unit.file.as_str(),
                import.span,
                format!("import cycle detected: {}", cycle.join(" -> ")),
                Severity::CriticalError,
                Phase::Collecting,
            )
            .with_hint(format!(
                "'{}' cannot import '{}' because it already depends on it",
                unit.key, key
            ));
            self.ctx.diagnostics.add(diagnostic);
            return;
        }

        if !self.ctx.has_module(&key) {
            match self.host.parse(&physical) {
                Ok(program) => {
                    self.ctx.add_module(&key, &physical, program);
                }
                Err(err) => {
                    let file = physical.display().to_string();
                    self.ctx.diagnostics.syntax_error(
                        &file,
                        err.span().unwrap_or_default(),
                        err.to_string(),
                        Phase::Parsing,
                    );
                    self.error(unit, import.span, format!("failed to parse imported module '{}'", import.path));
                    self.drop_edge(unit, &key, fresh_edge);
                    return;
                }
            }
        }

        let Some(target) = self.ctx.module(&key).map(|m| m.scope) else {
            self.drop_edge(unit, &key, fresh_edge);
            return;
        };
        if let Err(err) = self.ctx.scopes.add_import(scope, &alias, &key, target) {
            self.error(unit, import.span, err.to_string());
            self.drop_edge(unit, &key, fresh_edge);
            return;
        }

        if self.ctx.module_phase(&key) >= ModulePhase::Collected {
            return;
        }
        self.collect(&key);
    }

    /// Forget the edge of an import that failed after the cycle check,
    /// unless an earlier import of the same module added it
    fn drop_edge(&mut self, unit: &Unit, key: &str, fresh: bool) {
        if fresh {
            self.ctx.graph.remove_edge(&unit.key, key);
        }
    }
}
