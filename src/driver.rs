//! Compilation driver
//!
//! Runs parse, collection, resolution and type checking for an entry
//! module and everything it imports. A pass is skipped once a syntax or
//! critical error has been reported.

use std::path::Path;

use crate::frontend::module::ModuleHost;
use crate::semantic::context::CompilerContext;
use crate::semantic::diagnostics::{Diagnostics, Phase};
use crate::semantic::{Collector, Resolver, SymbolDump, TypeChecker};
use crate::utils::{Error, Result};

/// Owns the compiler context and the module host for one run
pub struct Compiler<H: ModuleHost> {
    ctx: CompilerContext,
    host: H,
}

impl<H: ModuleHost> Compiler<H> {
    pub fn new(host: H) -> Result<Self> {
        Ok(Self {
            ctx: CompilerContext::new()?,
            host,
        })
    }

    /// Analyze `entry` and its imports. Returns the entry module key.
    ///
    /// Problems in the program end up in [`Compiler::diagnostics`]; only a
    /// source that cannot be read is an `Err`.
    pub fn check(&mut self, entry: &Path) -> Result<String> {
        let key = self.host.import_key(entry);
        self.ctx.entry = Some(key.clone());

        if !self.ctx.has_module(&key) {
            match self.host.parse(entry) {
                Ok(program) => {
                    self.ctx.add_module(&key, entry, program);
                }
                Err(err @ Error::Io(_)) => return Err(err),
                Err(err) => {
                    self.ctx.diagnostics.syntax_error(
                        &entry.display().to_string(),
                        err.span().unwrap_or_default(),
                        err.to_string(),
                        Phase::Parsing,
                    );
                    return Ok(key);
                }
            }
        }

        Collector::new(&mut self.ctx, &mut self.host).collect(&key);
        if self.ctx.diagnostics.should_stop() {
            log::info!("stopping after symbol collection");
            return Ok(key);
        }

        Resolver::new(&mut self.ctx).resolve(&key);
        if self.ctx.diagnostics.should_stop() {
            log::info!("stopping after resolution");
            return Ok(key);
        }

        TypeChecker::new(&mut self.ctx).check(&key);
        Ok(key)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.ctx.diagnostics
    }

    pub fn context(&self) -> &CompilerContext {
        &self.ctx
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Symbols of module `key`, for display
    pub fn dump_symbols(&self, key: &str) -> Result<Vec<SymbolDump>> {
        let module = self.ctx.get_module(key)?;
        Ok(self.ctx.scopes.dump(module.scope))
    }

    pub fn into_context(self) -> CompilerContext {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerOptions;
    use crate::frontend::module::{MemorySources, ModuleLoader};
    use crate::semantic::{ModulePhase, Severity, SymbolKind};
    use crate::types::{PrimitiveType, Type};
    use pretty_assertions::assert_eq;

    fn compiler(files: &[(&str, &str)]) -> Compiler<ModuleLoader<MemorySources>> {
        let mut sources = MemorySources::new();
        for (name, text) in files {
            sources.insert(Path::new("/proj").join(name), *text);
        }
        Compiler::new(ModuleLoader::new(CompilerOptions::new("/proj"), sources)).unwrap()
    }

    #[test]
    fn test_end_to_end_function() {
        let mut compiler = compiler(&[("main.sbl", "fn add(a: i32, b: i32) -> i32 { return a + b; }")]);
        let key = compiler.check(Path::new("/proj/main.sbl")).unwrap();
        assert_eq!(key, "main");
        assert!(compiler.diagnostics().is_empty());

        let ctx = compiler.context();
        assert_eq!(ctx.module_phase("main"), ModulePhase::Typechecked);
        let root = ctx.get_module("main").unwrap().scope;
        let add = ctx.scopes.lookup_local(root, "add").unwrap();
        assert_eq!(add.kind, SymbolKind::Func);
        let i32_ty = Type::primitive(PrimitiveType::I32);
        assert_eq!(
            add.ty,
            Some(Type::function(vec![i32_ty.clone(), i32_ty.clone()], Some(i32_ty.clone())))
        );
        let body = add.scope.unwrap();
        assert_eq!(ctx.scopes.lookup_local(body, "a").unwrap().ty, Some(i32_ty.clone()));
        assert_eq!(ctx.scopes.lookup_local(body, "b").unwrap().ty, Some(i32_ty));
    }

    #[test]
    fn test_end_to_end_import_cycle() {
        let mut compiler = compiler(&[
            ("start.sbl", "import \"other\"; fn main() {}"),
            ("other.sbl", "import \"start\"; fn helper() {}"),
        ]);
        compiler.check(Path::new("/proj/start.sbl")).unwrap();

        let diags = compiler.diagnostics();
        assert!(diags.should_stop());
        assert_eq!(diags.count(Severity::CriticalError), 1);
        assert_eq!(
            diags.iter().next().map(|d| d.message.as_str()),
            Some("import cycle detected: other -> start -> other")
        );

        // both modules were collected, then the run stopped
        let ctx = compiler.context();
        assert_eq!(ctx.module_phase("start"), ModulePhase::Collected);
        assert_eq!(ctx.module_phase("other"), ModulePhase::Collected);
    }

    #[test]
    fn test_semantic_errors_do_not_stop_the_run() {
        let mut compiler = compiler(&[("main.sbl", "let a := 1; let a := 2; let b := a;")]);
        compiler.check(Path::new("/proj/main.sbl")).unwrap();
        assert_eq!(compiler.diagnostics().count(Severity::SemanticError), 1);
        assert_eq!(compiler.context().module_phase("main"), ModulePhase::Typechecked);
    }

    #[test]
    fn test_entry_syntax_error() {
        let mut compiler = compiler(&[("main.sbl", "let = 4;")]);
        let key = compiler.check(Path::new("/proj/main.sbl")).unwrap();
        assert_eq!(key, "main");
        assert_eq!(compiler.diagnostics().count(Severity::SyntaxError), 1);
        assert!(!compiler.context().has_module("main"));
    }

    #[test]
    fn test_missing_entry_is_io_error() {
        let mut compiler = compiler(&[]);
        assert!(matches!(
            compiler.check(Path::new("/proj/absent.sbl")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_diamond_imports_share_one_module() {
        let mut compiler = compiler(&[
            ("main.sbl", "import \"left\"; import \"right\"; let total := left::n;"),
            ("left.sbl", "import \"base\"; let n: base::Num = 1;"),
            ("right.sbl", "import \"base\"; let m: base::Num = 2;"),
            ("base.sbl", "type Num i32;"),
        ]);
        compiler.check(Path::new("/proj/main.sbl")).unwrap();
        assert!(compiler.diagnostics().is_empty());

        let ctx = compiler.context();
        assert_eq!(ctx.module_keys(), vec!["base", "left", "main", "right"]);
        for key in ctx.module_keys() {
            assert_eq!(ctx.module_phase(key), ModulePhase::Typechecked);
        }
        let dump = compiler.dump_symbols("main").unwrap();
        let total = dump.iter().find(|s| s.name == "total").unwrap();
        assert_eq!(total.ty.as_deref(), Some("Num"));
    }
}
