//! Semantic analysis: scopes, module registry and the analysis passes
//!
//! Passes run in order per module: collection declares names, resolution
//! attaches types derived from annotations and checks name uses, and type
//! checking infers what the annotations left open.

pub mod collector;
pub mod context;
pub mod derive;
pub mod diagnostics;
pub mod graph;
pub mod resolver;
pub mod symbols;
pub mod typecheck;

use std::rc::Rc;

use crate::frontend::ast::Program;
use context::CompilerContext;
use symbols::ScopeId;

pub use collector::Collector;
pub use context::{Module, ModulePhase};
pub use diagnostics::{Diagnostic, Diagnostics, Phase, Severity};
pub use graph::DependencyGraph;
pub use resolver::Resolver;
pub use symbols::{ScopeArena, ScopeKind, Symbol, SymbolDump, SymbolKind};
pub use typecheck::TypeChecker;

/// The module a pass is currently walking
pub(crate) struct Unit {
    pub key: String,
    /// Physical path, used for diagnostics
    pub file: String,
    pub root: ScopeId,
    pub ast: Rc<Program>,
}

impl Unit {
    pub fn of(ctx: &CompilerContext, key: &str) -> Option<Self> {
        ctx.module(key).map(|module| Self {
            key: module.key.clone(),
            file: module.file_name(),
            root: module.scope,
            ast: Rc::clone(&module.ast),
        })
    }
}
