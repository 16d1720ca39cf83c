//! Compiler context: module registry, phase tracking and shared state
//!
//! Only one context may be live per thread at a time.

use serde::Serialize;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::frontend::ast::Program;
use crate::semantic::diagnostics::Diagnostics;
use crate::semantic::graph::DependencyGraph;
use crate::semantic::symbols::{declare_prelude, ScopeArena, ScopeId, ScopeKind};
use crate::utils::{Error, Result};

thread_local! {
    static CONTEXT_LIVE: Cell<bool> = Cell::new(false);
}

/// Processing state of a module. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePhase {
    NotStarted,
    Parsed,
    Collected,
    Resolved,
    Typechecked,
}

impl ModulePhase {
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::NotStarted => None,
            Self::Parsed => Some(Self::NotStarted),
            Self::Collected => Some(Self::Parsed),
            Self::Resolved => Some(Self::Collected),
            Self::Typechecked => Some(Self::Resolved),
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Parsed),
            Self::Parsed => Some(Self::Collected),
            Self::Collected => Some(Self::Resolved),
            Self::Resolved => Some(Self::Typechecked),
            Self::Typechecked => None,
        }
    }
}

impl fmt::Display for ModulePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "Not Started",
            Self::Parsed => "Parsed",
            Self::Collected => "Collected",
            Self::Resolved => "Resolved",
            Self::Typechecked => "Type Checked",
        })
    }
}

/// A registered module
#[derive(Debug)]
pub struct Module {
    pub key: String,
    pub full_path: PathBuf,
    /// Shared so passes can walk the tree while mutating the context
    pub ast: Rc<Program>,
    /// Module root scope, parented to the builtin scope
    pub scope: ScopeId,
    pub phase: ModulePhase,
}

impl Module {
    pub fn file_name(&self) -> String {
        self.full_path.display().to_string()
    }
}

/// State shared by all passes of one compilation
#[derive(Debug)]
pub struct CompilerContext {
    pub scopes: ScopeArena,
    /// Scope holding the builtin primitive types
    pub builtins: ScopeId,
    pub graph: DependencyGraph,
    pub diagnostics: Diagnostics,
    /// Key of the entry module once one is registered
    pub entry: Option<String>,
    modules: HashMap<String, Module>,
}

impl CompilerContext {
    /// Create the context for this thread.
    ///
    /// Fails with [`Error::ContextAlreadyLive`] while another context is
    /// still alive.
    pub fn new() -> Result<Self> {
        if CONTEXT_LIVE.with(|live| live.replace(true)) {
            return Err(Error::ContextAlreadyLive);
        }

        let mut scopes = ScopeArena::new();
        let builtins = scopes.alloc(None, ScopeKind::Global);
        if let Err(err) = declare_prelude(&mut scopes, builtins) {
            CONTEXT_LIVE.with(|live| live.set(false));
            return Err(err);
        }
        log::debug!("compiler context created");

        Ok(Self {
            scopes,
            builtins,
            graph: DependencyGraph::new(),
            diagnostics: Diagnostics::new(),
            entry: None,
            modules: HashMap::new(),
        })
    }

    /// Tear the context down, allowing a new one to be created
    pub fn destroy(self) {
        log::debug!("compiler context destroyed ({} modules)", self.modules.len());
    }

    // ==================== Registry ====================

    /// Register a parsed module under `key`.
    ///
    /// A fresh root scope is created and the phase set to `Parsed`.
    /// Returns false, leaving the existing entry untouched, if `key` is
    /// already registered.
    pub fn add_module(&mut self, key: &str, full_path: impl AsRef<Path>, ast: Program) -> bool {
        if self.modules.contains_key(key) {
            log::trace!("module '{}' already registered", key);
            return false;
        }

        let scope = self.scopes.alloc(Some(self.builtins), ScopeKind::Global);
        self.modules.insert(
            key.to_string(),
            Module {
                key: key.to_string(),
                full_path: full_path.as_ref().to_path_buf(),
                ast: Rc::new(ast),
                scope,
                phase: ModulePhase::Parsed,
            },
        );
        log::debug!("registered module '{}'", key);
        true
    }

    pub fn module(&self, key: &str) -> Option<&Module> {
        self.modules.get(key)
    }

    pub fn get_module(&self, key: &str) -> Result<&Module> {
        self.modules.get(key).ok_or_else(|| Error::UnknownModule {
            key: key.to_string(),
        })
    }

    pub fn has_module(&self, key: &str) -> bool {
        self.modules.contains_key(key)
    }

    pub fn is_module_parsed(&self, key: &str) -> bool {
        self.module_phase(key) >= ModulePhase::Parsed
    }

    /// Current phase; unknown modules are `NotStarted`
    pub fn module_phase(&self, key: &str) -> ModulePhase {
        self.modules
            .get(key)
            .map_or(ModulePhase::NotStarted, |m| m.phase)
    }

    /// Advance a module's phase. Moving backwards or sideways is refused.
    pub fn set_module_phase(&mut self, key: &str, phase: ModulePhase) -> bool {
        match self.modules.get_mut(key) {
            Some(module) if phase > module.phase => {
                log::debug!("module '{}': {} -> {}", key, module.phase, phase);
                module.phase = phase;
                true
            }
            Some(module) => {
                log::warn!(
                    "refusing phase change for '{}' from {} to {}",
                    key, module.phase, phase
                );
                false
            }
            None => false,
        }
    }

    /// A module may run `target` only when it sits exactly one phase before it
    pub fn can_process_phase(&self, key: &str, target: ModulePhase) -> bool {
        target.previous() == Some(self.module_phase(key))
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Registered keys, sorted
    pub fn module_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn remove_module(&mut self, key: &str) -> Option<Module> {
        self.modules.remove(key)
    }

    /// Root scope of the entry module
    pub fn entry_scope(&self) -> Option<ScopeId> {
        self.entry
            .as_deref()
            .and_then(|key| self.modules.get(key))
            .map(|m| m.scope)
    }
}

impl Drop for CompilerContext {
    fn drop(&mut self) {
        CONTEXT_LIVE.with(|live| live.set(false));
    }
}
