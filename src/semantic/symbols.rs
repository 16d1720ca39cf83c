//! Symbols and lexical scopes
//!
//! All scopes of a compilation live in one [`ScopeArena`] and refer to
//! each other by [`ScopeId`]. A scope records its parent, its symbols and
//! the modules imported into it. Function, method, type and struct symbols
//! own a child scope holding their members.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::types::{PrimitiveType, Type};
use crate::utils::{Error, Result, Span};

/// Scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Var,
    Const,
    Type,
    Func,
    Struct,
    Field,
    Method,
}

impl SymbolKind {
    /// Kinds whose declaration opens a member scope
    pub fn opens_scope(&self) -> bool {
        matches!(self, Self::Func | Self::Method | Self::Type | Self::Struct)
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type | Self::Struct)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Func | Self::Method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Const => "const",
            Self::Type => "type",
            Self::Func => "func",
            Self::Struct => "struct",
            Self::Field => "field",
            Self::Method => "method",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Global,
    Function,
}

/// A declared symbol
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Absent until the resolver (or typechecker) fills it in
    pub ty: Option<Type>,
    /// Declaration site
    pub span: Span,
    /// Member scope for functions, methods, types and structs
    pub scope: Option<ScopeId>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            ty: None,
            span,
            scope: None,
        }
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// A lexical scope
#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
    /// Alias -> root scope of the imported module
    imports: HashMap<String, ScopeId>,
    /// Alias -> import key of the imported module
    import_paths: HashMap<String, String>,
}

/// Serializable view of a scope's symbols
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolDump {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<SymbolDump>,
}

/// Storage for every scope of a compilation
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty scope
    pub fn alloc(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            kind,
            symbols: HashMap::new(),
            imports: HashMap::new(),
            import_paths: HashMap::new(),
        });
        id
    }

    /// Number of allocated scopes
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope.0].kind
    }

    pub fn set_kind(&mut self, scope: ScopeId, kind: ScopeKind) {
        self.scopes[scope.0].kind = kind;
    }

    /// Declare a symbol in `scope`.
    ///
    /// Fails if the name already exists in that scope; outer scopes may be
    /// shadowed. Scope-opening kinds get a fresh child scope, which is
    /// returned and recorded on the symbol.
    pub fn declare(&mut self, scope: ScopeId, mut symbol: Symbol) -> Result<Option<ScopeId>> {
        if self.scopes[scope.0].symbols.contains_key(&symbol.name) {
            return Err(Error::DuplicateSymbol {
                name: symbol.name,
                span: symbol.span,
            });
        }

        let owned = if symbol.kind.opens_scope() {
            let kind = if symbol.kind.is_callable() {
                ScopeKind::Function
            } else {
                ScopeKind::Global
            };
            Some(self.alloc(Some(scope), kind))
        } else {
            None
        };
        symbol.scope = owned;

        self.scopes[scope.0].symbols.insert(symbol.name.clone(), symbol);
        Ok(owned)
    }

    /// Look up a symbol, searching from `scope` upward
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.lookup_with_scope(scope, name).map(|(_, symbol)| symbol)
    }

    /// Like [`ScopeArena::lookup`], also returning the scope that holds it
    pub fn lookup_with_scope(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Symbol)> {
        let mut scope_id = Some(scope);
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id.0].symbols.get(name) {
                return Some((id, symbol));
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Look up a symbol only in `scope`
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope.0].symbols.get(name)
    }

    pub fn symbol_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Symbol> {
        self.scopes[scope.0].symbols.get_mut(name)
    }

    /// Attach a type to a symbol declared directly in `scope`
    pub fn set_type(&mut self, scope: ScopeId, name: &str, ty: Type) -> bool {
        match self.symbol_mut(scope, name) {
            Some(symbol) => {
                symbol.ty = Some(ty);
                true
            }
            None => false,
        }
    }

    /// Member scope of the symbol `name` declared in `scope` at `span`.
    ///
    /// Returns `None` when the name is bound to a different declaration,
    /// which happens for duplicates rejected during collection.
    pub fn owned_scope(&self, scope: ScopeId, name: &str, span: Span) -> Option<ScopeId> {
        self.lookup_local(scope, name)
            .filter(|symbol| symbol.span == span)
            .and_then(|symbol| symbol.scope)
    }

    /// Member scope of the type visible as `name` from `scope`.
    /// Non-type symbols have no members, even when they own a scope.
    pub fn member_scope(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.lookup(scope, name)
            .filter(|symbol| symbol.kind.is_type())
            .and_then(|symbol| symbol.scope)
    }

    /// Whether `name` in `scope` is bound to the declaration at `span`
    pub fn is_declared_at(&self, scope: ScopeId, name: &str, span: Span) -> bool {
        self.lookup_local(scope, name)
            .map_or(false, |symbol| symbol.span == span)
    }

    /// Iterate over the symbols declared directly in `scope`
    pub fn symbols(&self, scope: ScopeId) -> impl Iterator<Item = &Symbol> {
        self.scopes[scope.0].symbols.values()
    }

    // ==================== Imports ====================

    /// Record that `table` (a module root) is visible in `scope` as `alias`
    pub fn add_import(&mut self, scope: ScopeId, alias: &str, path: &str, table: ScopeId) -> Result<()> {
        let target = &self.scopes[scope.0];

        if let Some((existing_alias, _)) = target
            .import_paths
            .iter()
            .find(|(_, existing)| existing.as_str() == path)
        {
            if existing_alias == alias {
                return Err(Error::AlreadyImported {
                    path: path.to_string(),
                });
            }
            return Err(Error::AlreadyImportedAs {
                path: path.to_string(),
                alias: existing_alias.clone(),
            });
        }

        if let Some(existing) = self.check_import_conflict(scope, alias) {
            return Err(Error::AliasInUse {
                alias: alias.to_string(),
                path: existing.to_string(),
            });
        }

        let target = &mut self.scopes[scope.0];
        target.imports.insert(alias.to_string(), table);
        target.import_paths.insert(alias.to_string(), path.to_string());
        Ok(())
    }

    /// Path already bound to `alias` in `scope`, if any
    pub fn check_import_conflict(&self, scope: ScopeId, alias: &str) -> Option<&str> {
        self.scopes[scope.0].import_paths.get(alias).map(String::as_str)
    }

    /// Imported module root for `alias`, searching `scope` and its ancestors
    pub fn imported_table(&self, scope: ScopeId, alias: &str) -> Result<ScopeId> {
        let mut scope_id = Some(scope);
        while let Some(id) = scope_id {
            if let Some(table) = self.scopes[id.0].imports.get(alias) {
                return Ok(*table);
            }
            scope_id = self.scopes[id.0].parent;
        }
        Err(Error::ImportedModuleNotFound {
            alias: alias.to_string(),
        })
    }

    /// Import key bound to `alias`, searching `scope` and its ancestors
    pub fn import_path(&self, scope: ScopeId, alias: &str) -> Option<&str> {
        let mut scope_id = Some(scope);
        while let Some(id) = scope_id {
            if let Some(path) = self.scopes[id.0].import_paths.get(alias) {
                return Some(path);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Aliases imported directly into `scope`, sorted
    pub fn import_aliases(&self, scope: ScopeId) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.scopes[scope.0]
            .imports
            .keys()
            .map(String::as_str)
            .collect();
        aliases.sort_unstable();
        aliases
    }

    /// Whether `scope` or any ancestor is a function scope
    pub fn is_in_function_scope(&self, scope: ScopeId) -> bool {
        let current = &self.scopes[scope.0];
        if current.kind == ScopeKind::Function {
            return true;
        }
        match current.parent {
            Some(parent) => self.is_in_function_scope(parent),
            None => false,
        }
    }

    /// Symbols of `scope` and their member scopes, sorted by name
    pub fn dump(&self, scope: ScopeId) -> Vec<SymbolDump> {
        let mut out: Vec<SymbolDump> = self
            .symbols(scope)
            .map(|symbol| SymbolDump {
                name: symbol.name.clone(),
                kind: symbol.kind,
                ty: symbol.ty.as_ref().map(Type::to_string),
                members: symbol.scope.map(|s| self.dump(s)).unwrap_or_default(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

/// Declare every builtin primitive type in `scope`
pub fn declare_prelude(arena: &mut ScopeArena, scope: ScopeId) -> Result<()> {
    for prim in PrimitiveType::ALL {
        let symbol = Symbol::new(prim.name(), SymbolKind::Type, Span::dummy())
            .with_type(Type::primitive(prim));
        arena.declare(scope, symbol)?;
    }
    Ok(())
}
