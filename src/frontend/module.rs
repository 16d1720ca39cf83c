//! Module System for Sable
//!
//! Maps import strings to physical files, derives canonical import keys
//! and parses module sources. The semantic passes only see the
//! [`ModuleHost`] seam so tests can run against in-memory sources.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::CompilerOptions;
use crate::frontend::ast::Program;
use crate::frontend::parser::parse_source;
use crate::utils::{Error, Result};

/// Extension of Sable source files
pub const SOURCE_EXTENSION: &str = "sbl";
/// Import prefix marking a remote module
pub const REMOTE_PREFIX: &str = "github.com/";
/// Directory under the project root holding installed remote modules
pub const REMOTE_CACHE_DIR: &str = ".modules";

/// Resolves import strings to physical paths and canonical keys
pub trait ModuleResolver {
    /// Physical path of `import`, as written inside `current_file`
    fn resolve(&self, import: &str, current_file: &Path) -> Result<PathBuf>;

    /// Canonical key identifying the module at `physical`
    fn import_key(&self, physical: &Path) -> String;
}

/// Produces the AST of a module file
pub trait SourceParser {
    fn parse(&mut self, physical: &Path) -> Result<Program>;
}

/// Everything the collector needs from the outside world
pub trait ModuleHost: ModuleResolver + SourceParser {}

impl<T: ModuleResolver + SourceParser> ModuleHost for T {}

/// Backing storage for module sources
pub trait SourceStore {
    fn read(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
}

/// Sources read from the file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSources;

impl SourceStore for FsSources {
    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("failed to read {}: {}", path.display(), e)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Sources held in memory, keyed by normalized path
#[derive(Debug, Default, Clone)]
pub struct MemorySources {
    files: HashMap<PathBuf, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files.insert(normalize_path(path.as_ref()), source.into());
    }

    /// Builder form of [`MemorySources::insert`]
    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl SourceStore for MemorySources {
    fn read(&self, path: &Path) -> Result<String> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| Error::Io(format!("no such file: {}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }
}

/// Lexically normalize a path, folding `.` and `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Default module host: resolves imports against the project layout and
/// parses with the built-in parser
#[derive(Debug)]
pub struct ModuleLoader<S: SourceStore = FsSources> {
    options: CompilerOptions,
    store: S,
    /// File IDs handed out so far, indexed by ID
    files: Vec<PathBuf>,
}

impl ModuleLoader<FsSources> {
    /// Loader reading from disk
    pub fn from_fs(options: CompilerOptions) -> Self {
        Self::new(options, FsSources)
    }
}

impl<S: SourceStore> ModuleLoader<S> {
    pub fn new(options: CompilerOptions, store: S) -> Self {
        Self {
            options,
            store,
            files: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Path of the file that was assigned `file_id`
    pub fn file_path(&self, file_id: usize) -> Option<&Path> {
        self.files.get(file_id).map(PathBuf::as_path)
    }

    pub fn read_source(&self, physical: &Path) -> Result<String> {
        self.store.read(physical)
    }

    fn with_extension(import: &str) -> String {
        let suffix = format!(".{}", SOURCE_EXTENSION);
        if import.ends_with(&suffix) {
            import.to_string()
        } else {
            format!("{}{}", import, suffix)
        }
    }

    fn resolve_remote(&self, import: &str) -> Result<PathBuf> {
        if !self.options.allow_remote_imports {
            return Err(Error::NotPermitted {
                import: import.to_string(),
            });
        }
        let candidate = normalize_path(
            &self
                .options
                .project_root
                .join(REMOTE_CACHE_DIR)
                .join(Self::with_extension(import)),
        );
        if self.store.exists(&candidate) {
            Ok(candidate)
        } else {
            Err(Error::NotInstalled {
                import: import.to_string(),
            })
        }
    }
}

impl<S: SourceStore> ModuleResolver for ModuleLoader<S> {
    fn resolve(&self, import: &str, current_file: &Path) -> Result<PathBuf> {
        let import = import.replace('\\', "/");
        if import.is_empty() {
            return Err(Error::ModuleNotFound { import });
        }
        if import.starts_with(REMOTE_PREFIX) {
            return self.resolve_remote(&import);
        }

        let file = Self::with_extension(&import);
        let mut bases = Vec::with_capacity(self.options.search_paths.len() + 2);
        if let Some(dir) = current_file.parent() {
            bases.push(dir.to_path_buf());
        }
        bases.push(self.options.project_root.clone());
        bases.extend(self.options.search_paths.iter().cloned());

        for base in bases {
            let candidate = normalize_path(&base.join(&file));
            if self.store.exists(&candidate) {
                log::trace!("resolved import '{}' to {}", import, candidate.display());
                return Ok(candidate);
            }
        }

        Err(Error::ModuleNotFound { import })
    }

    fn import_key(&self, physical: &Path) -> String {
        let physical = normalize_path(physical);
        let root = normalize_path(&self.options.project_root);
        let relative = physical.strip_prefix(&root).unwrap_or(&physical);

        let mut key = relative.to_string_lossy().replace('\\', "/");
        let suffix = format!(".{}", SOURCE_EXTENSION);
        if let Some(stripped) = key.strip_suffix(&suffix) {
            key = stripped.to_string();
        }
        key
    }
}

impl<S: SourceStore> SourceParser for ModuleLoader<S> {
    fn parse(&mut self, physical: &Path) -> Result<Program> {
        let source = self.store.read(physical)?;
        let file_id = self.files.len();
        self.files.push(physical.to_path_buf());
        log::debug!("parsing {} (file {})", physical.display(), file_id);
        parse_source(&source, file_id)
    }
}
