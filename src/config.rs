//! Compiler configuration

use std::path::PathBuf;

/// Options controlling module lookup
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Root directory of the project; import keys are relative to it
    pub project_root: PathBuf,
    /// Extra directories searched for local imports, in order
    pub search_paths: Vec<PathBuf>,
    /// Allow `github.com/...` imports from the `.modules` cache
    pub allow_remote_imports: bool,
}

impl CompilerOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            search_paths: Vec::new(),
            allow_remote_imports: false,
        }
    }

    /// Add a search path
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
        self
    }

    pub fn with_remote_imports(mut self, allow: bool) -> Self {
        self.allow_remote_imports = allow;
        self
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self::new(".")
    }
}
