//! Error handling for Sable

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Parser Errors ====================

    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Expected identifier")]
    ExpectedIdent { span: Span },

    #[error("Expected type")]
    ExpectedType { span: Span },

    #[error("Expected expression")]
    ExpectedExpr { span: Span },

    #[error("Unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("Invalid number literal: {text}")]
    InvalidNumber { text: String, span: Span },

    // ==================== Scope Errors ====================

    #[error("symbol '{name}' already declared in this scope")]
    DuplicateSymbol { name: String, span: Span },

    #[error("'{path}' already imported")]
    AlreadyImported { path: String },

    #[error("'{path}' already imported with alias '{alias}'")]
    AlreadyImportedAs { path: String, alias: String },

    #[error("alias '{alias}' is already used by import '{path}'. Use a different alias with 'as'")]
    AliasInUse { alias: String, path: String },

    #[error("imported module '{alias}' not found")]
    ImportedModuleNotFound { alias: String },

    // ==================== Type Derivation Errors ====================

    #[error("module '{module}' is not imported")]
    ModuleNotImported { module: String, span: Span },

    #[error("type '{name}' not found in imported module '{module}'")]
    TypeNotFoundInModule {
        name: String,
        module: String,
        span: Span,
    },

    #[error("type '{name}' not found in symbol table")]
    TypeNotFound { name: String, span: Span },

    #[error("'{name}' is not a type")]
    NotAType { name: String, span: Span },

    // ==================== Module Errors ====================

    #[error("module '{import}' not found")]
    ModuleNotFound { import: String },

    #[error("importing remote module '{import}' is not permitted (enable remote imports)")]
    NotPermitted { import: String },

    #[error("remote module '{import}' is not installed")]
    NotInstalled { import: String },

    #[error("module '{key}' is not registered")]
    UnknownModule { key: String },

    #[error("compiler context already created, cannot create a new one")]
    ContextAlreadyLive,

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::ExpectedIdent { span } => Some(*span),
            Self::ExpectedType { span } => Some(*span),
            Self::ExpectedExpr { span } => Some(*span),
            Self::UnterminatedString { span } => Some(*span),
            Self::InvalidNumber { span, .. } => Some(*span),
            Self::DuplicateSymbol { span, .. } => Some(*span),
            Self::ModuleNotImported { span, .. } => Some(*span),
            Self::TypeNotFoundInModule { span, .. } => Some(*span),
            Self::TypeNotFound { span, .. } => Some(*span),
            Self::NotAType { span, .. } => Some(*span),
            Self::AlreadyImported { .. }
            | Self::AlreadyImportedAs { .. }
            | Self::AliasInUse { .. }
            | Self::ImportedModuleNotFound { .. }
            | Self::ModuleNotFound { .. }
            | Self::NotPermitted { .. }
            | Self::NotInstalled { .. }
            | Self::UnknownModule { .. }
            | Self::ContextAlreadyLive
            | Self::Io(_) => None,
        }
    }

    /// Errors raised while locating a module on disk or in the remote cache
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound { .. } | Self::NotPermitted { .. } | Self::NotInstalled { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_conflict_message() {
        let err = Error::AliasInUse {
            alias: "m".to_string(),
            path: "lib/math".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "alias 'm' is already used by import 'lib/math'. Use a different alias with 'as'"
        );
        assert_eq!(err.span(), None);
    }

    #[test]
    fn test_span_is_carried() {
        let span = Span::new(3, 9, 0);
        let err = Error::TypeNotFound {
            name: "Point".to_string(),
            span,
        };
        assert_eq!(err.span(), Some(span));
        assert_eq!(err.to_string(), "type 'Point' not found in symbol table");
    }
}
