//! Diagnostic collection
//!
//! Errors found by the passes are recorded here instead of aborting.
//! Syntax and critical errors raise a deferred stop flag that the driver
//! checks between passes.

use serde::Serialize;
use std::fmt;

use crate::utils::Span;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    SemanticError,
    SyntaxError,
    CriticalError,
}

impl Severity {
    pub fn is_error(&self) -> bool {
        *self >= Severity::Error
    }

    /// Severities that stop the pipeline after the current pass
    pub fn halts(&self) -> bool {
        matches!(self, Severity::SyntaxError | Severity::CriticalError)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::SemanticError => "semantic error",
            Severity::SyntaxError => "syntax error",
            Severity::CriticalError => "critical error",
        })
    }
}

/// Compiler phase a diagnostic was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lexing,
    Parsing,
    Collecting,
    Resolving,
    Typechecking,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Lexing => "lexing",
            Phase::Parsing => "parsing",
            Phase::Collecting => "collecting symbols",
            Phase::Resolving => "resolving",
            Phase::Typechecking => "type checking",
        })
    }
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub span: Span,
    pub message: String,
    pub severity: Severity,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
        severity: Severity,
        phase: Phase,
    ) -> Self {
        Self {
            file: file.into(),
            span,
            message: message.into(),
            severity,
            phase,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} while {}]: {}", self.severity, self.phase, self.message)?;
        write!(f, "\n  --> {}:{}..{}", self.file, self.span.start, self.span.end)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// Ordered list of diagnostics plus the deferred stop flag
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    should_stop: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => log::info!("{}", diagnostic.message),
            Severity::Warning => log::warn!("{}", diagnostic.message),
            _ => log::debug!("{} ({}): {}", diagnostic.severity, diagnostic.file, diagnostic.message),
        }
        if diagnostic.severity.halts() {
            self.should_stop = true;
        }
        self.items.push(diagnostic);
    }

    fn push(&mut self, file: &str, span: Span, message: impl Into<String>, severity: Severity, phase: Phase) {
        self.add(Diagnostic::new(file, span, message, severity, phase));
    }

    pub fn error(&mut self, file: &str, span: Span, message: impl Into<String>, phase: Phase) {
        self.push(file, span, message, Severity::Error, phase);
    }

    pub fn semantic_error(&mut self, file: &str, span: Span, message: impl Into<String>, phase: Phase) {
        self.push(file, span, message, Severity::SemanticError, phase);
    }

    pub fn syntax_error(&mut self, file: &str, span: Span, message: impl Into<String>, phase: Phase) {
        self.push(file, span, message, Severity::SyntaxError, phase);
    }

    pub fn critical_error(&mut self, file: &str, span: Span, message: impl Into<String>, phase: Phase) {
        self.push(file, span, message, Severity::CriticalError, phase);
    }

    pub fn warning(&mut self, file: &str, span: Span, message: impl Into<String>, phase: Phase) {
        self.push(file, span, message, Severity::Warning, phase);
    }

    pub fn info(&mut self, file: &str, span: Span, message: impl Into<String>, phase: Phase) {
        self.push(file, span, message, Severity::Info, phase);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Warning)
    }

    /// Set once a syntax or critical error has been reported
    pub fn should_stop(&self) -> bool {
        self.should_stop
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.severity.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// One-line tally, e.g. `2 errors, 1 warning`
    pub fn summary(&self) -> String {
        let plural = |n: usize, word: &str| {
            if n == 1 {
                format!("{} {}", n, word)
            } else {
                format!("{} {}s", n, word)
            }
        };
        format!(
            "{}, {}",
            plural(self.error_count(), "error"),
            plural(self.warning_count(), "warning")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_semantic_errors_do_not_stop() {
        let mut diags = Diagnostics::new();
        diags.warning("a.sbl", Span::dummy(), "unused", Phase::Resolving);
        diags.semantic_error("a.sbl", Span::dummy(), "bad alias", Phase::Collecting);
        assert!(diags.has_errors());
        assert!(diags.has_warnings());
        assert!(!diags.should_stop());
        assert_eq!(diags.summary(), "1 error, 1 warning");
    }

    #[test]
    fn test_critical_and_syntax_errors_stop() {
        let mut diags = Diagnostics::new();
        diags.critical_error("a.sbl", Span::dummy(), "cycle", Phase::Collecting);
        assert!(diags.should_stop());

        let mut diags = Diagnostics::new();
        diags.syntax_error("a.sbl", Span::dummy(), "eof", Phase::Parsing);
        diags.info("a.sbl", Span::dummy(), "note", Phase::Parsing);
        assert!(diags.should_stop());
        assert_eq!(diags.count(Severity::SyntaxError), 1);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::new(
            "main.sbl",
            Span::new(7, 12, 0),
            "import cycle detected: main -> main",
            Severity::CriticalError,
            Phase::Collecting,
        )
        .with_hint("remove the import");
        assert_eq!(
            diag.to_string(),
            "[critical error while collecting symbols]: import cycle detected: main -> main\n  --> main.sbl:7..12\n  hint: remove the import"
        );
    }
}
