// diag.rs: Unified diagnostics model
//
// Shared diagnostic types for the textual front end (lex, parse, resolve)
// and for certificate failures reported by the pass runner. The unpack pass
// itself never produces diagnostics.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use chumsky::error::Rich;

use crate::ast::Span;
use crate::lexer::Token;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Lex or parse error.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Duplicate declaration.
    pub const E0101: DiagCode = DiagCode("E0101");
    /// Unknown type name.
    pub const E0102: DiagCode = DiagCode("E0102");
    /// Rank missing on a buffer/image, or given on a scalar parameter.
    pub const E0103: DiagCode = DiagCode("E0103");
    /// Rank or integer literal out of range.
    pub const E0104: DiagCode = DiagCode("E0104");
    /// Load or store through a scalar parameter.
    pub const E0105: DiagCode = DiagCode("E0105");
    /// Unpack certificate obligation not met.
    pub const E0600: DiagCode = DiagCode("E0600");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
        }
    }

    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Convert a chumsky error into an `E0001` diagnostic.
    pub fn from_parse_error(err: &Rich<'_, Token, Span>) -> Self {
        Self::error(*err.span(), err.to_string()).with_code(codes::E0001)
    }
}

/// True if any diagnostic is an error.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        match &self.code {
            Some(code) => write!(f, "{}[{}]: {}", level, code, self.message)?,
            None => write!(f, "{}: {}", level, self.message)?,
        }
        write!(f, " (at {}..{})", self.span.start, self.span.end)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        (start..end).into()
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::error(span(0, 1), "something failed");
        assert_eq!(format!("{d}"), "error: something failed (at 0..1)");
    }

    #[test]
    fn display_with_code_and_hint() {
        let d = Diagnostic::new(DiagLevel::Warning, span(4, 9), "shadowed declaration")
            .with_code(codes::E0101)
            .with_hint("rename one of them");
        assert_eq!(
            format!("{d}"),
            "warning[E0101]: shadowed declaration (at 4..9)\n  hint: rename one of them"
        );
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let warn = Diagnostic::new(DiagLevel::Warning, span(0, 0), "w");
        assert!(!has_errors(std::slice::from_ref(&warn)));
        let err = Diagnostic::error(span(0, 0), "e");
        assert!(has_errors(&[warn, err]));
    }
}
