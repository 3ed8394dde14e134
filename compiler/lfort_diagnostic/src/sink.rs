//! The diagnostics sink shared by the intrinsic builders and the backends.

use lfort_ir::Span;

use crate::{Diagnostic, ErrorCode, ErrorGuaranteed};

/// Ordered collection of diagnostics for one compile step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic of any severity.
    pub fn push(&mut self, diag: Diagnostic) {
        if diag.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
    }

    /// Record an error and get the proof that it was recorded.
    pub fn emit(&mut self, diag: Diagnostic) -> ErrorGuaranteed {
        let diag = if diag.is_error() {
            diag
        } else {
            Diagnostic {
                severity: crate::Severity::Error,
                ..diag
            }
        };
        self.push(diag);
        ErrorGuaranteed::after_emit()
    }

    /// Record an error with code `code` at `span`.
    pub fn append_error_with_code(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        self.push(
            Diagnostic::error(code)
                .with_message(message)
                .with_label(span, ""),
        );
    }

    /// Record an intrinsic builder error at `span`.
    pub fn append_error(&mut self, message: impl Into<String>, span: Span) {
        self.append_error_with_code(ErrorCode::E1002, message, span);
    }

    /// Record `message` unless `cond` holds; returns `cond`.
    pub fn require(&mut self, cond: bool, message: impl Into<String>, span: Span) -> bool {
        if !cond {
            self.append_error_with_code(ErrorCode::E2001, message, span);
        }
        cond
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Proof of a recorded error, if any.
    pub fn error_guaranteed(&self) -> Option<ErrorGuaranteed> {
        ErrorGuaranteed::from_error_count(self.error_count)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// One line per diagnostic, in the order they were recorded.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for diag in &self.diagnostics {
            out.push_str(&diag.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests;
