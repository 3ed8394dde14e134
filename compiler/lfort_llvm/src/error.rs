//! Errors that abort LLVM IR generation.

use lfort_diagnostic::{Diagnostic, ErrorCode};
use lfort_ir::{DependencyCycle, Span};

/// First unrecoverable problem met while lowering a unit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// Construct the LLVM backend has no lowering for.
    #[error("{what}")]
    NotImplemented { what: String, span: Span },
    /// Type, layout or value the LLVM backend cannot express.
    #[error("{what}")]
    Unsupported { what: String, span: Span },
    #[error("internal error: {what}")]
    Internal { what: String },
    #[error(transparent)]
    DependencyCycle(#[from] DependencyCycle),
    #[error("unknown symbol `{name}`")]
    UnknownSymbol { name: String, span: Span },
}

impl CodegenError {
    pub fn not_implemented(what: impl Into<String>, span: Span) -> Self {
        CodegenError::NotImplemented {
            what: what.into(),
            span,
        }
    }

    pub fn unsupported(what: impl Into<String>, span: Span) -> Self {
        CodegenError::Unsupported {
            what: what.into(),
            span,
        }
    }

    pub fn internal(what: impl Into<String>) -> Self {
        CodegenError::Internal { what: what.into() }
    }

    pub fn unknown_symbol(name: impl Into<String>, span: Span) -> Self {
        CodegenError::UnknownSymbol {
            name: name.into(),
            span,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CodegenError::NotImplemented { .. } => ErrorCode::E3001,
            CodegenError::Unsupported { .. } => ErrorCode::E3002,
            CodegenError::DependencyCycle(_) => ErrorCode::E4001,
            CodegenError::UnknownSymbol { .. } => ErrorCode::E4002,
            CodegenError::Internal { .. } => ErrorCode::E9001,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CodegenError::NotImplemented { span, .. }
            | CodegenError::Unsupported { span, .. }
            | CodegenError::UnknownSymbol { span, .. } => Some(*span),
            CodegenError::Internal { .. } | CodegenError::DependencyCycle(_) => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code()).with_message(self.to_string());
        if let CodegenError::DependencyCycle(cycle) = self {
            if let Some(first) = cycle.path.first() {
                diag = diag.with_note(format!("`{first}` depends on itself"));
            }
        }
        match self.span() {
            Some(span) => diag.with_label(span, "while generating LLVM IR for this"),
            None => diag,
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_carry_no_label() {
        let e = CodegenError::internal("malformed builder state in `f`");
        assert_eq!(e.code(), ErrorCode::E9001);
        let d = e.to_diagnostic();
        assert_eq!(d.message, "internal error: malformed builder state in `f`");
        assert_eq!(d.primary_span(), None);
    }

    #[test]
    fn spans_become_labels() {
        let e = CodegenError::unknown_symbol("x", Span::new(4, 5));
        assert_eq!(e.code(), ErrorCode::E4002);
        assert_eq!(e.to_diagnostic().primary_span(), Some(Span::new(4, 5)));
    }
}
