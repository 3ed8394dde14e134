//! Errors that abort C++ generation.

use lfort_diagnostic::{Diagnostic, ErrorCode};
use lfort_ir::{DependencyCycle, Span};

/// First unrecoverable problem met while lowering a unit.
///
/// Every emitter returns `Result<_, CodegenError>`; the entry point turns the
/// error into exactly one [`Diagnostic`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// Construct the C++ backend has no lowering for.
    #[error("{what}")]
    NotImplemented { what: String, span: Span },
    /// Type or layout the C++ backend cannot express.
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
        let diag = Diagnostic::error(self.code()).with_message(self.to_string());
        match self.span() {
            Some(span) => diag.with_label(span, "while generating C++ for this"),
            None => diag,
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_phase() {
        let e = CodegenError::not_implemented("Do loop increment type not supported", Span::new(3, 9));
        assert_eq!(e.code(), ErrorCode::E3001);
        let d = e.to_diagnostic();
        assert_eq!(d.message, "Do loop increment type not supported");
        assert_eq!(d.primary_span(), Some(Span::new(3, 9)));

        let cycle = CodegenError::from(DependencyCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        });
        assert_eq!(cycle.code(), ErrorCode::E4001);
        assert_eq!(cycle.to_string(), "module dependency cycle: a -> b -> a");
    }
}
