use super::*;
use pretty_assertions::assert_eq;

#[test]
fn builder_collects_parts() {
    let diag = Diagnostic::error(ErrorCode::E1001)
        .with_message("Intrinsic `sin` accepts exactly one argument")
        .with_label(Span::new(4, 10), "here")
        .with_secondary_label(Span::new(0, 3), "called from")
        .with_note("sin takes a single real or complex argument");

    assert_eq!(diag.code, ErrorCode::E1001);
    assert!(diag.is_error());
    assert_eq!(diag.labels.len(), 2);
    assert_eq!(diag.primary_span(), Some(Span::new(4, 10)));
    assert_eq!(diag.notes.len(), 1);
}

#[test]
fn display_is_single_line_without_notes() {
    let diag = Diagnostic::error(ErrorCode::E3001)
        .with_message("Do loop increment type not supported")
        .with_label(Span::new(12, 18), "");
    assert_eq!(
        diag.to_string(),
        "error[E3001]: Do loop increment type not supported at 12..18"
    );
}

#[test]
fn display_without_span_or_with_notes() {
    let diag = Diagnostic::warning(ErrorCode::E9001)
        .with_message("odd")
        .with_note("first");
    assert_eq!(diag.to_string(), "warning[E9001]: odd\n  = note: first");
}
