use super::*;
use pretty_assertions::assert_eq;

#[test]
fn require_appends_only_on_failure() {
    let mut diags = Diagnostics::new();
    assert!(diags.require(true, "unused", Span::DUMMY));
    assert!(!diags.has_errors());
    assert!(!diags.require(
        false,
        "The input and output type of elemental intrinsics must exactly match",
        Span::new(3, 9),
    ));
    assert_eq!(diags.error_count(), 1);
    assert_eq!(diags.iter().next().map(|d| d.code), Some(ErrorCode::E2001));
}

#[test]
fn append_error_keeps_order() {
    let mut diags = Diagnostics::new();
    diags.append_error("first", Span::new(0, 1));
    diags.append_error_with_code(ErrorCode::E1001, "second", Span::new(2, 4));
    let messages: Vec<_> = diags.iter().map(|d| d.message.clone()).collect();
    assert_eq!(messages, vec!["first", "second"]);
}

#[test]
fn warnings_do_not_count_as_errors() {
    let mut diags = Diagnostics::new();
    diags.push(Diagnostic::warning(ErrorCode::E3002).with_message("odd layout"));
    assert!(!diags.has_errors());
    assert!(diags.error_guaranteed().is_none());
    assert_eq!(diags.len(), 1);
}

#[test]
fn emit_upgrades_to_error() {
    let mut diags = Diagnostics::new();
    let _guarantee = diags.emit(Diagnostic::warning(ErrorCode::E9001).with_message("boom"));
    assert!(diags.has_errors());
    assert!(diags.into_vec().iter().all(Diagnostic::is_error));
}

#[test]
fn render_one_line_each() {
    let mut diags = Diagnostics::new();
    diags.append_error_with_code(
        ErrorCode::E3001,
        "Do loop increment type not supported",
        Span::new(12, 18),
    );
    diags.append_error("Division by `0` is not allowed", Span::new(1, 2));
    assert_eq!(
        diags.render(),
        "error[E3001]: Do loop increment type not supported at 12..18\n\
         error[E1002]: Division by `0` is not allowed at 1..2\n"
    );
}
