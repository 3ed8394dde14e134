//! `str.partition(sep)`.

use lfort_diagnostic::{Diagnostics, ErrorCode};
use lfort_ir::{AsrBuilder, ExprId, ExprKind, Span, Ty};

/// Build `string.partition(args[0])`, a tuple of three strings.
///
/// A constant string and separator fold to a tuple constant.
pub fn create_partition(
    b: &mut AsrBuilder,
    string: ExprId,
    args: &[ExprId],
    span: Span,
    diags: &mut Diagnostics,
) -> Option<ExprId> {
    b.set_span(span);
    let [separator] = args else {
        diags.append_error_with_code(
            ErrorCode::E1001,
            "str.partition() takes exactly one argument",
            span,
        );
        return None;
    };
    let separator = *separator;
    if !b.ty(separator).is_character() {
        diags.append_error_with_code(
            ErrorCode::E1002,
            "str.partition() takes one arguments of type: str",
            span,
        );
        return None;
    }

    let exprs = &b.unit().exprs;
    let constant_str = |id: ExprId| match exprs.constant(id).map(|e| &e.kind) {
        Some(ExprKind::StringConstant(s)) => Some(s.clone()),
        _ => None,
    };
    let sep_value = constant_str(separator);
    let str_value = constant_str(string);
    if sep_value.as_deref() == Some("") {
        diags.append_error_with_code(
            ErrorCode::E1004,
            "Separator cannot be an empty string",
            exprs.span(separator),
        );
        return None;
    }

    let tuple_ty = Ty::tuple(vec![Ty::string(), Ty::string(), Ty::string()]);
    let node = b.expr(ExprKind::StringPartition { string, separator }, tuple_ty);
    if let (Some(s), Some(sep)) = (str_value, sep_value) {
        let parts = match s.find(&sep) {
            Some(at) => [s[..at].to_string(), sep.clone(), s[at + sep.len()..].to_string()],
            None => [s.clone(), String::new(), String::new()],
        };
        let items: Vec<ExprId> = parts.iter().map(|p| b.string(p)).collect();
        let folded = b.tuple(items);
        b.set_value(node, folded);
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn folded_parts(b: &AsrBuilder, node: ExprId) -> Vec<String> {
        let exprs = &b.unit().exprs;
        let Some(value) = exprs.get(node).value else {
            return Vec::new();
        };
        let ExprKind::TupleConstant(items) = &exprs.get(value).kind else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|i| match &exprs.get(*i).kind {
                ExprKind::StringConstant(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn splits_at_first_occurrence() {
        let mut b = AsrBuilder::new();
        let mut diags = Diagnostics::new();
        let s = b.string("key=value=x");
        let sep = b.string("=");
        let node = create_partition(&mut b, s, &[sep], Span::DUMMY, &mut diags);
        let node = node.unwrap_or_else(|| panic!("{}", diags.render()));
        assert_eq!(folded_parts(&b, node), ["key", "=", "value=x"]);
    }

    #[test]
    fn missing_separator_leaves_string_first() {
        let mut b = AsrBuilder::new();
        let mut diags = Diagnostics::new();
        let s = b.string("abc");
        let sep = b.string(", ");
        let node = create_partition(&mut b, s, &[sep], Span::DUMMY, &mut diags);
        let node = node.unwrap_or_else(|| panic!("{}", diags.render()));
        assert_eq!(folded_parts(&b, node), ["abc", "", ""]);
    }

    #[test]
    fn empty_separator_is_an_error() {
        let mut b = AsrBuilder::new();
        let mut diags = Diagnostics::new();
        let s = b.string("abc");
        let sep = b.string("");
        assert!(create_partition(&mut b, s, &[sep], Span::DUMMY, &mut diags).is_none());
        assert_eq!(
            diags.iter().next().map(|d| d.message.clone()),
            Some("Separator cannot be an empty string".to_string())
        );
    }

    #[test]
    fn separator_must_be_a_string() {
        let mut b = AsrBuilder::new();
        let mut diags = Diagnostics::new();
        let s = b.string("abc");
        let n = b.i32(1);
        assert!(create_partition(&mut b, s, &[n], Span::DUMMY, &mut diags).is_none());
        assert!(create_partition(&mut b, s, &[], Span::DUMMY, &mut diags).is_none());
        let messages: Vec<String> = diags.iter().map(|d| d.message.clone()).collect();
        assert_eq!(
            messages,
            [
                "str.partition() takes one arguments of type: str",
                "str.partition() takes exactly one argument",
            ]
        );
    }
}
