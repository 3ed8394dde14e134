//! End-to-end: build calls through the public API, then verify the unit.

use lfort_diagnostic::Diagnostics;
use lfort_intrinsics::{create_inquiry, create_intrinsic, verify_unit};
use lfort_ir::{AsrBuilder, ExprKind, InquiryId, IntrinsicId, Span, Ty};
use pretty_assertions::assert_eq;

fn folded_int(b: &AsrBuilder, id: lfort_ir::ExprId) -> Option<i64> {
    b.unit().exprs.get(id).value.and_then(|v| b.unit().exprs.int_constant(v))
}

#[test]
fn nested_calls_fold_bottom_up() {
    let mut b = AsrBuilder::new();
    let mut diags = Diagnostics::new();
    let x = b.f64(-2.5);
    let floor = create_intrinsic(&mut b, IntrinsicId::Floor, &[Some(x), None], Span::DUMMY, &mut diags);
    let floor = floor.unwrap_or_else(|| panic!("{}", diags.render()));
    let four = b.i32(4);
    let modulo = create_intrinsic(
        &mut b,
        IntrinsicId::Modulo,
        &[Some(floor), Some(four)],
        Span::DUMMY,
        &mut diags,
    );
    let modulo = modulo.unwrap_or_else(|| panic!("{}", diags.render()));
    assert_eq!(folded_int(&b, floor), Some(-3));
    assert_eq!(folded_int(&b, modulo), Some(1));
    assert!(verify_unit(b.unit(), &mut diags));
}

#[test]
fn inquiry_feeds_an_intrinsic() {
    let mut b = AsrBuilder::new();
    let mut diags = Diagnostics::new();
    let global = b.global();
    let v = b.variable(global, "n", Ty::i64());
    let n = b.var(v);
    let huge = create_inquiry(&mut b, InquiryId::Huge, &[n], Span::DUMMY, &mut diags);
    let huge = huge.unwrap_or_else(|| panic!("{}", diags.render()));
    let pop = create_intrinsic(&mut b, IntrinsicId::Popcnt, &[Some(huge)], Span::DUMMY, &mut diags);
    let pop = pop.unwrap_or_else(|| panic!("{}", diags.render()));
    assert_eq!(folded_int(&b, pop), Some(63));
    assert_eq!(b.ty(pop), &Ty::i32());
    assert!(verify_unit(b.unit(), &mut diags), "{}", diags.render());
}

#[test]
fn errors_accumulate_without_stopping() {
    let mut b = AsrBuilder::new();
    let mut diags = Diagnostics::new();
    let s = b.string("x");
    let t = b.logical(true);
    assert!(create_intrinsic(&mut b, IntrinsicId::Sqrt, &[Some(s)], Span::DUMMY, &mut diags).is_none());
    assert!(create_intrinsic(&mut b, IntrinsicId::Iand, &[Some(t), Some(t)], Span::DUMMY, &mut diags).is_none());
    let ok = create_intrinsic(&mut b, IntrinsicId::Not, &[Some(t)], Span::DUMMY, &mut diags);
    assert!(ok.is_none());
    assert_eq!(diags.error_count(), 3);
    let rendered = diags.render();
    assert!(rendered.contains("Unexpected args, Sqrt expects (real) or (complex) as arguments"));
    assert!(rendered.contains("Unexpected args, Iand expects (int, int) as arguments"));
    assert!(matches!(b.unit().exprs.get(s).kind, ExprKind::StringConstant(_)));
}
