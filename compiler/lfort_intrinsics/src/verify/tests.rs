use lfort_ir::{AsrBuilder, Span};
use pretty_assertions::assert_eq;

use super::*;
use crate::create_intrinsic;

fn messages(diags: &Diagnostics) -> Vec<String> {
    diags.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn freshly_built_nodes_verify() {
    let mut b = AsrBuilder::new();
    let mut diags = Diagnostics::new();
    let global = b.global();
    let v = b.variable(global, "x", Ty::f64());
    let x = b.var(v);
    let y = b.var(v);
    let z = b.complex(1.0, 1.0, 8);
    for (id, args) in [
        (IntrinsicId::Sin, vec![Some(x)]),
        (IntrinsicId::Atan2, vec![Some(x), Some(y)]),
        (IntrinsicId::Abs, vec![Some(z)]),
        (IntrinsicId::Mod, vec![Some(x), Some(y)]),
        (IntrinsicId::Max, vec![Some(x), Some(y), Some(x)]),
        (IntrinsicId::Digits, vec![Some(x)]),
        (IntrinsicId::Nint, vec![Some(x), None]),
    ] {
        assert!(create_intrinsic(&mut b, id, &args, Span::DUMMY, &mut diags).is_some());
    }
    let unit = b.finish();
    assert!(verify_unit(&unit, &mut diags), "{}", diags.render());
}

#[test]
fn rewritten_output_type_is_caught() {
    let mut b = AsrBuilder::new();
    let global = b.global();
    let v = b.variable(global, "x", Ty::f64());
    let x = b.var(v);
    let node = b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Sqrt,
            args: vec![x],
            overload: 0,
        },
        Ty::f32(),
    );
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    verify_intrinsic(&unit, node, &mut diags);
    assert_eq!(
        messages(&diags),
        ["The input and output type of elemental intrinsics must exactly match, input type: r64 output type: r32"]
    );
}

#[test]
fn binary_argument_mismatch_and_bad_overload() {
    let mut b = AsrBuilder::new();
    let x = b.f64(1.0);
    let y = b.real(1.0, 4);
    let node = b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Hypot,
            args: vec![x, y],
            overload: 2,
        },
        Ty::f64(),
    );
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    verify_intrinsic(&unit, node, &mut diags);
    assert_eq!(
        messages(&diags),
        [
            "Overload Id for Hypot expected to be 0, found 2",
            "The types of both the arguments of binary intrinsics must exactly match, argument 1 type: r64 argument 2 type: r32",
        ]
    );
}

#[test]
fn abs_of_complex_must_be_real() {
    let mut b = AsrBuilder::new();
    let z = b.complex(3.0, 4.0, 8);
    let node = b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Abs,
            args: vec![z],
            overload: 0,
        },
        Ty::complex(8),
    );
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    verify_intrinsic(&unit, node, &mut diags);
    assert_eq!(
        messages(&diags),
        ["Abs intrinsic must return output of real for complex input, found: c64"]
    );
}

#[test]
fn numeric_model_inquiry_without_value() {
    let mut b = AsrBuilder::new();
    let x = b.f64(1.0);
    b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Digits,
            args: vec![x],
            overload: 0,
        },
        Ty::i32(),
    );
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    assert!(!verify_unit(&unit, &mut diags));
    assert_eq!(
        messages(&diags),
        ["Missing compile time value, `Digits` intrinsic output must be computed during compile time"]
    );
}

#[test]
fn max_with_one_argument() {
    let mut b = AsrBuilder::new();
    let x = b.f64(1.0);
    let node = b.expr(
        ExprKind::IntrinsicElementalFunction {
            id: IntrinsicId::Max,
            args: vec![x],
            overload: 0,
        },
        Ty::f64(),
    );
    let unit = b.finish();
    let mut diags = Diagnostics::new();
    verify_intrinsic(&unit, node, &mut diags);
    assert_eq!(messages(&diags), ["Call to max0 must have at least two arguments"]);
}
