use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn ints(a: i64, b: i64) -> [Const; 2] {
    [Const::Int(a), Const::Int(b)]
}

fn fold_i32(id: IntrinsicId, args: &[Const]) -> Option<Const> {
    fold(id, args, &Ty::i32(), &Ty::i32()).ok().flatten()
}

#[test]
fn mod_truncates_and_modulo_follows_divisor_sign() {
    assert_eq!(fold_i32(IntrinsicId::Mod, &ints(-7, 3)), Some(Const::Int(-1)));
    assert_eq!(fold_i32(IntrinsicId::Modulo, &ints(-7, 3)), Some(Const::Int(2)));
    assert_eq!(fold_i32(IntrinsicId::Modulo, &ints(7, -3)), Some(Const::Int(-2)));
    let r = fold(
        IntrinsicId::Modulo,
        &[Const::Real(-7.5), Const::Real(2.0)],
        &Ty::f64(),
        &Ty::f64(),
    );
    assert_eq!(r, Ok(Some(Const::Real(0.5))));
}

#[test]
fn division_by_zero_is_reported() {
    for id in [IntrinsicId::Mod, IntrinsicId::Modulo, IntrinsicId::FloorDiv] {
        assert_eq!(
            fold(id, &ints(4, 0), &Ty::i32(), &Ty::i32()),
            Err(FoldError::DivisionByZero)
        );
    }
}

#[test]
fn floor_div_rounds_toward_negative_infinity() {
    assert_eq!(fold_i32(IntrinsicId::FloorDiv, &ints(-7, 2)), Some(Const::Int(-4)));
    assert_eq!(fold_i32(IntrinsicId::FloorDiv, &ints(7, 2)), Some(Const::Int(3)));
}

#[test]
fn sign_and_dim() {
    assert_eq!(fold_i32(IntrinsicId::Sign, &ints(5, -2)), Some(Const::Int(-5)));
    assert_eq!(fold_i32(IntrinsicId::Sign, &ints(-5, 0)), Some(Const::Int(5)));
    assert_eq!(fold_i32(IntrinsicId::Dim, &ints(3, 8)), Some(Const::Int(0)));
    assert_eq!(fold_i32(IntrinsicId::Dim, &ints(8, 3)), Some(Const::Int(5)));
}

#[test]
fn bit_manipulation_respects_kind_width() {
    assert_eq!(fold_i32(IntrinsicId::Popcnt, &[Const::Int(-1)]), Some(Const::Int(32)));
    assert_eq!(fold_i32(IntrinsicId::Poppar, &[Const::Int(7)]), Some(Const::Int(1)));
    assert_eq!(fold_i32(IntrinsicId::Leadz, &[Const::Int(1)]), Some(Const::Int(31)));
    assert_eq!(fold_i32(IntrinsicId::Trailz, &[Const::Int(0)]), Some(Const::Int(32)));
    assert_eq!(fold_i32(IntrinsicId::Trailz, &[Const::Int(8)]), Some(Const::Int(3)));
    assert_eq!(fold_i32(IntrinsicId::Ishft, &ints(1, 4)), Some(Const::Int(16)));
    assert_eq!(fold_i32(IntrinsicId::Ishft, &ints(-1, -28)), Some(Const::Int(15)));
    assert_eq!(fold_i32(IntrinsicId::Ibset, &ints(0, 31)), Some(Const::Int(i64::from(i32::MIN))));
    assert_eq!(fold_i32(IntrinsicId::Ibclr, &ints(15, 0)), Some(Const::Int(14)));
    assert_eq!(fold_i32(IntrinsicId::Not, &[Const::Int(0)]), Some(Const::Int(-1)));
}

#[test]
fn btest_yields_logical_and_ignores_bad_positions() {
    assert_eq!(
        fold(IntrinsicId::Btest, &ints(4, 2), &Ty::i32(), &Ty::logical()),
        Ok(Some(Const::Logical(true)))
    );
    assert_eq!(fold_i32(IntrinsicId::Btest, &ints(4, 40)), None);
}

#[test]
fn rounding_family_targets_result_kind() {
    let r = fold(IntrinsicId::Nint, &[Const::Real(2.5)], &Ty::f64(), &Ty::i64());
    assert_eq!(r, Ok(Some(Const::Int(3))));
    let r = fold(IntrinsicId::Floor, &[Const::Real(-2.5)], &Ty::f64(), &Ty::i32());
    assert_eq!(r, Ok(Some(Const::Int(-3))));
    let r = fold(IntrinsicId::Ceiling, &[Const::Real(-2.5)], &Ty::f64(), &Ty::i32());
    assert_eq!(r, Ok(Some(Const::Int(-2))));
    let r = fold(IntrinsicId::Anint, &[Const::Real(-2.5)], &Ty::f64(), &Ty::f64());
    assert_eq!(r, Ok(Some(Const::Real(-3.0))));
}

#[test]
fn single_precision_results_are_rounded() {
    let r = fold(IntrinsicId::Sin, &[Const::Real(1.0)], &Ty::f32(), &Ty::f32());
    #[allow(clippy::cast_possible_truncation)]
    let expected = f64::from(1.0_f64.sin() as f32);
    assert_eq!(r, Ok(Some(Const::Real(expected))));
}

#[test]
fn out_of_domain_reals_are_left_for_run_time() {
    let r = fold(IntrinsicId::Sqrt, &[Const::Real(-1.0)], &Ty::f64(), &Ty::f64());
    assert_eq!(r, Ok(None));
}

#[test]
fn abs_of_complex_is_real() {
    let z = Const::Complex(Complex::new(3.0, 4.0));
    let r = fold(IntrinsicId::Abs, &[z], &Ty::complex(8), &Ty::f64());
    assert_eq!(r, Ok(Some(Const::Real(5.0))));
}

#[test]
fn max_and_min_over_strings() {
    let args = [Const::Str("pear".into()), Const::Str("apple".into()), Const::Str("plum".into())];
    assert_eq!(
        fold(IntrinsicId::Max, &args, &Ty::string(), &Ty::string()),
        Ok(Some(Const::Str("plum".into())))
    );
    assert_eq!(
        fold(IntrinsicId::Min, &args, &Ty::string(), &Ty::string()),
        Ok(Some(Const::Str("apple".into())))
    );
}

#[test]
fn digits_and_exponents_come_from_type() {
    assert_eq!(digits(&Ty::i64()), Some(63));
    assert_eq!(digits(&Ty::f32()), Some(24));
    assert_eq!(min_exponent(&Ty::f64()), Some(-1021));
    assert_eq!(max_exponent(&Ty::f32()), Some(128));
}

proptest! {
    #[test]
    fn modulo_takes_sign_of_divisor(a in -1000i64..1000, b in prop_oneof![-50i64..-1, 1i64..50]) {
        let Some(Const::Int(r)) = fold_i32(IntrinsicId::Modulo, &ints(a, b)) else {
            panic!("modulo did not fold");
        };
        prop_assert!(r == 0 || (r < 0) == (b < 0));
        prop_assert!(r.abs() < b.abs());
        prop_assert_eq!((a - r).rem_euclid(b.abs()), 0);
    }

    #[test]
    fn floor_never_exceeds_ceiling(x in -1.0e6f64..1.0e6) {
        let floor = fold(IntrinsicId::Floor, &[Const::Real(x)], &Ty::f64(), &Ty::i64());
        let ceil = fold(IntrinsicId::Ceiling, &[Const::Real(x)], &Ty::f64(), &Ty::i64());
        let (Ok(Some(Const::Int(f))), Ok(Some(Const::Int(c)))) = (floor, ceil) else {
            panic!("floor/ceiling did not fold");
        };
        prop_assert!(f <= c && c - f <= 1);
    }
}
