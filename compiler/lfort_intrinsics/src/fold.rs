//! Compile-time evaluation of intrinsic calls with constant arguments.

use lfort_ir::{AsrBuilder, ExprArena, ExprId, ExprKind, IntrinsicId, Ty};

use crate::math::{self, Complex};

/// A compile-time constant operand or result.
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    Int(i64),
    Real(f64),
    Complex(Complex),
    Logical(bool),
    Str(String),
}

/// Constant arguments the intrinsic cannot be applied to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FoldError {
    DivisionByZero,
}

impl Const {
    /// Compile-time value of `id`, looking through unary minus and folded
    /// values.
    pub fn read(exprs: &ExprArena, id: ExprId) -> Option<Const> {
        if let Some(expr) = exprs.constant(id) {
            return match &expr.kind {
                ExprKind::IntegerConstant(n) => Some(Const::Int(*n)),
                ExprKind::RealConstant(x) => Some(Const::Real(*x)),
                ExprKind::ComplexConstant(re, im) => Some(Const::Complex(Complex::new(*re, *im))),
                ExprKind::LogicalConstant(b) => Some(Const::Logical(*b)),
                ExprKind::StringConstant(s) => Some(Const::Str(s.clone())),
                _ => None,
            };
        }
        let ty = exprs.ty(id);
        if ty.is_integer() || ty.is_unsigned() {
            exprs.int_constant(id).map(Const::Int)
        } else if ty.is_real() {
            exprs.real_constant(id).map(Const::Real)
        } else {
            None
        }
    }

    /// Allocate a constant expression of type `ty` holding this value.
    pub fn materialize(&self, b: &mut AsrBuilder, ty: &Ty) -> ExprId {
        let ty = ty.strip().clone();
        let kind = match self {
            Const::Int(n) => ExprKind::IntegerConstant(*n),
            Const::Real(x) => ExprKind::RealConstant(*x),
            Const::Complex(z) => ExprKind::ComplexConstant(z.re, z.im),
            Const::Logical(v) => ExprKind::LogicalConstant(*v),
            Const::Str(s) => return b.string(s),
        };
        b.expr(kind, ty)
    }

    /// Integer value, with logicals as 0/1.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Const::Int(n) => Some(*n),
            Const::Logical(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Const::Real(x) => Some(*x),
            _ => None,
        }
    }
}

/// Truncate `n` to the two's complement width of `kind` bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn wrap_to_kind(n: i64, kind: u8) -> i64 {
    match kind {
        1 => i64::from(n as i8),
        2 => i64::from(n as i16),
        4 => i64::from(n as i32),
        _ => n,
    }
}

/// Round `x` to the precision of `kind` bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn round_to_kind(x: f64, kind: u8) -> f64 {
    if kind == 4 {
        f64::from(x as f32)
    } else {
        x
    }
}

fn bits_of(kind: u8) -> u32 {
    u32::from(kind) * 8
}

/// `n` reinterpreted as an unsigned value of `kind` bytes.
#[allow(clippy::cast_sign_loss)]
fn unsigned_bits(n: i64, kind: u8) -> u64 {
    let bits = bits_of(kind);
    if bits >= 64 {
        n as u64
    } else {
        (n as u64) & ((1u64 << bits) - 1)
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn shift_left(a: i64, by: i64, kind: u8) -> i64 {
    if by >= i64::from(bits_of(kind)) {
        return 0;
    }
    wrap_to_kind(((a as u64) << by) as i64, kind)
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn shift_right_logical(a: i64, by: i64, kind: u8) -> i64 {
    if by >= i64::from(bits_of(kind)) {
        return 0;
    }
    wrap_to_kind((unsigned_bits(a, kind) >> by) as i64, kind)
}

/// Integer floor division.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn real_unary(id: IntrinsicId, x: f64) -> Option<f64> {
    use IntrinsicId as I;
    Some(match id {
        I::Sin => x.sin(),
        I::Cos => x.cos(),
        I::Tan => x.tan(),
        I::Asin => x.asin(),
        I::Acos => x.acos(),
        I::Atan => x.atan(),
        I::Sinh => x.sinh(),
        I::Cosh => x.cosh(),
        I::Tanh => x.tanh(),
        I::Asinh => x.asinh(),
        I::Acosh => x.acosh(),
        I::Atanh => x.atanh(),
        I::Log => x.ln(),
        I::Log10 => x.log10(),
        I::Exp => x.exp(),
        I::Exp2 => x.exp2(),
        I::Expm1 => x.exp_m1(),
        I::Sqrt => x.sqrt(),
        I::Trunc | I::Fix | I::Aint => x.trunc(),
        I::Anint => x.round(),
        I::Gamma => math::gamma(x),
        I::LogGamma => math::log_gamma(x),
        I::Erf => math::erf(x),
        I::Erfc => math::erfc(x),
        I::Sngl => x,
        _ => return None,
    })
}

fn complex_unary(id: IntrinsicId, z: Complex) -> Option<Complex> {
    use IntrinsicId as I;
    Some(match id {
        I::Sin => z.sin(),
        I::Cos => z.cos(),
        I::Tan => z.tan(),
        I::Sinh => z.sinh(),
        I::Cosh => z.cosh(),
        I::Tanh => z.tanh(),
        I::Exp => z.exp(),
        I::Log => z.ln(),
        I::Sqrt => z.sqrt(),
        I::Conjg => z.conj(),
        _ => return None,
    })
}

/// Number of significant binary digits of a type.
pub fn digits(ty: &Ty) -> Option<i64> {
    match ty.element() {
        Ty::Integer { kind } => Some(i64::from(bits_of(*kind)) - 1),
        Ty::Real { kind: 4 } => Some(24),
        Ty::Real { kind: 8 } => Some(53),
        _ => None,
    }
}

pub fn min_exponent(ty: &Ty) -> Option<i64> {
    match ty.element() {
        Ty::Real { kind: 4 } => Some(i64::from(f32::MIN_EXP)),
        Ty::Real { kind: 8 } => Some(i64::from(f64::MIN_EXP)),
        _ => None,
    }
}

pub fn max_exponent(ty: &Ty) -> Option<i64> {
    match ty.element() {
        Ty::Real { kind: 4 } => Some(i64::from(f32::MAX_EXP)),
        Ty::Real { kind: 8 } => Some(i64::from(f64::MAX_EXP)),
        _ => None,
    }
}

/// Value of `id` applied to constant `args`.
///
/// `arg_ty` is the type of the first argument, `result_ty` the type of the
/// node being built. Returns `Ok(None)` when the call is left for run time
/// (out-of-domain reals, out-of-range bit positions, unsupported complex
/// functions).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub fn fold(
    id: IntrinsicId,
    args: &[Const],
    arg_ty: &Ty,
    result_ty: &Ty,
) -> Result<Option<Const>, FoldError> {
    use IntrinsicId as I;
    let arg_kind = arg_ty.element().kind().unwrap_or(4);
    let result_kind = result_ty.element().kind().unwrap_or(4);
    let bits = i64::from(bits_of(arg_kind));

    let folded = match (id, args) {
        (I::Digits, _) => digits(arg_ty).map(Const::Int),
        (I::MinExponent, _) => min_exponent(arg_ty).map(Const::Int),
        (I::MaxExponent, _) => max_exponent(arg_ty).map(Const::Int),

        (I::Nint | I::Floor | I::Ceiling | I::Ifix | I::Idint, [Const::Real(x)]) => {
            let r = match id {
                I::Nint => x.round(),
                I::Floor => x.floor(),
                I::Ceiling => x.ceil(),
                _ => x.trunc(),
            };
            r.is_finite()
                .then(|| Const::Int(wrap_to_kind(r as i64, result_kind)))
        }

        (I::Abs, [Const::Int(n)]) => Some(Const::Int(wrap_to_kind(n.wrapping_abs(), arg_kind))),
        (I::Abs, [Const::Real(x)]) => Some(Const::Real(x.abs())),
        (I::Abs, [Const::Complex(z)]) => Some(Const::Real(z.abs())),
        (I::Aimag, [Const::Complex(z)]) => Some(Const::Real(z.im)),

        (_, [Const::Real(x)]) => real_unary(id, *x)
            .filter(|r| !r.is_nan() || x.is_nan())
            .map(Const::Real),
        (_, [Const::Complex(z)]) => complex_unary(id, *z).map(Const::Complex),

        (I::Atan2, [Const::Real(y), Const::Real(x)]) => Some(Const::Real(y.atan2(*x))),
        (I::Hypot, [Const::Real(a), Const::Real(b)]) => Some(Const::Real(a.hypot(*b))),
        (I::Dprod, [Const::Real(a), Const::Real(b)]) => Some(Const::Real(a * b)),
        (I::Fma, [Const::Real(a), Const::Real(b), Const::Real(c)]) => {
            Some(Const::Real(a.mul_add(*b, *c)))
        }

        (I::Mod, [Const::Int(a), Const::Int(b)]) => {
            if *b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            Some(Const::Int(a.wrapping_rem(*b)))
        }
        (I::Mod, [Const::Real(a), Const::Real(b)]) => {
            if *b == 0.0 {
                return Err(FoldError::DivisionByZero);
            }
            Some(Const::Real(a % b))
        }
        (I::Modulo, [Const::Int(a), Const::Int(b)]) => {
            if *b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            let r = a.wrapping_rem(*b);
            Some(Const::Int(if r != 0 && (r < 0) != (*b < 0) { r + b } else { r }))
        }
        (I::Modulo, [Const::Real(a), Const::Real(b)]) => {
            if *b == 0.0 {
                return Err(FoldError::DivisionByZero);
            }
            let r = a % b;
            Some(Const::Real(if r != 0.0 && (r < 0.0) != (*b < 0.0) { r + b } else { r }))
        }
        (I::Sign, [Const::Int(a), Const::Int(b)]) => {
            let m = a.wrapping_abs();
            Some(Const::Int(if *b >= 0 { m } else { m.wrapping_neg() }))
        }
        (I::Sign, [Const::Real(a), Const::Real(b)]) => Some(Const::Real(a.abs().copysign(*b))),
        (I::Dim, [Const::Int(a), Const::Int(b)]) => Some(Const::Int(a.wrapping_sub(*b).max(0))),
        (I::Dim, [Const::Real(a), Const::Real(b)]) => Some(Const::Real((a - b).max(0.0))),

        (I::FloorDiv, [Const::Real(a), Const::Real(b)]) => {
            if *b == 0.0 {
                return Err(FoldError::DivisionByZero);
            }
            Some(Const::Real((a / b).floor()))
        }
        (I::FloorDiv, [Const::Logical(a), Const::Logical(b)]) => {
            if !*b {
                return Err(FoldError::DivisionByZero);
            }
            Some(Const::Logical(*a))
        }
        (I::FloorDiv, [Const::Int(a), Const::Int(b)]) => {
            if *b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            Some(Const::Int(floor_div(*a, *b)))
        }

        (I::Max | I::Min, [first, rest @ ..]) => {
            let pick_max = id == I::Max;
            let mut best = first.clone();
            for c in rest {
                let replace = match (&best, c) {
                    (Const::Int(a), Const::Int(b)) => if pick_max { b > a } else { b < a },
                    (Const::Real(a), Const::Real(b)) => if pick_max { b > a } else { b < a },
                    (Const::Str(a), Const::Str(b)) => if pick_max { b > a } else { b < a },
                    _ => return Ok(None),
                };
                if replace {
                    best = c.clone();
                }
            }
            Some(best)
        }

        (I::Iand, [Const::Int(a), Const::Int(b)]) => Some(Const::Int(a & b)),
        (I::Ior, [Const::Int(a), Const::Int(b)]) => Some(Const::Int(a | b)),
        (I::Ieor, [Const::Int(a), Const::Int(b)]) => Some(Const::Int(a ^ b)),
        (I::Not, [Const::Int(a)]) => Some(Const::Int(wrap_to_kind(!a, arg_kind))),
        (I::Ibclr | I::Ibset | I::Btest, [Const::Int(a), Const::Int(pos)]) => {
            if *pos < 0 || *pos >= bits {
                return Ok(None);
            }
            let mask = 1i64.wrapping_shl(*pos as u32);
            Some(match id {
                I::Ibclr => Const::Int(wrap_to_kind(a & !mask, arg_kind)),
                I::Ibset => Const::Int(wrap_to_kind(a | mask, arg_kind)),
                _ => Const::Logical(a & mask != 0),
            })
        }
        (I::Ishft, [Const::Int(a), Const::Int(by)]) => {
            if *by > 0 {
                Some(Const::Int(shift_left(*a, *by, arg_kind)))
            } else {
                Some(Const::Int(shift_right_logical(*a, by.wrapping_neg(), arg_kind)))
            }
        }
        (I::Shiftl | I::Shiftr, [Const::Int(a), Const::Int(by)]) => {
            if *by < 0 {
                return Ok(None);
            }
            Some(Const::Int(if id == I::Shiftl {
                shift_left(*a, *by, arg_kind)
            } else {
                shift_right_logical(*a, *by, arg_kind)
            }))
        }
        (I::Trailz, [Const::Int(a)]) => {
            let u = unsigned_bits(*a, arg_kind);
            Some(Const::Int(if u == 0 { bits } else { i64::from(u.trailing_zeros()) }))
        }
        (I::Leadz, [Const::Int(a)]) => {
            let u = unsigned_bits(*a, arg_kind);
            Some(Const::Int(i64::from(u.leading_zeros()) - (64 - bits)))
        }
        (I::Popcnt | I::Poppar, [Const::Int(a)]) => {
            let ones = i64::from(unsigned_bits(*a, arg_kind).count_ones());
            Some(Const::Int(if id == I::Popcnt { ones } else { ones % 2 }))
        }

        _ => None,
    };

    Ok(folded.map(|c| normalize(c, result_ty, result_kind)))
}

/// Bring a folded value to the precision and width of the result type.
fn normalize(c: Const, result_ty: &Ty, kind: u8) -> Const {
    match (c, result_ty.element()) {
        (Const::Int(n), Ty::Integer { .. } | Ty::UnsignedInteger { .. }) => {
            Const::Int(wrap_to_kind(n, kind))
        }
        (Const::Real(x), Ty::Real { .. }) => Const::Real(round_to_kind(x, kind)),
        (Const::Complex(z), Ty::Complex { .. }) => Const::Complex(Complex::new(
            round_to_kind(z.re, kind),
            round_to_kind(z.im, kind),
        )),
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests;
