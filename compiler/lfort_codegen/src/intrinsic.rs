//! Intrinsic calls in C++.
//!
//! Elemental intrinsics map onto `<cmath>`/`<complex>` functions, native
//! operators, or small helper templates emitted once per unit. Functions
//! of the intrinsic modules (`size`, `int`, `len`, `not`, ...) lower to
//! native casts and queries instead of calls.

use lfort_intrinsics::Const;
use lfort_ir::{ExprId, IntrinsicId, Span, SymbolId, Ty};

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::expr::{emit_expr, integer_literal};
use crate::precedence::{
    infix, left_operand, prefix, Assoc, Fragment, ATOM, BIT_AND, BIT_OR, BIT_XOR, MULTIPLICATIVE,
};
use crate::types::scalar_type;

/// Intrinsic-module functions that lower to native C++ forms.
pub const NATIVE_MODULE_FUNCTIONS: &[&str] = &["size", "int", "char", "present", "len", "not"];

pub fn emit_intrinsic(
    ctx: &mut CodegenContext<'_>,
    id: IntrinsicId,
    args: &[ExprId],
    result: &Ty,
    span: Span,
) -> CodegenResult<Fragment> {
    if args.iter().any(|a| ctx.ty(*a).is_array()) {
        return Err(CodegenError::not_implemented(
            format!("Elemental intrinsic `{id}` on arrays is not implemented"),
            span,
        ));
    }
    let mut a = Vec::with_capacity(args.len());
    for arg in args {
        a.push(emit_expr(ctx, *arg)?);
    }
    let arg = |i: usize| -> CodegenResult<&Fragment> {
        a.get(i).ok_or_else(|| {
            CodegenError::internal(format!("intrinsic `{id}` is missing argument {i}"))
        })
    };
    let call = |name: &str, args: &[Fragment]| {
        let list: Vec<&str> = args.iter().map(|f| f.text.as_str()).collect();
        Fragment::atom(format!("{name}({})", list.join(", ")))
    };
    let result_ty = scalar_type(ctx, result, span)?;
    let is_int = args.first().is_some_and(|a| ctx.ty(*a).is_integer());

    use IntrinsicId as I;
    let fragment = match id {
        I::Sin | I::Cos | I::Tan | I::Asin | I::Acos | I::Atan | I::Sinh | I::Cosh | I::Tanh
        | I::Asinh | I::Acosh | I::Atanh | I::Log | I::Exp | I::Sqrt | I::Log10 | I::Erf
        | I::Erfc | I::Exp2 | I::Expm1 | I::Trunc | I::Abs => {
            call(&format!("std::{}", id.name()), &a)
        }
        I::Gamma => call("std::tgamma", &a),
        I::LogGamma => call("std::lgamma", &a),
        I::Fix | I::Aint => call("std::trunc", &a),
        I::Anint => call("std::round", &a),
        I::Aimag => call("std::imag", &a),
        I::Conjg => call("std::conj", &a),
        I::Atan2 => call("std::atan2", &a),
        I::Hypot => call("std::hypot", &a),
        I::Fma => call("std::fma", &a),
        I::Floor | I::Ceiling | I::Nint => {
            let f = match id {
                I::Floor => "std::floor",
                I::Ceiling => "std::ceil",
                _ => "std::round",
            };
            Fragment::atom(format!("static_cast<{result_ty}>({f}({}))", arg(0)?.text))
        }
        I::Ifix | I::Idint | I::Sngl => {
            Fragment::atom(format!("static_cast<{result_ty}>({})", arg(0)?.text))
        }
        I::Dprod => Fragment::new(
            format!(
                "static_cast<double>({})*static_cast<double>({})",
                arg(0)?.text,
                arg(1)?.text
            ),
            MULTIPLICATIVE,
        ),
        I::Mod if is_int => infix(arg(0)?, " % ", arg(1)?, MULTIPLICATIVE, Assoc::LeftOnly),
        I::Mod => call("std::fmod", &a),
        I::Max | I::Min => {
            let f = if id == I::Max { "std::max" } else { "std::min" };
            if a.len() == 2 {
                call(f, &a)
            } else {
                let list: Vec<&str> = a.iter().map(|f| f.text.as_str()).collect();
                Fragment::atom(format!("{f}({{{}}})", list.join(", ")))
            }
        }
        I::Iand => infix(arg(0)?, " & ", arg(1)?, BIT_AND, Assoc::Associative),
        I::Ior => infix(arg(0)?, " | ", arg(1)?, BIT_OR, Assoc::Associative),
        I::Ieor => infix(arg(0)?, " ^ ", arg(1)?, BIT_XOR, Assoc::Associative),
        I::Not => prefix("~", arg(0)?),
        I::Ibclr => Fragment::atom(format!(
            "({} & ~(static_cast<{result_ty}>(1) << {}))",
            left_operand(arg(0)?, BIT_AND),
            left_operand(arg(1)?, ATOM)
        )),
        I::Ibset => Fragment::atom(format!(
            "({} | (static_cast<{result_ty}>(1) << {}))",
            left_operand(arg(0)?, BIT_OR),
            left_operand(arg(1)?, ATOM)
        )),
        I::Btest => Fragment::atom(format!(
            "((({} >> {}) & 1) != 0)",
            left_operand(arg(0)?, ATOM),
            left_operand(arg(1)?, ATOM)
        )),
        I::Shiftl => Fragment::atom(format!(
            "({} << {})",
            left_operand(arg(0)?, ATOM),
            left_operand(arg(1)?, ATOM)
        )),
        I::Modulo | I::Sign | I::Dim | I::FloorDiv | I::Ishft | I::Shiftr | I::Trailz
        | I::Leadz | I::Popcnt | I::Poppar => {
            let name = helper_name(id);
            ctx.add_helper(name, || helper_definition(id));
            call(name, &a)
        }
        I::Digits | I::MinExponent | I::MaxExponent => {
            let folded = args
                .first()
                .map(|a| lfort_intrinsics::fold(id, &[], ctx.ty(*a), result));
            match folded {
                Some(Ok(Some(Const::Int(n)))) => integer_literal(n),
                _ => {
                    return Err(CodegenError::not_implemented(
                        format!("Intrinsic `{id}` without a compile-time value"),
                        span,
                    ))
                }
            }
        }
    };
    Ok(fragment)
}

fn helper_name(id: IntrinsicId) -> &'static str {
    match id {
        IntrinsicId::Modulo => "lfort_modulo",
        IntrinsicId::Sign => "lfort_sign",
        IntrinsicId::Dim => "lfort_dim",
        IntrinsicId::FloorDiv => "lfort_floordiv",
        IntrinsicId::Ishft => "lfort_ishft",
        IntrinsicId::Shiftr => "lfort_shiftr",
        IntrinsicId::Trailz => "lfort_trailz",
        IntrinsicId::Leadz => "lfort_leadz",
        IntrinsicId::Popcnt => "lfort_popcnt",
        _ => "lfort_poppar",
    }
}

fn helper_definition(id: IntrinsicId) -> String {
    let body = match id {
        IntrinsicId::Modulo => {
            "template <typename T>
T lfort_modulo(T a, T p)
{
    if constexpr (std::is_integral<T>::value) {
        T r = a % p;
        return (r != 0 && ((r < 0) != (p < 0))) ? r + p : r;
    } else {
        return a - std::floor(a / p) * p;
    }
}"
        }
        IntrinsicId::Sign => {
            "template <typename T>
T lfort_sign(T a, T b)
{
    if constexpr (std::is_floating_point<T>::value) {
        return std::copysign(a, b);
    } else {
        T m = a < 0 ? -a : a;
        return b < 0 ? -m : m;
    }
}"
        }
        IntrinsicId::Dim => {
            "template <typename T>
T lfort_dim(T a, T b)
{
    return a > b ? a - b : T(0);
}"
        }
        IntrinsicId::FloorDiv => {
            "template <typename T>
T lfort_floordiv(T a, T b)
{
    if constexpr (std::is_integral<T>::value) {
        T q = a / b;
        return (a % b != 0 && ((a < 0) != (b < 0))) ? q - 1 : q;
    } else {
        return std::floor(a / b);
    }
}"
        }
        IntrinsicId::Ishft => {
            "template <typename T>
T lfort_ishft(T a, int shift)
{
    using U = typename std::make_unsigned<T>::type;
    const int bits = sizeof(T) * 8;
    if (shift >= bits || -shift >= bits) return 0;
    if (shift >= 0) return static_cast<T>(static_cast<U>(a) << shift);
    return static_cast<T>(static_cast<U>(a) >> -shift);
}"
        }
        IntrinsicId::Shiftr => {
            "template <typename T>
T lfort_shiftr(T a, int shift)
{
    using U = typename std::make_unsigned<T>::type;
    if (shift >= static_cast<int>(sizeof(T) * 8)) return 0;
    return static_cast<T>(static_cast<U>(a) >> shift);
}"
        }
        IntrinsicId::Trailz => {
            "template <typename T>
T lfort_trailz(T a)
{
    using U = typename std::make_unsigned<T>::type;
    U u = static_cast<U>(a);
    T n = 0;
    if (u == 0) return sizeof(T) * 8;
    while ((u & 1) == 0) { u >>= 1; n++; }
    return n;
}"
        }
        IntrinsicId::Leadz => {
            "template <typename T>
T lfort_leadz(T a)
{
    using U = typename std::make_unsigned<T>::type;
    U u = static_cast<U>(a);
    T n = sizeof(T) * 8;
    while (u != 0) { u >>= 1; n--; }
    return n;
}"
        }
        IntrinsicId::Popcnt => {
            "template <typename T>
T lfort_popcnt(T a)
{
    using U = typename std::make_unsigned<T>::type;
    U u = static_cast<U>(a);
    T n = 0;
    while (u != 0) { n += u & 1; u >>= 1; }
    return n;
}"
        }
        _ => {
            "template <typename T>
T lfort_poppar(T a)
{
    using U = typename std::make_unsigned<T>::type;
    U u = static_cast<U>(a);
    T n = 0;
    while (u != 0) { n ^= u & 1; u >>= 1; }
    return n;
}"
        }
    };
    format!("{body}\n")
}

/// Call of a function flagged as native while visiting an intrinsic module.
pub fn emit_intrinsic_module_call(
    ctx: &mut CodegenContext<'_>,
    func: SymbolId,
    args: &[Option<ExprId>],
    span: Span,
) -> CodegenResult<Fragment> {
    let name = ctx.name(func);
    let first = args.first().copied().flatten().ok_or_else(|| {
        CodegenError::internal(format!("intrinsic function `{name}` called without arguments"))
    })?;
    let a = emit_expr(ctx, first)?;
    match name {
        "size" => {
            let base = left_operand(&a, ATOM);
            let extent = match args.get(1).copied().flatten() {
                Some(dim) => {
                    let d = emit_expr(ctx, dim)?;
                    format!("{}-1", left_operand(&d, crate::precedence::ADDITIVE))
                }
                None => "0".to_string(),
            };
            Ok(Fragment::atom(format!("{base}.extent({extent})")))
        }
        "int" => Ok(Fragment::atom(format!("static_cast<int>({})", a.text))),
        "not" => Ok(prefix("!", &a)),
        "len" => Ok(Fragment::atom(format!(
            "static_cast<int>(std::string({}).size())",
            a.text
        ))),
        "char" => Ok(Fragment::atom(format!(
            "std::string(1, static_cast<char>({}))",
            a.text
        ))),
        _ => Err(CodegenError::not_implemented(
            format!("Intrinsic function '{name}' not implemented"),
            span,
        )),
    }
}

#[cfg(test)]
mod tests;
