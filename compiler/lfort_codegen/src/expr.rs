//! Expression emission.
//!
//! Every expression lowers to a [`Fragment`]: its C++ text plus the
//! precedence of the outermost operator, so the parent decides whether the
//! child needs parentheses.

use lfort_ir::{
    ensure_sufficient_stack, BinOp, CastKind, CmpOp, ExprId, ExprKind, LogicalOp, Span, Ty,
};

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::intrinsic::{emit_intrinsic, emit_intrinsic_module_call};
use crate::precedence::{
    infix, left_operand, prefix, Assoc, Fragment, ADDITIVE, ATOM, CONDITIONAL, EQUALITY, LOGICAL_AND,
    LOGICAL_OR, MULTIPLICATIVE, RELATIONAL, UNARY,
};
use crate::types::{is_pointer_var, procedure_name, scalar_type};

/// Emit `id` as a C++ expression.
pub fn emit_expr(ctx: &mut CodegenContext<'_>, id: ExprId) -> CodegenResult<Fragment> {
    ensure_sufficient_stack(|| emit_expr_inner(ctx, id))
}

fn emit_expr_inner(ctx: &mut CodegenContext<'_>, id: ExprId) -> CodegenResult<Fragment> {
    let expr = ctx.expr(id);
    let span = expr.span;
    match &expr.kind {
        ExprKind::IntegerConstant(n) => Ok(integer_literal(*n)),
        ExprKind::RealConstant(x) => Ok(real_literal(*x)),
        ExprKind::ComplexConstant(re, im) => {
            let ty = scalar_type(ctx, &expr.ty, span)?;
            Ok(Fragment::atom(format!(
                "{ty}({}, {})",
                real_literal(*re).text,
                real_literal(*im).text
            )))
        }
        ExprKind::LogicalConstant(b) => Ok(Fragment::atom(if *b { "true" } else { "false" })),
        ExprKind::StringConstant(s) => Ok(Fragment::atom(string_literal(s))),
        ExprKind::Var(sym) => Ok(Fragment::atom(ctx.name(*sym))),

        ExprKind::BinOp { left, op, right } => {
            let l = emit_expr(ctx, *left)?;
            let r = emit_expr(ctx, *right)?;
            Ok(match op {
                BinOp::Pow => Fragment::atom(format!("std::pow({}, {})", l.text, r.text)),
                BinOp::Add => infix(&l, " + ", &r, ADDITIVE, Assoc::Associative),
                BinOp::Sub => infix(&l, " - ", &r, ADDITIVE, Assoc::LeftOnly),
                // Integer division makes `a*(b/c)` differ from `a*b/c`.
                BinOp::Mul => infix(&l, "*", &r, MULTIPLICATIVE, Assoc::LeftOnly),
                BinOp::Div => infix(&l, "/", &r, MULTIPLICATIVE, Assoc::LeftOnly),
            })
        }
        ExprKind::UnaryMinus(arg) => Ok(prefix("-", &emit_expr(ctx, *arg)?)),
        ExprKind::LogicalNot(arg) => Ok(prefix("!", &emit_expr(ctx, *arg)?)),
        ExprKind::BitNot(arg) => Ok(prefix("~", &emit_expr(ctx, *arg)?)),
        ExprKind::Compare { left, op, right } => {
            let l = emit_expr(ctx, *left)?;
            let r = emit_expr(ctx, *right)?;
            let prec = match op {
                CmpOp::Eq | CmpOp::NotEq => EQUALITY,
                CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => RELATIONAL,
            };
            Ok(infix(&l, &format!(" {} ", op.symbol()), &r, prec, Assoc::LeftOnly))
        }
        ExprKind::LogicalBinOp { left, op, right } => {
            let l = emit_expr(ctx, *left)?;
            let r = emit_expr(ctx, *right)?;
            Ok(match op {
                LogicalOp::And => infix(&l, " && ", &r, LOGICAL_AND, Assoc::Associative),
                LogicalOp::Or => infix(&l, " || ", &r, LOGICAL_OR, Assoc::Associative),
                LogicalOp::Eqv => infix(&l, " == ", &r, EQUALITY, Assoc::LeftOnly),
                LogicalOp::NEqv => infix(&l, " != ", &r, EQUALITY, Assoc::LeftOnly),
            })
        }
        ExprKind::StringConcat { left, right } => {
            let l = emit_expr(ctx, *left)?;
            let r = emit_expr(ctx, *right)?;
            let l = if matches!(ctx.expr(*left).kind, ExprKind::StringConcat { .. }) {
                l.text
            } else {
                format!("std::string({})", l.text)
            };
            Ok(Fragment::new(
                format!("{l} + std::string({})", r.text),
                ADDITIVE,
            ))
        }
        ExprKind::StringLen(arg) => {
            let s = emit_expr(ctx, *arg)?;
            let text = if matches!(ctx.expr(*arg).kind, ExprKind::Var(_)) {
                format!("{}.size()", s.text)
            } else {
                format!("std::string({}).size()", s.text)
            };
            Ok(Fragment::atom(format!("static_cast<int>({text})")))
        }
        ExprKind::IfExp { test, body, orelse } => {
            let t = emit_expr(ctx, *test)?;
            let b = emit_expr(ctx, *body)?;
            let o = emit_expr(ctx, *orelse)?;
            Ok(Fragment::new(
                format!("({}) ? ({}) : ({})", t.text, b.text, o.text),
                CONDITIONAL,
            ))
        }
        ExprKind::Cast { arg, kind } => emit_cast(ctx, *arg, *kind, &expr.ty, span),

        ExprKind::FunctionCall { func, args } => {
            if ctx.info(*func).intrinsic_function {
                return emit_intrinsic_module_call(ctx, *func, args, span);
            }
            let args = emit_call_args(ctx, args, span)?;
            Ok(Fragment::atom(format!(
                "{}({args})",
                procedure_name(ctx.name(*func))
            )))
        }
        ExprKind::IntrinsicElementalFunction { id: intrinsic, args, .. } => {
            if let Some(value) = expr.value {
                return emit_expr(ctx, value);
            }
            emit_intrinsic(ctx, *intrinsic, args, &expr.ty, span)
        }
        ExprKind::TypeInquiry { id: inquiry, .. } => match expr.value {
            Some(value) => emit_expr(ctx, value),
            None => Err(CodegenError::not_implemented(
                format!("Type inquiry `{inquiry}` without a compile-time value"),
                span,
            )),
        },

        ExprKind::ArrayItem { array, indices } => emit_array_item(ctx, *array, indices, span),
        ExprKind::ArraySize { array, dim } => {
            let a = emit_expr(ctx, *array)?;
            let base = left_operand(&a, ATOM);
            let text = match dim {
                None => format!("static_cast<int>({base}.size())"),
                Some(d) => {
                    let d = zero_based(ctx, *d, 1)?;
                    format!("static_cast<int>({base}.extent({d}))")
                }
            };
            Ok(Fragment::atom(text))
        }
        ExprKind::StructMember { base, member } => {
            let b = emit_expr(ctx, *base)?;
            let access = if is_pointer_var(ctx, *base) { "->" } else { "." };
            Ok(Fragment::atom(format!(
                "{}{access}{}",
                left_operand(&b, ATOM),
                ctx.name(*member)
            )))
        }

        other => Err(CodegenError::not_implemented(
            format!(
                "{} is not implemented by the C++ backend",
                container_node_name(other)
            ),
            span,
        )),
    }
}

fn emit_cast(
    ctx: &mut CodegenContext<'_>,
    arg: ExprId,
    kind: CastKind,
    target: &Ty,
    span: Span,
) -> CodegenResult<Fragment> {
    let a = emit_expr(ctx, arg)?;
    let target = scalar_type(ctx, target.element(), span)?;
    Ok(match kind {
        // C++ converts between widths of the same category implicitly.
        CastKind::RealToReal | CastKind::IntegerToInteger | CastKind::ComplexToComplex => a,
        CastKind::ComplexToReal => Fragment::atom(format!("std::real({})", a.text)),
        CastKind::IntegerToReal
        | CastKind::RealToInteger
        | CastKind::LogicalToInteger
        | CastKind::IntegerToLogical
        | CastKind::IntegerToComplex
        | CastKind::RealToComplex => {
            Fragment::atom(format!("static_cast<{target}>({})", a.text))
        }
    })
}

/// Comma-separated call arguments.
pub fn emit_call_args(
    ctx: &mut CodegenContext<'_>,
    args: &[Option<ExprId>],
    span: Span,
) -> CodegenResult<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        let Some(arg) = arg else {
            return Err(CodegenError::not_implemented(
                "Omitted optional arguments are not implemented",
                span,
            ));
        };
        out.push(emit_expr(ctx, *arg)?.text);
    }
    Ok(out.join(", "))
}

/// `a(i-1, j-1)`: Fortran bounds shifted to zero-based view indices.
fn emit_array_item(
    ctx: &mut CodegenContext<'_>,
    array: ExprId,
    indices: &[ExprId],
    span: Span,
) -> CodegenResult<Fragment> {
    let a = emit_expr(ctx, array)?;
    let Some(arr) = ctx.ty(array).as_array() else {
        return Err(CodegenError::internal("array item of a non-array value"));
    };
    let mut parts = Vec::with_capacity(indices.len());
    for (i, index) in indices.iter().enumerate() {
        let lower = match arr.dims.get(i).and_then(|d| d.start) {
            Some(start) => ctx.unit.exprs.int_constant(start).ok_or_else(|| {
                CodegenError::not_implemented("Symbolic lower bounds are not implemented", span)
            })?,
            None => 1,
        };
        parts.push(zero_based(ctx, *index, lower)?);
    }
    Ok(Fragment::atom(format!(
        "{}({})",
        left_operand(&a, ATOM),
        parts.join(", ")
    )))
}

/// `index - lower`, folded when the index is a constant.
fn zero_based(ctx: &mut CodegenContext<'_>, index: ExprId, lower: i64) -> CodegenResult<String> {
    if let Some(n) = ctx.unit.exprs.int_constant(index) {
        return Ok((n - lower).to_string());
    }
    let i = emit_expr(ctx, index)?;
    let base = left_operand(&i, ADDITIVE);
    Ok(match lower {
        0 => i.text,
        l if l > 0 => format!("{base}-{l}"),
        l => format!("{base}+{}", -l),
    })
}

/// Negative literals get unary precedence so `a - -1` prints as `a - (-1)`.
pub fn integer_literal(n: i64) -> Fragment {
    let suffix = if i32::try_from(n).is_ok() { "" } else { "LL" };
    let prec = if n < 0 { UNARY } else { ATOM };
    Fragment::new(format!("{n}{suffix}"), prec)
}

pub fn real_literal(x: f64) -> Fragment {
    if x.is_nan() {
        return Fragment::atom("NAN");
    }
    if x.is_infinite() {
        return if x > 0.0 {
            Fragment::atom("HUGE_VAL")
        } else {
            Fragment::new("-HUGE_VAL", UNARY)
        };
    }
    // Debug formatting always keeps a decimal point or an exponent.
    let text = format!("{x:?}");
    let prec = if x.is_sign_negative() { UNARY } else { ATOM };
    Fragment::new(text, prec)
}

pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn container_node_name(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::ListConstant(_) => "ListConstant",
        ExprKind::ListLen(_) => "ListLen",
        ExprKind::ListItem { .. } => "ListItem",
        ExprKind::ListConcat { .. } => "ListConcat",
        ExprKind::ListPop { .. } => "ListPop",
        ExprKind::ListIndex { .. } => "ListIndex",
        ExprKind::ListCount { .. } => "ListCount",
        ExprKind::ListContains { .. } => "ListContains",
        ExprKind::TupleConstant(_) => "TupleConstant",
        ExprKind::TupleItem { .. } => "TupleItem",
        ExprKind::TupleConcat { .. } => "TupleConcat",
        ExprKind::StringPartition { .. } => "StringPartition",
        ExprKind::DictConstant { .. } => "DictConstant",
        ExprKind::DictItem { .. } => "DictItem",
        ExprKind::DictPop { .. } => "DictPop",
        ExprKind::DictLen(_) => "DictLen",
        ExprKind::DictContains { .. } => "DictContains",
        ExprKind::DictKeys(_) => "DictKeys",
        ExprKind::DictValues(_) => "DictValues",
        ExprKind::SetConstant(_) => "SetConstant",
        ExprKind::SetLen(_) => "SetLen",
        ExprKind::SetContains { .. } => "SetContains",
        _ => "Expression",
    }
}
