//! Construction of `IntrinsicElementalFunction` nodes.
//!
//! Every intrinsic goes through the same steps: check the argument count
//! and each argument's type against the signature table, derive the result
//! type (possibly from a `kind=` argument), then fold the call when every
//! argument is a compile-time constant. Failures are appended to the
//! diagnostics sink and yield `None`.

use lfort_diagnostic::{Diagnostics, ErrorCode};
use lfort_ir::{AsrBuilder, ExprId, ExprKind, IntrinsicId, Span, Ty};

use crate::fold::{fold, Const, FoldError};
use crate::signature::{signature, ResultRule, Signature, Style};
use crate::TypeClass;

/// Build the intrinsic call `id(args...)`.
///
/// `args` holds the actual arguments in order; `None` marks an omitted
/// optional argument (only the trailing `kind=` may be omitted, and
/// `max`/`min` ignore omitted arguments).
pub fn create_intrinsic(
    b: &mut AsrBuilder,
    id: IntrinsicId,
    args: &[Option<ExprId>],
    span: Span,
    diags: &mut Diagnostics,
) -> Option<ExprId> {
    let sig = signature(id);
    b.set_span(span);

    let (positional, kind_arg) = match split_args(&sig, args) {
        Ok(split) => split,
        Err(found) => {
            diags.append_error_with_code(ErrorCode::E1001, arity_message(&sig, found), span);
            return None;
        }
    };

    if !check_types(b, &sig, &positional, span, diags) {
        return None;
    }
    let scalar_ty = result_type(b, &sig, &positional, kind_arg, diags)?;
    let first_ty = b.ty(positional[0]).clone();
    let result_ty = match first_ty.as_array() {
        Some(arr) => Ty::array(scalar_ty.clone(), arr.dims.iter().copied(), arr.physical),
        None => scalar_ty.clone(),
    };

    let node = b.expr(
        ExprKind::IntrinsicElementalFunction {
            id,
            args: positional.clone(),
            overload: 0,
        },
        result_ty,
    );

    let consts = constant_args(b, id, &positional);
    if let Some(consts) = consts {
        match fold(id, &consts, &first_ty, &scalar_ty) {
            Ok(Some(value)) => {
                let value = value.materialize(b, &scalar_ty);
                b.set_value(node, value);
            }
            Ok(None) => {}
            Err(FoldError::DivisionByZero) => {
                let at = positional.get(1).map_or(span, |e| b.unit().exprs.span(*e));
                diags.append_error_with_code(ErrorCode::E1004, "Division by `0` is not allowed", at);
                return None;
            }
        }
    }
    tracing::trace!(intrinsic = %id, folded = b.unit().exprs.get(node).value.is_some(), "built intrinsic");
    Some(node)
}

/// Positional arguments and the optional `kind=` argument, or the number
/// of arguments found when the count is wrong.
fn split_args(
    sig: &Signature,
    args: &[Option<ExprId>],
) -> Result<(Vec<ExprId>, Option<ExprId>), usize> {
    if sig.is_variadic() {
        let present: Vec<ExprId> = args.iter().flatten().copied().collect();
        return if present.len() < 2 {
            Err(present.len())
        } else {
            Ok((present, None))
        };
    }
    let arity = sig.arity();
    let (positional, kind) = if args.len() == arity {
        (args, None)
    } else if sig.kind_arg && args.len() == arity + 1 {
        (&args[..arity], args[arity])
    } else {
        return Err(args.len());
    };
    let positional: Option<Vec<ExprId>> = positional.iter().copied().collect();
    positional.map(|p| (p, kind)).ok_or(args.len())
}

fn arity_message(sig: &Signature, found: usize) -> String {
    match sig.style {
        Style::Classic { label, .. } => format!("Intrinsic `{label}` accepts exactly one argument"),
        Style::Abs => "Intrinsic abs function accepts exactly 1 argument".to_string(),
        Style::Variadic { label } => format!("Intrinsic {label} must have 2 arguments"),
        Style::Generated | Style::Atan2 => {
            let expected = sig.arity() + usize::from(sig.kind_arg);
            format!(
                "Unexpected number of args, {} takes {expected} arguments, found {found}",
                sig.name
            )
        }
    }
}

fn check_types(
    b: &AsrBuilder,
    sig: &Signature,
    args: &[ExprId],
    span: Span,
    diags: &mut Diagnostics,
) -> bool {
    let exprs = &b.unit().exprs;
    let classes: Vec<TypeClass> = args.iter().map(|e| TypeClass::of(exprs.ty(*e))).collect();
    let mut report = |code: ErrorCode, message: String, at: Span| {
        diags.append_error_with_code(code, message, at);
        false
    };
    match sig.style {
        Style::Classic { label, arg_label } => {
            let accepted = sig.accepted_at(0);
            if accepted.accepts(classes[0]) {
                true
            } else {
                report(
                    ErrorCode::E1002,
                    format!("`{arg_label}` argument of `{label}` must be {}", accepted.prose()),
                    exprs.span(args[0]),
                )
            }
        }
        Style::Abs => {
            if sig.accepted_at(0).accepts(classes[0]) {
                true
            } else {
                report(
                    ErrorCode::E1002,
                    "Argument of the abs function must be Integer, Real or Complex".to_string(),
                    exprs.span(args[0]),
                )
            }
        }
        Style::Atan2 => {
            for (i, label) in ["x", "y"].into_iter().enumerate() {
                if !TypeClass::REAL.accepts(classes[i]) {
                    return report(
                        ErrorCode::E1002,
                        format!("`{label}` argument of \"atan2\" must be real"),
                        exprs.span(args[i]),
                    );
                }
            }
            true
        }
        Style::Variadic { label } => {
            let ordered = TypeClass::INT | TypeClass::REAL | TypeClass::CHAR;
            if !ordered.accepts(classes[0]) {
                return report(
                    ErrorCode::E1002,
                    format!("Arguments to {label} must be of real, integer or character type"),
                    exprs.span(args[0]),
                );
            }
            let first = exprs.ty(args[0]);
            if args.iter().all(|a| exprs.ty(*a).element().same_kind_as(first.element())) {
                true
            } else {
                report(
                    ErrorCode::E1005,
                    format!("All arguments to {label} must be of the same type and kind"),
                    span,
                )
            }
        }
        Style::Generated => {
            let matched = sig.overloads.iter().any(|combo| {
                combo.iter().zip(&classes).all(|(want, got)| want.accepts(*got))
            });
            if matched {
                true
            } else {
                report(
                    ErrorCode::E1002,
                    format!(
                        "Unexpected args, {} expects {} as arguments",
                        sig.name,
                        sig.describe_overloads()
                    ),
                    span,
                )
            }
        }
    }
}

/// Scalar result type of the call.
fn result_type(
    b: &AsrBuilder,
    sig: &Signature,
    args: &[ExprId],
    kind_arg: Option<ExprId>,
    diags: &mut Diagnostics,
) -> Option<Ty> {
    let first = b.ty(args[0]).element().strip().clone();
    let ty = match sig.result {
        ResultRule::SameAsFirst => first,
        ResultRule::RealOfFirst => match first {
            Ty::Complex { kind } => Ty::real(kind),
            other => other,
        },
        ResultRule::Integer(kind) => Ty::integer(kind),
        ResultRule::Real(kind) => Ty::real(kind),
        ResultRule::Logical => Ty::logical(),
        ResultRule::IntegerFromKindArg => {
            let kind = kind_value(b, sig, kind_arg, 4, &[1, 2, 4, 8], diags)?;
            Ty::integer(kind)
        }
        ResultRule::RealFromKindArg => {
            let default = first.kind().unwrap_or(4);
            let kind = kind_value(b, sig, kind_arg, default, &[4, 8], diags)?;
            Ty::real(kind)
        }
    };
    Some(ty)
}

/// Value of an optional `kind=` argument.
fn kind_value(
    b: &AsrBuilder,
    sig: &Signature,
    kind_arg: Option<ExprId>,
    default: u8,
    supported: &[u8],
    diags: &mut Diagnostics,
) -> Option<u8> {
    let Some(arg) = kind_arg else {
        return Some(default);
    };
    let exprs = &b.unit().exprs;
    let value = exprs
        .ty(arg)
        .is_integer()
        .then(|| exprs.int_constant(arg))
        .flatten();
    let Some(value) = value else {
        diags.append_error_with_code(
            ErrorCode::E1002,
            format!(
                "`kind` argument of the `{}` function must be a scalar Integer constant",
                sig.name
            ),
            exprs.span(arg),
        );
        return None;
    };
    match u8::try_from(value) {
        Ok(kind) if supported.contains(&kind) => Some(kind),
        _ => {
            diags.append_error_with_code(
                ErrorCode::E1003,
                format!("Kind {value} is not supported yet"),
                exprs.span(arg),
            );
            None
        }
    }
}

/// Constant values of every argument, or `None` if any is not constant.
///
/// The numeric-model inquiries fold from the argument type alone.
fn constant_args(b: &AsrBuilder, id: IntrinsicId, args: &[ExprId]) -> Option<Vec<Const>> {
    if matches!(
        id,
        IntrinsicId::Digits | IntrinsicId::MinExponent | IntrinsicId::MaxExponent
    ) {
        return Some(Vec::new());
    }
    if b.ty(args[0]).is_array() {
        return None;
    }
    args.iter()
        .map(|a| Const::read(&b.unit().exprs, *a))
        .collect()
}
