//! Consistency checks over already built intrinsic nodes.
//!
//! Run after later passes have rewritten the ASR: they must not break the
//! shape the builders produced.

use lfort_diagnostic::Diagnostics;
use lfort_ir::{Expr, ExprId, ExprKind, IntrinsicId, TranslationUnit, Ty};

use crate::signature::{signature, Family, Style};
use crate::TypeClass;

/// Check every intrinsic node in `unit`; returns whether all passed.
pub fn verify_unit(unit: &TranslationUnit, diags: &mut Diagnostics) -> bool {
    let before = diags.error_count();
    for (id, expr) in unit.exprs.iter() {
        match &expr.kind {
            ExprKind::IntrinsicElementalFunction { .. } => verify_intrinsic(unit, id, diags),
            ExprKind::TypeInquiry { id: inquiry, .. } => {
                diags.require(
                    expr.value.is_some(),
                    format!(
                        "Missing compile time value, `{inquiry}` intrinsic output must be computed during compile time"
                    ),
                    expr.span,
                );
            }
            _ => {}
        }
    }
    diags.error_count() == before
}

fn type_str(unit: &TranslationUnit, ty: &Ty) -> String {
    ty.type_code(&unit.symbols)
}

/// Check one `IntrinsicElementalFunction` node.
pub fn verify_intrinsic(unit: &TranslationUnit, node: ExprId, diags: &mut Diagnostics) {
    let expr: &Expr = unit.exprs.get(node);
    let ExprKind::IntrinsicElementalFunction { id, args, overload } = &expr.kind else {
        return;
    };
    let sig = signature(*id);
    let span = expr.span;
    let arg_ty = |i: usize| unit.exprs.ty(args[i]);

    diags.require(
        *overload == 0,
        format!("Overload Id for {} expected to be 0, found {overload}", sig.name),
        span,
    );

    if matches!(
        id,
        IntrinsicId::Digits | IntrinsicId::MinExponent | IntrinsicId::MaxExponent
    ) {
        diags.require(
            expr.value.is_some(),
            format!(
                "Missing compile time value, `{}` intrinsic output must be computed during compile time",
                sig.name
            ),
            span,
        );
    }

    match sig.family {
        Family::UnaryElemental => {
            if !diags.require(
                args.len() == 1,
                "Elemental intrinsics must have only 1 input argument",
                span,
            ) {
                return;
            }
            diags.require(
                arg_ty(0) == &expr.ty,
                format!(
                    "The input and output type of elemental intrinsics must exactly match, input type: {} output type: {}",
                    type_str(unit, arg_ty(0)),
                    type_str(unit, &expr.ty)
                ),
                span,
            );
        }
        Family::BinaryElemental => {
            if !diags.require(
                args.len() == 2,
                "Binary intrinsics must have only 2 input arguments",
                span,
            ) {
                return;
            }
            diags.require(
                arg_ty(0) == arg_ty(1),
                format!(
                    "The types of both the arguments of binary intrinsics must exactly match, argument 1 type: {} argument 2 type: {}",
                    type_str(unit, arg_ty(0)),
                    type_str(unit, arg_ty(1))
                ),
                span,
            );
        }
        Family::Abs => {
            if !diags.require(
                args.len() == 1,
                "Elemental intrinsics must have only 1 input argument",
                span,
            ) {
                return;
            }
            if let Ty::Complex { kind } = arg_ty(0).element() {
                diags.require(
                    expr.ty.element() == &Ty::real(*kind),
                    format!(
                        "Abs intrinsic must return output of real for complex input, found: {}",
                        type_str(unit, &expr.ty)
                    ),
                    span,
                );
            } else {
                diags.require(
                    arg_ty(0) == &expr.ty,
                    format!(
                        "The input and output type of elemental intrinsics must exactly match, input type: {} output type: {}",
                        type_str(unit, arg_ty(0)),
                        type_str(unit, &expr.ty)
                    ),
                    span,
                );
            }
        }
        Family::Other => verify_against_overloads(unit, expr, args, diags),
    }
}

fn verify_against_overloads(unit: &TranslationUnit, expr: &Expr, args: &[ExprId], diags: &mut Diagnostics) {
    let ExprKind::IntrinsicElementalFunction { id, .. } = &expr.kind else {
        return;
    };
    let sig = signature(*id);
    let span = expr.span;
    let tys: Vec<&Ty> = args.iter().map(|a| unit.exprs.ty(*a)).collect();

    if let Style::Variadic { label } = sig.style {
        if !diags.require(
            args.len() > 1,
            format!("Call to {label} must have at least two arguments"),
            span,
        ) {
            return;
        }
        let first = TypeClass::of(tys[0]);
        diags.require(
            (TypeClass::INT | TypeClass::REAL | TypeClass::CHAR).accepts(first),
            format!("Arguments to {label} must be of real, integer or character type"),
            span,
        );
        diags.require(
            tys.iter().all(|t| TypeClass::of(t) == first),
            "All arguments must be of the same type",
            span,
        );
        return;
    }

    if !diags.require(
        args.len() == sig.arity(),
        format!(
            "Unexpected number of args, {} takes {} arguments, found {}",
            sig.name,
            sig.arity(),
            args.len()
        ),
        span,
    ) {
        return;
    }
    let matched = sig.overloads.iter().any(|combo| {
        combo
            .iter()
            .zip(&tys)
            .all(|(want, ty)| want.accepts(TypeClass::of(ty)))
    });
    diags.require(
        matched,
        format!(
            "Unexpected args, {} expects {} as arguments",
            sig.name,
            sig.describe_overloads()
        ),
        span,
    );
}

#[cfg(test)]
mod tests;
