//! Type inquiries (`radix`, `rank`, `range`, `epsilon`, `precision`,
//! `tiny`, `huge`, `kind`).
//!
//! These are answered from the static type of the argument, never from its
//! value, so the node is always built with a folded value.

use lfort_diagnostic::{Diagnostics, ErrorCode};
use lfort_ir::{AsrBuilder, ExprId, ExprKind, InquiryId, Span, Ty};

use crate::fold::Const;
use crate::TypeClass;

const INT: TypeClass = TypeClass::INT;
const REAL: TypeClass = TypeClass::REAL;

fn accepted(id: InquiryId) -> (&'static str, &'static [TypeClass]) {
    match id {
        InquiryId::Radix => ("Radix", &[INT, REAL]),
        InquiryId::Rank => ("Rank", &[TypeClass::ANY]),
        InquiryId::Range => ("Range", &[INT, REAL, TypeClass::COMPLEX]),
        InquiryId::Epsilon => ("Epsilon", &[REAL]),
        InquiryId::Precision => ("Precision", &[REAL, TypeClass::COMPLEX]),
        InquiryId::Tiny => ("Tiny", &[REAL]),
        InquiryId::Huge => ("Huge", &[INT, REAL]),
        InquiryId::Kind => (
            "Kind",
            &[INT, REAL, TypeClass::BOOL, TypeClass::CHAR, TypeClass::COMPLEX],
        ),
    }
}

/// Value of inquiry `id` for an argument of type `ty`.
pub fn inquiry_value(id: InquiryId, ty: &Ty) -> Result<Const, String> {
    let el = ty.element();
    let kind = el.kind().unwrap_or(4);
    let unsupported = || Err(format!("Kind {kind} is not supported yet"));
    let real_kind = |k: u8| matches!(k, 4 | 8);
    match id {
        InquiryId::Radix => Ok(Const::Int(2)),
        InquiryId::Rank => {
            let rank = ty.as_array().map_or(0, lfort_ir::ArrayType::rank);
            Ok(Const::Int(i64::try_from(rank).unwrap_or(i64::MAX)))
        }
        InquiryId::Kind => Ok(Const::Int(i64::from(kind))),
        InquiryId::Range => match (el, kind) {
            (Ty::Integer { .. }, 1) => Ok(Const::Int(2)),
            (Ty::Integer { .. }, 2) => Ok(Const::Int(4)),
            (Ty::Integer { .. }, 4) => Ok(Const::Int(9)),
            (Ty::Integer { .. }, 8) => Ok(Const::Int(18)),
            (Ty::Real { .. } | Ty::Complex { .. }, 4) => Ok(Const::Int(37)),
            (Ty::Real { .. } | Ty::Complex { .. }, 8) => Ok(Const::Int(307)),
            _ => unsupported(),
        },
        InquiryId::Precision => match kind {
            4 => Ok(Const::Int(6)),
            8 => Ok(Const::Int(15)),
            _ => unsupported(),
        },
        InquiryId::Epsilon if real_kind(kind) => Ok(Const::Real(if kind == 4 {
            f64::from(f32::EPSILON)
        } else {
            f64::EPSILON
        })),
        InquiryId::Tiny if real_kind(kind) => Ok(Const::Real(if kind == 4 {
            f64::from(f32::MIN_POSITIVE)
        } else {
            f64::MIN_POSITIVE
        })),
        InquiryId::Huge => match (el, kind) {
            (Ty::Integer { .. }, 1) => Ok(Const::Int(i64::from(i8::MAX))),
            (Ty::Integer { .. }, 2) => Ok(Const::Int(i64::from(i16::MAX))),
            (Ty::Integer { .. }, 4) => Ok(Const::Int(i64::from(i32::MAX))),
            (Ty::Integer { .. }, 8) => Ok(Const::Int(i64::MAX)),
            (Ty::Real { .. }, 4) => Ok(Const::Real(f64::from(f32::MAX))),
            (Ty::Real { .. }, 8) => Ok(Const::Real(f64::MAX)),
            _ => unsupported(),
        },
        InquiryId::Epsilon | InquiryId::Tiny => unsupported(),
    }
}

/// Result type: the argument's scalar type for `epsilon`, `tiny` and
/// `huge`, default integer otherwise.
pub fn inquiry_result_type(id: InquiryId, arg_ty: &Ty) -> Ty {
    match id {
        InquiryId::Epsilon | InquiryId::Tiny | InquiryId::Huge => arg_ty.element().strip().clone(),
        _ => Ty::i32(),
    }
}

/// Build a `TypeInquiry` node for `id(arg)`.
pub fn create_inquiry(
    b: &mut AsrBuilder,
    id: InquiryId,
    args: &[ExprId],
    span: Span,
    diags: &mut Diagnostics,
) -> Option<ExprId> {
    let (name, classes) = accepted(id);
    b.set_span(span);
    let [arg] = args else {
        diags.append_error_with_code(
            ErrorCode::E1001,
            format!(
                "Unexpected number of args, {name} takes 1 arguments, found {}",
                args.len()
            ),
            span,
        );
        return None;
    };
    let arg_ty = b.ty(*arg).clone();
    let class = TypeClass::of(&arg_ty);
    if !classes.iter().any(|c| c.accepts(class)) {
        let wanted: Vec<String> = classes
            .iter()
            .map(|c| format!("({})", c.short_name()))
            .collect();
        diags.append_error_with_code(
            ErrorCode::E1002,
            format!("Unexpected args, {name} expects {} as arguments", wanted.join(" or ")),
            span,
        );
        return None;
    }
    let value = match inquiry_value(id, &arg_ty) {
        Ok(v) => v,
        Err(message) => {
            diags.append_error_with_code(ErrorCode::E1003, message, span);
            return None;
        }
    };
    let result_ty = inquiry_result_type(id, &arg_ty);
    let node = b.expr(
        ExprKind::TypeInquiry {
            id,
            arg_ty,
            arg: *arg,
        },
        result_ty.clone(),
    );
    let value = value.materialize(b, &result_ty);
    b.set_value(node, value);
    Some(node)
}

#[cfg(test)]
mod tests {
    use lfort_ir::{ArrayPhysicalType, Dimension};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn numeric_model_values() {
        assert_eq!(inquiry_value(InquiryId::Range, &Ty::integer(2)), Ok(Const::Int(4)));
        assert_eq!(inquiry_value(InquiryId::Range, &Ty::complex(8)), Ok(Const::Int(307)));
        assert_eq!(inquiry_value(InquiryId::Precision, &Ty::f32()), Ok(Const::Int(6)));
        assert_eq!(
            inquiry_value(InquiryId::Huge, &Ty::i32()),
            Ok(Const::Int(2_147_483_647))
        );
        assert_eq!(
            inquiry_value(InquiryId::Epsilon, &Ty::f64()),
            Ok(Const::Real(f64::EPSILON))
        );
        assert_eq!(
            inquiry_value(InquiryId::Tiny, &Ty::real(16)),
            Err("Kind 16 is not supported yet".to_string())
        );
    }

    #[test]
    fn rank_counts_dimensions() {
        let ty = Ty::array(
            Ty::i32(),
            [Dimension::deferred(), Dimension::deferred()],
            ArrayPhysicalType::DescriptorArray,
        );
        assert_eq!(inquiry_value(InquiryId::Rank, &ty), Ok(Const::Int(2)));
        assert_eq!(inquiry_value(InquiryId::Rank, &Ty::f64()), Ok(Const::Int(0)));
    }

    #[test]
    fn node_is_always_folded() {
        let mut b = AsrBuilder::new();
        let mut diags = Diagnostics::new();
        let global = b.global();
        let v = b.variable(global, "x", Ty::f32());
        let x = b.var(v);
        let node = create_inquiry(&mut b, InquiryId::Huge, &[x], Span::DUMMY, &mut diags);
        let node = node.unwrap_or_else(|| panic!("{}", diags.render()));
        assert_eq!(b.ty(node), &Ty::f32());
        let value = b.unit().exprs.get(node).value.map(|v| b.unit().exprs.get(v).kind.clone());
        assert_eq!(value, Some(ExprKind::RealConstant(f64::from(f32::MAX))));
    }

    #[test]
    fn rejected_argument_lists_overloads() {
        let mut b = AsrBuilder::new();
        let mut diags = Diagnostics::new();
        let flag = b.logical(true);
        assert!(create_inquiry(&mut b, InquiryId::Range, &[flag], Span::DUMMY, &mut diags).is_none());
        assert_eq!(
            diags.iter().next().map(|d| d.message.clone()),
            Some("Unexpected args, Range expects (int) or (real) or (complex) as arguments".to_string())
        );
    }
}
