//! Names of the runtime library routines implementing intrinsics that the
//! backends call instead of expanding inline.

use lfort_ir::{IntrinsicId, Ty};

use crate::signature::signature;

/// `_lfortran_{s,d,c,z}<stem>` for the element type `ty`, or `None` when the
/// intrinsic has no runtime routine for that type.
pub fn runtime_function_name(id: IntrinsicId, ty: &Ty) -> Option<String> {
    let stem = signature(id).runtime?;
    let prefix = match ty.element() {
        Ty::Real { kind: 4 } => 's',
        Ty::Real { kind: 8 } => 'd',
        Ty::Complex { kind: 4 } => 'c',
        Ty::Complex { kind: 8 } => 'z',
        _ => return None,
    };
    Some(format!("_lfortran_{prefix}{stem}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_follow_type_and_kind() {
        assert_eq!(
            runtime_function_name(IntrinsicId::Sin, &Ty::f32()).as_deref(),
            Some("_lfortran_ssin")
        );
        assert_eq!(
            runtime_function_name(IntrinsicId::LogGamma, &Ty::f64()).as_deref(),
            Some("_lfortran_dlog_gamma")
        );
        assert_eq!(
            runtime_function_name(IntrinsicId::Exp, &Ty::complex(8)).as_deref(),
            Some("_lfortran_zexp")
        );
        assert_eq!(runtime_function_name(IntrinsicId::Sin, &Ty::i32()), None);
        assert_eq!(runtime_function_name(IntrinsicId::Mod, &Ty::f64()), None);
    }
}
