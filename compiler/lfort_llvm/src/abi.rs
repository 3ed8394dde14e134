//! Platform C-ABI policy for complex numbers.
//!
//! Only `bind(c)` procedures follow the C ABI; everything else passes
//! complex values as the native `{T, T}` pair.

use crate::ir::IrType;
use crate::options::Platform;

/// How a complex value crosses a C call boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComplexAbi {
    /// The native `{T, T}` pair, by value.
    Native,
    /// Reinterpreted through memory as this type.
    Coerced(IrType),
    /// A pointer to a caller-owned copy.
    ByReference,
    /// Returned through a hidden first pointer argument; the call returns
    /// `void`.
    SRet,
}

impl ComplexAbi {
    /// IR type of the value at the boundary, for a complex of `native` type.
    /// `None` for `SRet`, which passes nothing in the return slot.
    pub fn boundary_type(&self, native: &IrType) -> Option<IrType> {
        match self {
            ComplexAbi::Native => Some(native.clone()),
            ComplexAbi::Coerced(ty) => Some(ty.clone()),
            ComplexAbi::ByReference => Some(IrType::Ptr),
            ComplexAbi::SRet => None,
        }
    }
}

/// Native storage type of a complex of `kind` (4 or 8).
pub fn complex_type(kind: u8) -> IrType {
    let part = if kind == 4 { IrType::Float } else { IrType::Double };
    IrType::Struct(vec![part.clone(), part])
}

/// Passing convention of a complex argument.
pub fn complex_argument(platform: Platform, kind: u8) -> ComplexAbi {
    match (kind, platform) {
        (4, Platform::Windows) => ComplexAbi::Coerced(IrType::I64),
        (4, Platform::MacosArm) => ComplexAbi::Coerced(IrType::array(2, IrType::Float)),
        (4, _) => ComplexAbi::Coerced(IrType::vector(2, IrType::Float)),
        (_, Platform::Windows) => ComplexAbi::ByReference,
        _ => ComplexAbi::Native,
    }
}

/// Convention of a complex return value.
pub fn complex_return(platform: Platform, kind: u8) -> ComplexAbi {
    match (kind, platform) {
        (4, Platform::Windows) => ComplexAbi::Coerced(IrType::I64),
        (4, Platform::MacosArm) => ComplexAbi::Native,
        (4, _) => ComplexAbi::Coerced(IrType::vector(2, IrType::Float)),
        (_, Platform::Windows) => ComplexAbi::SRet,
        _ => ComplexAbi::Native,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_precision_trichotomy() {
        assert_eq!(
            complex_argument(Platform::Windows, 4),
            ComplexAbi::Coerced(IrType::I64)
        );
        assert_eq!(
            complex_argument(Platform::MacosArm, 4),
            ComplexAbi::Coerced(IrType::array(2, IrType::Float))
        );
        for p in [Platform::Linux, Platform::MacosIntel, Platform::Other] {
            assert_eq!(
                complex_argument(p, 4),
                ComplexAbi::Coerced(IrType::vector(2, IrType::Float))
            );
        }
        assert_eq!(complex_return(Platform::MacosArm, 4), ComplexAbi::Native);
    }

    #[test]
    fn double_precision_on_windows_goes_through_memory() {
        assert_eq!(complex_argument(Platform::Windows, 8), ComplexAbi::ByReference);
        assert_eq!(complex_return(Platform::Windows, 8), ComplexAbi::SRet);
        assert_eq!(complex_argument(Platform::Linux, 8), ComplexAbi::Native);
        assert_eq!(
            ComplexAbi::Native.boundary_type(&complex_type(8)),
            Some(IrType::Struct(vec![IrType::Double, IrType::Double]))
        );
        assert_eq!(ComplexAbi::SRet.boundary_type(&complex_type(8)), None);
    }
}
