//! Coarse argument type classes used by the signature table.

use bitflags::bitflags;
use lfort_ir::Ty;

bitflags! {
    /// Scalar categories an intrinsic argument may belong to.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeClass: u8 {
        const INT = 1 << 0;
        const UINT = 1 << 1;
        const REAL = 1 << 2;
        const COMPLEX = 1 << 3;
        const BOOL = 1 << 4;
        const CHAR = 1 << 5;
        /// Any type at all, including derived types and containers.
        const ANY = 1 << 7;
    }
}

impl TypeClass {
    /// Class of the element type of `ty` (arrays are classified by their
    /// element, pointers and allocatables are looked through).
    pub fn of(ty: &Ty) -> TypeClass {
        match ty.element() {
            Ty::Integer { .. } => TypeClass::INT,
            Ty::UnsignedInteger { .. } => TypeClass::UINT,
            Ty::Real { .. } => TypeClass::REAL,
            Ty::Complex { .. } => TypeClass::COMPLEX,
            Ty::Logical { .. } => TypeClass::BOOL,
            Ty::Character { .. } => TypeClass::CHAR,
            _ => TypeClass::empty(),
        }
    }

    /// Whether an argument of class `actual` is accepted where `self` is
    /// expected.
    pub fn accepts(self, actual: TypeClass) -> bool {
        self.contains(TypeClass::ANY) || self.intersects(actual)
    }

    /// Short spelling used in "expects (int, real)" messages.
    pub fn short_name(self) -> &'static str {
        if self.contains(TypeClass::ANY) {
            return "any";
        }
        match self {
            TypeClass::INT => "int",
            TypeClass::UINT => "uint",
            TypeClass::REAL => "real",
            TypeClass::COMPLEX => "complex",
            TypeClass::BOOL => "bool",
            TypeClass::CHAR => "char",
            _ => "mixed",
        }
    }

    /// Prose spelling used in "must be real or complex" messages.
    pub fn prose(self) -> String {
        let parts: Vec<&str> = [
            (TypeClass::INT, "integer"),
            (TypeClass::REAL, "real"),
            (TypeClass::COMPLEX, "complex"),
            (TypeClass::BOOL, "logical"),
            (TypeClass::CHAR, "character"),
        ]
        .iter()
        .filter(|(c, _)| self.contains(*c))
        .map(|(_, n)| *n)
        .collect();
        parts.join(" or ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_array_elements() {
        let arr = Ty::array(
            Ty::f64(),
            [lfort_ir::Dimension::deferred()],
            lfort_ir::ArrayPhysicalType::DescriptorArray,
        );
        assert_eq!(TypeClass::of(&arr), TypeClass::REAL);
        assert_eq!(TypeClass::of(&Ty::allocatable(Ty::i32())), TypeClass::INT);
        assert_eq!(TypeClass::of(&Ty::list(Ty::i32())), TypeClass::empty());
    }

    #[test]
    fn any_accepts_everything() {
        assert!(TypeClass::ANY.accepts(TypeClass::empty()));
        assert!((TypeClass::REAL | TypeClass::COMPLEX).accepts(TypeClass::COMPLEX));
        assert!(!TypeClass::REAL.accepts(TypeClass::INT));
    }

    #[test]
    fn prose_lists_members() {
        assert_eq!((TypeClass::REAL | TypeClass::COMPLEX).prose(), "real or complex");
        assert_eq!(TypeClass::REAL.prose(), "real");
    }
}
