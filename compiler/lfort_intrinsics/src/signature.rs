//! Declarative signature table for the elemental intrinsics.
//!
//! Every intrinsic is described once: accepted argument type combinations,
//! whether a trailing `kind=` argument is allowed, how the result type is
//! derived, which message style its diagnostics use and which runtime
//! routine (if any) implements it.

use lfort_ir::IntrinsicId;

use crate::TypeClass;

const INT: TypeClass = TypeClass::INT;
const UINT: TypeClass = TypeClass::UINT;
const REAL: TypeClass = TypeClass::REAL;
const COMPLEX: TypeClass = TypeClass::COMPLEX;
const BOOL: TypeClass = TypeClass::BOOL;
const REAL_OR_COMPLEX: TypeClass = TypeClass::REAL.union(TypeClass::COMPLEX);
const NUMERIC: TypeClass = TypeClass::INT
    .union(TypeClass::REAL)
    .union(TypeClass::COMPLEX);

/// How argument errors are worded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Style {
    /// "Intrinsic `X` accepts exactly one argument" and
    /// "`x` argument of `X` must be real".
    Classic {
        label: &'static str,
        arg_label: &'static str,
    },
    /// "Unexpected number of args, X takes N arguments, found M" and
    /// "Unexpected args, X expects (int, int) or (real, real) as arguments".
    Generated,
    Abs,
    /// `max0`/`min0` style variadic checks.
    Variadic { label: &'static str },
    Atan2,
}

/// Result type derivation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultRule {
    SameAsFirst,
    /// Real of the first argument's kind when it is complex.
    RealOfFirst,
    Integer(u8),
    Real(u8),
    Logical,
    /// Integer of the `kind=` argument, default 4.
    IntegerFromKindArg,
    /// Real of the `kind=` argument, default the first argument's kind.
    RealFromKindArg,
}

/// Which ASR verification rule applies to the built node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    /// One argument, output type equal to input type.
    UnaryElemental,
    /// Two arguments of equal type, output equal to both.
    BinaryElemental,
    Abs,
    /// Checked only against the overload table.
    Other,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Name used in diagnostics, e.g. `Sin` or `FloorDiv`.
    pub name: &'static str,
    /// Accepted argument combinations (excluding `kind=`).
    pub overloads: &'static [&'static [TypeClass]],
    pub kind_arg: bool,
    pub result: ResultRule,
    pub style: Style,
    pub family: Family,
    /// Runtime routine stem, called as `_lfortran_{s,d,c,z}<stem>`.
    pub runtime: Option<&'static str>,
}

impl Signature {
    fn generated(
        name: &'static str,
        overloads: &'static [&'static [TypeClass]],
        result: ResultRule,
    ) -> Self {
        Signature {
            name,
            overloads,
            kind_arg: false,
            result,
            style: Style::Generated,
            family: Family::Other,
            runtime: None,
        }
    }

    /// Real-only unary with classic wording, folded through libm.
    fn classic_real(name: &'static str, runtime: &'static str) -> Self {
        Signature {
            style: Style::Classic {
                label: name,
                arg_label: "x",
            },
            family: Family::UnaryElemental,
            runtime: Some(runtime),
            ..Self::generated(name, &[&[REAL]], ResultRule::SameAsFirst)
        }
    }

    /// Real-or-complex unary with classic wording.
    fn trig(name: &'static str, runtime: &'static str) -> Self {
        Signature {
            overloads: &[&[REAL_OR_COMPLEX]],
            ..Self::classic_real(name, runtime)
        }
    }

    fn with_kind_arg(mut self) -> Self {
        self.kind_arg = true;
        self
    }

    fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    /// Number of positional (non-`kind`) arguments.
    pub fn arity(&self) -> usize {
        self.overloads.first().map_or(0, |o| o.len())
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.style, Style::Variadic { .. })
    }

    /// `(int, int) or (real, real)`.
    pub fn describe_overloads(&self) -> String {
        self.overloads
            .iter()
            .map(|combo| {
                let names: Vec<&str> = combo.iter().map(|c| c.short_name()).collect();
                format!("({})", names.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" or ")
    }

    /// Union of all classes accepted at position `i`.
    pub fn accepted_at(&self, i: usize) -> TypeClass {
        self.overloads
            .iter()
            .filter_map(|combo| combo.get(i).copied())
            .fold(TypeClass::empty(), |acc, c| acc | c)
    }
}

/// Signature of `id`.
pub fn signature(id: IntrinsicId) -> Signature {
    use IntrinsicId as I;
    use ResultRule as R;
    let g = Signature::generated;
    match id {
        I::Sin => Signature::trig("Sin", "sin"),
        I::Cos => Signature::trig("Cos", "cos"),
        I::Tan => Signature::trig("Tan", "tan"),
        I::Asin => Signature::trig("Asin", "asin"),
        I::Acos => Signature::trig("Acos", "acos"),
        I::Atan => Signature::trig("Atan", "atan"),
        I::Sinh => Signature::trig("Sinh", "sinh"),
        I::Cosh => Signature::trig("Cosh", "cosh"),
        I::Tanh => Signature::trig("Tanh", "tanh"),
        I::Asinh => Signature::trig("Asinh", "asinh"),
        I::Acosh => Signature::trig("Acosh", "acosh"),
        I::Atanh => Signature::trig("Atanh", "atanh"),
        I::Log => Signature::trig("Log", "log"),
        I::Exp => Signature::trig("Exp", "exp"),
        I::Sqrt => Signature {
            runtime: Some("sqrt"),
            ..g("Sqrt", &[&[REAL], &[COMPLEX]], R::SameAsFirst).with_family(Family::UnaryElemental)
        },
        I::Trunc => Signature::classic_real("Trunc", "trunc"),
        I::Gamma => Signature::classic_real("Gamma", "gamma"),
        I::LogGamma => Signature::classic_real("LogGamma", "log_gamma"),
        I::Log10 => Signature::classic_real("Log10", "log10"),
        I::Erf => Signature::classic_real("Erf", "erf"),
        I::Erfc => Signature::classic_real("Erfc", "erfc"),
        I::Exp2 => Signature::classic_real("Exp2", "exp2"),
        I::Expm1 => Signature::classic_real("Expm1", "expm1"),
        I::Fix => Signature {
            style: Style::Classic {
                label: "fix",
                arg_label: "fix",
            },
            ..Signature::classic_real("Fix", "fix")
        },
        I::Aint => g("Aint", &[&[REAL]], R::RealFromKindArg).with_kind_arg(),
        I::Anint => g("Anint", &[&[REAL]], R::RealFromKindArg).with_kind_arg(),
        I::Nint => g("Nint", &[&[REAL]], R::IntegerFromKindArg).with_kind_arg(),
        I::Floor => g("Floor", &[&[REAL]], R::IntegerFromKindArg).with_kind_arg(),
        I::Ceiling => g("Ceiling", &[&[REAL]], R::IntegerFromKindArg).with_kind_arg(),
        I::Ifix => g("Ifix", &[&[REAL]], R::Integer(4)),
        I::Idint => g("Idint", &[&[REAL]], R::Integer(4)),
        I::Sngl => g("Sngl", &[&[REAL]], R::Real(4)),
        I::Abs => Signature {
            style: Style::Abs,
            family: Family::Abs,
            ..g("Abs", &[&[NUMERIC]], R::RealOfFirst)
        },
        I::Aimag => g("Aimag", &[&[COMPLEX]], R::RealOfFirst),
        I::Conjg => g("Conjg", &[&[COMPLEX]], R::SameAsFirst).with_family(Family::UnaryElemental),
        I::Atan2 => Signature {
            style: Style::Atan2,
            family: Family::BinaryElemental,
            runtime: Some("atan2"),
            ..g("Atan2", &[&[REAL, REAL]], R::SameAsFirst)
        },
        I::Hypot => g("Hypot", &[&[REAL, REAL]], R::SameAsFirst).with_family(Family::BinaryElemental),
        I::Dprod => g("Dprod", &[&[REAL, REAL]], R::Real(8)),
        I::Mod => g("Mod", &[&[INT, INT], &[REAL, REAL]], R::SameAsFirst),
        I::Modulo => g("Modulo", &[&[INT, INT], &[REAL, REAL]], R::SameAsFirst),
        I::Sign => g("Sign", &[&[INT, INT], &[REAL, REAL]], R::SameAsFirst),
        I::Dim => g("Dim", &[&[INT, INT], &[REAL, REAL]], R::SameAsFirst),
        I::FloorDiv => g(
            "FloorDiv",
            &[&[INT, INT], &[UINT, UINT], &[REAL, REAL], &[BOOL, BOOL]],
            R::SameAsFirst,
        ),
        I::Max => Signature {
            style: Style::Variadic { label: "max0" },
            ..g("Max", &[&[TypeClass::ANY, TypeClass::ANY]], R::SameAsFirst)
        },
        I::Min => Signature {
            style: Style::Variadic { label: "min0" },
            ..g("Min", &[&[TypeClass::ANY, TypeClass::ANY]], R::SameAsFirst)
        },
        I::Fma => g("FMA", &[&[REAL, REAL, REAL]], R::SameAsFirst),
        I::Iand => g("Iand", &[&[INT, INT]], R::SameAsFirst),
        I::Ior => g("Ior", &[&[INT, INT]], R::SameAsFirst),
        I::Ieor => g("Ieor", &[&[INT, INT]], R::SameAsFirst),
        I::Not => g("Not", &[&[INT]], R::SameAsFirst),
        I::Ibclr => g("Ibclr", &[&[INT, INT]], R::SameAsFirst),
        I::Ibset => g("Ibset", &[&[INT, INT]], R::SameAsFirst),
        I::Btest => g("Btest", &[&[INT, INT]], R::Logical),
        I::Ishft => g("Ishft", &[&[INT, INT]], R::SameAsFirst),
        I::Shiftl => g("Shiftl", &[&[INT, INT]], R::SameAsFirst),
        I::Shiftr => g("Shiftr", &[&[INT, INT]], R::SameAsFirst),
        I::Trailz => g("Trailz", &[&[INT]], R::SameAsFirst),
        I::Leadz => g("Leadz", &[&[INT]], R::SameAsFirst),
        I::Popcnt => g("Popcnt", &[&[INT]], R::Integer(4)),
        I::Poppar => g("Poppar", &[&[INT]], R::Integer(4)),
        I::Digits => g("Digits", &[&[INT], &[REAL]], R::Integer(4)),
        I::MinExponent => g("MinExponent", &[&[REAL]], R::Integer(4)),
        I::MaxExponent => g("MaxExponent", &[&[REAL]], R::Integer(4)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intrinsic_has_a_signature() {
        for id in IntrinsicId::ALL {
            let sig = signature(*id);
            assert!(!sig.overloads.is_empty(), "{id} has no overloads");
            assert!(sig.overloads.iter().all(|o| o.len() == sig.arity()));
        }
    }

    #[test]
    fn overload_description_matches_generated_wording() {
        assert_eq!(
            signature(IntrinsicId::Mod).describe_overloads(),
            "(int, int) or (real, real)"
        );
        assert_eq!(
            signature(IntrinsicId::FloorDiv).describe_overloads(),
            "(int, int) or (uint, uint) or (real, real) or (bool, bool)"
        );
    }
}
