//! Identities of intrinsic elemental functions and type inquiries.
//!
//! The builders live in `lfort_intrinsics`; the ASR only records which
//! intrinsic a node applies so the backends can dispatch on it.

use std::fmt;

macro_rules! intrinsic_ids {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Fortran spelling of the intrinsic.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }

            /// Look an intrinsic up by its Fortran spelling.
            pub fn from_name(name: &str) -> Option<Self> {
                let lower = name.to_ascii_lowercase();
                Self::ALL.iter().copied().find(|v| v.name() == lower)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

intrinsic_ids! {
    /// Elemental intrinsic functions with a general construction path.
    pub enum IntrinsicId {
        Sin => "sin",
        Cos => "cos",
        Tan => "tan",
        Asin => "asin",
        Acos => "acos",
        Atan => "atan",
        Sinh => "sinh",
        Cosh => "cosh",
        Tanh => "tanh",
        Asinh => "asinh",
        Acosh => "acosh",
        Atanh => "atanh",
        Log => "log",
        Exp => "exp",
        Sqrt => "sqrt",
        Trunc => "trunc",
        Gamma => "gamma",
        LogGamma => "log_gamma",
        Log10 => "log10",
        Erf => "erf",
        Erfc => "erfc",
        Exp2 => "exp2",
        Expm1 => "expm1",
        Fix => "fix",
        Aint => "aint",
        Anint => "anint",
        Nint => "nint",
        Floor => "floor",
        Ceiling => "ceiling",
        Ifix => "ifix",
        Idint => "idint",
        Sngl => "sngl",
        Abs => "abs",
        Aimag => "aimag",
        Conjg => "conjg",
        Atan2 => "atan2",
        Hypot => "hypot",
        Dprod => "dprod",
        Mod => "mod",
        Modulo => "modulo",
        Sign => "sign",
        Dim => "dim",
        FloorDiv => "floordiv",
        Max => "max",
        Min => "min",
        Fma => "fma",
        Iand => "iand",
        Ior => "ior",
        Ieor => "ieor",
        Not => "not",
        Ibclr => "ibclr",
        Ibset => "ibset",
        Btest => "btest",
        Ishft => "ishft",
        Shiftl => "shiftl",
        Shiftr => "shiftr",
        Trailz => "trailz",
        Leadz => "leadz",
        Popcnt => "popcnt",
        Poppar => "poppar",
        Digits => "digits",
        MinExponent => "minexponent",
        MaxExponent => "maxexponent",
    }
}

intrinsic_ids! {
    /// Inquiries answered purely from the static type of the argument.
    pub enum InquiryId {
        Radix => "radix",
        Rank => "rank",
        Range => "range",
        Epsilon => "epsilon",
        Precision => "precision",
        Tiny => "tiny",
        Huge => "huge",
        Kind => "kind",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        assert_eq!(IntrinsicId::from_name("SIN"), Some(IntrinsicId::Sin));
        assert_eq!(IntrinsicId::from_name("log_gamma"), Some(IntrinsicId::LogGamma));
        assert_eq!(InquiryId::from_name("Huge"), Some(InquiryId::Huge));
        assert_eq!(IntrinsicId::from_name("frobnicate"), None);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = IntrinsicId::ALL.iter().map(|i| i.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), IntrinsicId::ALL.len());
    }
}
