//! Error codes for all code generator diagnostics.
//!
//! Each code is a unique identifier (e.g. `E3001`) whose first digit names
//! the phase that reported it.

use std::fmt;

macro_rules! error_codes {
    ($($(#[$meta:meta])* $code:ident,)*) => {
        /// Error codes for all code generator diagnostics.
        ///
        /// Format: E#### where the first digit indicates the phase:
        /// - E1xxx: intrinsic builders
        /// - E2xxx: ASR verification
        /// - E3xxx: code generation (unimplemented or unsupported constructs)
        /// - E4xxx: translation unit driver
        /// - E9xxx: internal invariant violations
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
        pub enum ErrorCode {
            $($(#[$meta])* $code,)*
        }

        impl ErrorCode {
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$code,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ErrorCode::$code => stringify!($code),)*
                }
            }
        }
    };
}

error_codes! {
    /// Wrong number of arguments to an intrinsic
    E1001,
    /// Intrinsic argument of the wrong type
    E1002,
    /// Kind argument not supported
    E1003,
    /// Invalid constant argument (division by zero, empty separator)
    E1004,
    /// Arguments that must agree in type and kind do not
    E1005,

    /// Elemental intrinsic input and output types differ
    E2001,
    /// Malformed intrinsic node
    E2002,

    /// Construct not implemented by this backend
    E3001,
    /// Type or layout unsupported by this backend
    E3002,

    /// Module dependency cycle
    E4001,
    /// Reference to an unknown symbol
    E4002,

    /// Internal code generator error
    E9001,
}

impl ErrorCode {
    fn phase(self) -> u8 {
        self.as_str().as_bytes().get(1).copied().unwrap_or(b'0')
    }

    pub fn is_intrinsic_error(&self) -> bool {
        self.phase() == b'1'
    }

    pub fn is_verify_error(&self) -> bool {
        self.phase() == b'2'
    }

    pub fn is_codegen_error(&self) -> bool {
        self.phase() == b'3'
    }

    pub fn is_driver_error(&self) -> bool {
        self.phase() == b'4'
    }

    pub fn is_internal_error(&self) -> bool {
        self.phase() == b'9'
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"E3001"`, case-insensitively.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}

#[cfg(test)]
mod tests;
