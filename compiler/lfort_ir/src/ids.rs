//! Arena index newtypes.
//!
//! Every ASR node the lowering engine needs to key side tables on gets a
//! stable `u32` identity assigned when the node is allocated. Side tables
//! (needs-declaration, intrinsic markers, struct layouts) key on these ids,
//! never on addresses.

use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel for "no node".
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            /// Position in the owning arena.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            /// Build an id from an arena length.
            ///
            /// Arenas hold far fewer than `u32::MAX` nodes; saturating keeps
            /// the conversion total.
            #[inline]
            pub(crate) fn from_len(len: usize) -> Self {
                $name(u32::try_from(len).unwrap_or(u32::MAX - 1))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}::INVALID", stringify!($name))
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

define_index!(
    /// Index into [`ExprArena`](crate::ExprArena).
    ExprId
);

define_index!(
    /// Index into the symbol arena of a [`SymbolTable`](crate::SymbolTable).
    SymbolId
);

define_index!(
    /// Index of a scope (a name-to-symbol map) inside a [`SymbolTable`](crate::SymbolTable).
    ScopeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel() {
        assert!(!ExprId::INVALID.is_valid());
        assert!(SymbolId::new(3).is_valid());
        assert_eq!(ScopeId::default(), ScopeId::INVALID);
        assert_eq!(format!("{:?}", SymbolId::new(7)), "SymbolId(7)");
    }
}
