//! Type-level proof that an error was reported.

use std::fmt;

/// Zero-sized proof that at least one error diagnostic was recorded.
///
/// The constructor is private to this crate: the only ways to obtain one are
/// [`Diagnostics::emit`](crate::Diagnostics::emit) and
/// [`Diagnostics::error_guaranteed`](crate::Diagnostics::error_guaranteed).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    /// `Some` when `count` errors (with `count > 0`) have been recorded.
    pub(crate) fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then_some(ErrorGuaranteed(()))
    }

    /// Only for callers that have just recorded an error.
    pub(crate) const fn after_emit() -> Self {
        ErrorGuaranteed(())
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error(s) emitted")
    }
}

impl std::error::Error for ErrorGuaranteed {}

#[cfg(test)]
mod tests;
