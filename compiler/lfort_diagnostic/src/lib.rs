//! Diagnostics for the lfort code generators.
//!
//! Lowering reports problems through two channels:
//!
//! - The intrinsic builders push structured diagnostics into a
//!   [`Diagnostics`] sink through `append_error` and `require`, and keep
//!   going so several problems can be reported at once.
//! - The backends stop at the first unrecoverable error and convert it into
//!   exactly one diagnostic at their entry point.
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] can only be obtained from a sink that holds at least
//! one error, so an `Err(ErrorGuaranteed)` always has a report behind it.
//!
//! ```text
//! let guarantee = diags.emit(diagnostic);
//! fn asr_to_cpp(..) -> Result<String, ErrorGuaranteed> { ... }
//! ```

mod diagnostic;
mod error_code;
mod guarantee;
mod sink;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use sink::Diagnostics;
