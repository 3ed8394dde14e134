//! Builders for the intrinsic elemental functions and type inquiries.
//!
//! Each builder checks its arguments against a fixed signature table,
//! derives the result type and folds calls whose arguments are all
//! compile-time constants. Argument errors go to the diagnostics sink and
//! the builder returns `None`; it never panics on bad input.
//!
//! [`verify_unit`] re-checks built nodes after later passes have run.

mod class;
mod create;
mod fold;
mod inquiry;
mod math;
mod partition;
mod runtime;
mod signature;
mod verify;

pub use class::TypeClass;
pub use create::create_intrinsic;
pub use fold::{fold, round_to_kind, wrap_to_kind, Const, FoldError};
pub use inquiry::{create_inquiry, inquiry_result_type, inquiry_value};
pub use math::{erf, erfc, gamma, log_gamma, Complex};
pub use partition::create_partition;
pub use runtime::runtime_function_name;
pub use signature::{signature, Family, ResultRule, Signature, Style};
pub use verify::{verify_intrinsic, verify_unit};
