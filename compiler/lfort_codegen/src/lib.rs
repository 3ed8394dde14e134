//! C++/Kokkos source backend.
//!
//! Lowers a verified [`TranslationUnit`] to a single C++ translation unit:
//! scalars map to builtin types, arrays to `Kokkos::View`s and
//! `do concurrent` to `Kokkos::parallel_for`. Expressions are printed with
//! the minimal set of parentheses that preserves the tree (see
//! [`precedence`]).
//!
//! Container expressions (lists, tuples, dicts, sets) have no C++ lowering
//! and are reported as not implemented.

// Kind-directed integer conversions mirror the source language's own
// fixed-width semantics.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
// Errors are documented on `CodegenError`, not on every emitter.
#![allow(clippy::missing_errors_doc)]

pub mod context;
pub mod error;
pub mod expr;
pub mod intrinsic;
pub mod precedence;
pub mod stmt;
pub mod types;
mod unit;

use lfort_diagnostic::{Diagnostics, ErrorGuaranteed};
use lfort_ir::TranslationUnit;
use tracing::debug;

pub use context::CodegenContext;
pub use error::{CodegenError, CodegenResult};

/// Knobs of the C++ backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CppOptions {
    /// Lower `do concurrent` to `Kokkos::parallel_for` and bracket the
    /// program with `Kokkos::initialize`/`Kokkos::finalize`. When off,
    /// parallel loops become plain counted loops.
    pub kokkos: bool,
}

impl Default for CppOptions {
    fn default() -> Self {
        CppOptions { kokkos: true }
    }
}

impl CppOptions {
    #[must_use]
    pub fn with_kokkos(mut self, kokkos: bool) -> Self {
        self.kokkos = kokkos;
        self
    }
}

/// Generate C++ source for `unit`.
///
/// On failure exactly one diagnostic describing the first error is pushed
/// to `diags` and no partial output is returned.
pub fn asr_to_cpp(
    unit: &TranslationUnit,
    options: &CppOptions,
    diags: &mut Diagnostics,
) -> Result<String, ErrorGuaranteed> {
    let mut ctx = CodegenContext::new(unit, options);
    match unit::lower_unit(&mut ctx) {
        Ok(source) => {
            debug!(bytes = source.len(), "generated C++ source");
            Ok(source)
        }
        Err(err) => Err(diags.emit(err.to_diagnostic())),
    }
}
