//! LLVM IR backend.
//!
//! Lowers a verified [`TranslationUnit`] to an in-memory IR [`Module`]
//! that prints as textual LLVM IR ([`Module::to_llvm_ir`]) and runs in the
//! [`eval::Machine`] evaluator.
//!
//! # Debug Environment Variables
//!
//! - `LFORT_DEBUG_LLVM`: print the generated module to stderr after
//!   lowering. Any non-empty value enables this.
//! - `RUST_LOG=lfort_llvm=debug`: per-module and per-procedure spans,
//!   container layouts as they are materialized.
//! - `RUST_LOG=lfort_llvm=trace`: every generated container helper.
//!
//! # Architecture
//!
//! - [`ir`]: types, values, the ID-based `FunctionBuilder`, the printer.
//! - `layout` and `abi`: semantic types to storage and boundary types.
//! - `containers`: list, dict, set and tuple runtime helpers, generated
//!   once per signature.
//! - `lower`: expression and statement visitor, unit driver.
//! - [`eval`]: IR evaluator with the runtime shims tests need.
//! - [`line_table`]: address-to-line lookup for runtime backtraces.

// Kind-directed integer conversions and IR index widths are fixed by the
// source language and by LLVM.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
// Visitor helpers thread the session, the function state and the node.
#![allow(clippy::too_many_arguments)]
// Errors are documented on `CodegenError`, not on every visitor method.
#![allow(clippy::missing_errors_doc)]

mod abi;
mod containers;
pub mod context;
pub mod error;
pub mod eval;
pub mod ir;
pub mod layout;
pub mod line_table;
mod lower;
pub mod options;
pub mod runtime;

use std::sync::Once;

use lfort_diagnostic::{Diagnostics, ErrorGuaranteed};
use lfort_ir::TranslationUnit;
use tracing::debug;

pub use context::CodegenCx;
pub use error::{CodegenError, CodegenResult};
pub use eval::{Machine, RunOutcome, Trap};
pub use ir::Module;
pub use line_table::LineTable;
pub use options::{HashStrategy, LoweringOptions, Platform};

static TRACING_INIT: Once = Once::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG`. Does nothing when
/// `RUST_LOG` is unset; safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Generate an IR module for `unit`.
///
/// On failure exactly one diagnostic describing the first error is pushed
/// to `diags` and no module is returned.
pub fn asr_to_llvm(
    unit: &TranslationUnit,
    options: &LoweringOptions,
    diags: &mut Diagnostics,
) -> Result<Module, ErrorGuaranteed> {
    let mut cx = CodegenCx::new(unit, options);
    if let Err(err) = lower::unit::lower_unit(&mut cx) {
        return Err(diags.emit(err.to_diagnostic()));
    }
    let helpers = cx.generated_helpers().len();
    let module = cx.into_module();
    debug!(
        functions = module.functions().len(),
        helpers,
        globals = module.globals().len(),
        "generated LLVM module"
    );
    if std::env::var("LFORT_DEBUG_LLVM").is_ok_and(|v| !v.is_empty()) {
        eprintln!("{}", module.to_llvm_ir());
    }
    Ok(module)
}
