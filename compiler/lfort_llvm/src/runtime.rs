//! External functions generated code relies on.
//!
//! The C runtime provides these at link time; [`crate::eval::Machine`]
//! provides them in-process.

use crate::ir::{IrType, Module};

pub const PRINTF: &str = "_lfortran_printf";
/// `printf`-style write to standard error.
pub const PRINT_ERROR: &str = "_lcompilers_print_error";
pub const MALLOC: &str = "_lfortran_malloc";
pub const CALLOC: &str = "_lfortran_calloc";
pub const REALLOC: &str = "_lfortran_realloc";
pub const FREE: &str = "_lfortran_free";
pub const EXIT: &str = "exit";
pub const STRLEN: &str = "strlen";
pub const STRCMP: &str = "strcmp";
pub const STRSTR: &str = "strstr";
pub use crate::ir::builder::memory::MEMCPY;

/// Declare the allocation, output and string functions every module uses.
pub fn declare_core(module: &mut Module) {
    module.declare(PRINTF, IrType::Void, vec![IrType::Ptr], true);
    module.declare(PRINT_ERROR, IrType::Void, vec![IrType::Ptr], true);
    module.declare(MALLOC, IrType::Ptr, vec![IrType::I32], false);
    module.declare(CALLOC, IrType::Ptr, vec![IrType::I32, IrType::I32], false);
    module.declare(REALLOC, IrType::Ptr, vec![IrType::Ptr, IrType::I32], false);
    module.declare(FREE, IrType::Void, vec![IrType::Ptr], false);
    module.declare(EXIT, IrType::Void, vec![IrType::I32], false);
    module.declare(STRLEN, IrType::I64, vec![IrType::Ptr], false);
    module.declare(STRCMP, IrType::I32, vec![IrType::Ptr, IrType::Ptr], false);
    module.declare(STRSTR, IrType::Ptr, vec![IrType::Ptr, IrType::Ptr], false);
    module.declare(
        MEMCPY,
        IrType::Void,
        vec![IrType::Ptr, IrType::Ptr, IrType::I32, IrType::I1],
        false,
    );
}

/// Name of the LLVM intrinsic `base` specialised for `ty`, e.g.
/// `llvm.sqrt.f64` or `llvm.ctpop.i32`.
pub fn intrinsic_name(base: &str, ty: &IrType) -> String {
    let suffix = match ty {
        IrType::Float => "f32".to_string(),
        IrType::Double => "f64".to_string(),
        other => format!("i{}", other.int_bits().unwrap_or(32)),
    };
    format!("llvm.{base}.{suffix}")
}
