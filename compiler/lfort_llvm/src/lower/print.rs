//! `print` statements.
//!
//! Scalar items are batched into one `_lfortran_printf` call, separated by
//! single spaces and terminated by a newline. A list, dict, set or tuple
//! item flushes the pending batch and prints through its `print` helper.

use lfort_ir::{ExprId, Span};

use super::FnLowering;
use crate::containers::value_ops::{printf_arg, PrintStyle};
use crate::containers::HelperOp;
use crate::context::CodegenCx;
use crate::error::CodegenResult;

impl CodegenCx<'_> {
    pub(super) fn lower_print(&mut self, fx: &mut FnLowering, values: &[ExprId], span: Span) -> CodegenResult<()> {
        let mut format = String::new();
        let mut args = Vec::new();
        for (i, &item) in values.iter().enumerate() {
            if i > 0 {
                format.push(' ');
            }
            let ty = self.ty(item);
            if ty.is_container() {
                if !format.is_empty() {
                    self.printf(&mut fx.fb, &format, &args);
                    format.clear();
                    args.clear();
                }
                let addr = self.lower_addr(fx, item)?;
                let show = self.helper(ty, HelperOp::Print, span)?;
                show.call(&mut fx.fb, &[addr]);
                continue;
            }
            let value = self.lower_value(fx, item)?;
            let (directive, promoted) = printf_arg(self, &mut fx.fb, ty, value, PrintStyle::Statement, span)?;
            format.push_str(&directive);
            args.extend(promoted);
        }
        format.push('\n');
        self.printf(&mut fx.fb, &format, &args);
        Ok(())
    }
}
