//! Constants for `FunctionBuilder`.

use super::FunctionBuilder;
use crate::ir::types::{sign_extend, IrType};
use crate::ir::value::{ValueId, ValueKind};

impl FunctionBuilder {
    /// Integer constant of type `ty`. The value is kept sign-extended.
    pub fn const_int(&mut self, ty: IrType, value: i64) -> ValueId {
        if !ty.is_int() {
            tracing::error!(?ty, "const_int of non-integer type");
            self.record_codegen_error("const_int of non-integer type");
            return self.push_value(IrType::I64, ValueKind::ConstInt(value));
        }
        let value = sign_extend(value, ty.int_bits().unwrap_or(64));
        self.push_value(ty, ValueKind::ConstInt(value))
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.const_int(IrType::I1, i64::from(value))
    }

    pub fn const_i8(&mut self, value: i8) -> ValueId {
        self.const_int(IrType::I8, i64::from(value))
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.const_int(IrType::I32, i64::from(value))
    }

    pub fn const_i64(&mut self, value: i64) -> ValueId {
        self.const_int(IrType::I64, value)
    }

    /// Floating constant of type `ty`; `float` constants are rounded to
    /// single precision.
    pub fn const_float(&mut self, ty: IrType, value: f64) -> ValueId {
        match ty {
            IrType::Float => {
                let rounded = f64::from(value as f32);
                self.push_value(IrType::Float, ValueKind::ConstFloat(rounded))
            }
            IrType::Double => self.push_value(IrType::Double, ValueKind::ConstFloat(value)),
            other => {
                tracing::error!(ty = ?other, "const_float of non-float type");
                self.record_codegen_error("const_float of non-float type");
                self.push_value(IrType::Double, ValueKind::ConstFloat(value))
            }
        }
    }

    pub fn const_f64(&mut self, value: f64) -> ValueId {
        self.const_float(IrType::Double, value)
    }

    pub fn const_f32(&mut self, value: f32) -> ValueId {
        self.const_float(IrType::Float, f64::from(value))
    }

    pub fn const_null(&mut self) -> ValueId {
        self.push_value(IrType::Ptr, ValueKind::Null)
    }

    pub fn undef(&mut self, ty: IrType) -> ValueId {
        self.push_value(ty, ValueKind::Undef)
    }

    /// Zero of any type (`zeroinitializer` for aggregates).
    pub fn zero(&mut self, ty: IrType) -> ValueId {
        match ty {
            IrType::Ptr => self.const_null(),
            t if t.is_int() => self.const_int(t, 0),
            t if t.is_float() => self.const_float(t, 0.0),
            t => self.push_value(t, ValueKind::Zero),
        }
    }

    /// Address of the global `name`.
    pub fn global(&mut self, name: &str) -> ValueId {
        self.push_value(IrType::Ptr, ValueKind::Global(name.to_string()))
    }
}

