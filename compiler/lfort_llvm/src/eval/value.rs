//! Runtime values of the interpreter.

use std::fmt;

use crate::ir::{IrType, TypeTable};

/// A value held in an SSA register.
///
/// Integers are kept sign-extended from their width (`i1` as `0`/`1`);
/// `float` values are kept as the `f64` of their single-precision value.
#[derive(Clone, Debug, PartialEq)]
pub enum RtValue {
    Int(i64),
    Float(f64),
    Ptr(u64),
    Agg(Vec<RtValue>),
    Void,
}

impl RtValue {
    /// The zero of `ty`.
    pub fn zero(types: &TypeTable, ty: &IrType) -> RtValue {
        match ty {
            IrType::Void => RtValue::Void,
            IrType::Float | IrType::Double => RtValue::Float(0.0),
            IrType::Ptr => RtValue::Ptr(0),
            IrType::Array(n, el) => {
                let el = RtValue::zero(types, el);
                RtValue::Agg(vec![el; usize::try_from(*n).unwrap_or(0)])
            }
            IrType::Vector(n, el) => {
                let el = RtValue::zero(types, el);
                RtValue::Agg(vec![el; *n as usize])
            }
            IrType::Struct(_) | IrType::Named(_) => RtValue::Agg(
                types
                    .fields(ty)
                    .unwrap_or(&[])
                    .iter()
                    .map(|f| RtValue::zero(types, f))
                    .collect(),
            ),
            _ => RtValue::Int(0),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RtValue::Int(n) => Some(*n),
            RtValue::Ptr(p) => Some(*p as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            RtValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> Option<u64> {
        match self {
            RtValue::Ptr(p) => Some(*p),
            RtValue::Int(n) => Some(*n as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_int().map(|n| n != 0)
    }

    pub fn fields(&self) -> Option<&[RtValue]> {
        match self {
            RtValue::Agg(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for RtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtValue::Int(n) => write!(f, "{n}"),
            RtValue::Float(x) => write!(f, "{x}"),
            RtValue::Ptr(p) => write!(f, "{p:#x}"),
            RtValue::Agg(fields) => {
                f.write_str("{")?;
                for (i, v) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            RtValue::Void => f.write_str("void"),
        }
    }
}
