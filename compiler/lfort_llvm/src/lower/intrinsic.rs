//! Elemental intrinsic functions.
//!
//! Rounding, absolute values and bit counts map onto LLVM intrinsics; the
//! remaining integer and real arithmetic is expanded inline. Transcendental
//! functions call the `_lfortran_*` runtime, with complex arguments and
//! results following the C ABI policy of the target platform.

use lfort_intrinsics::{fold, runtime_function_name};
use lfort_ir::{ExprId, IntrinsicId, Span, Ty};

use super::expr::parts;
use super::FnLowering;
use crate::abi::{complex_argument, complex_return, complex_type, ComplexAbi};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FloatPredicate, IrType, ValueId};
use crate::runtime;

impl CodegenCx<'_> {
    pub(super) fn lower_intrinsic(
        &mut self,
        fx: &mut FnLowering,
        id: IntrinsicId,
        args: &[ExprId],
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        use IntrinsicId as I;

        let Some(&first) = args.first() else {
            return Err(CodegenError::internal(format!("`{}` without arguments", id.name())));
        };
        let arg_ty = self.ty(first);
        if matches!(id, I::Digits | I::MinExponent | I::MaxExponent) {
            let value = fold(id, &[], arg_ty, ty).ok().flatten().ok_or_else(|| {
                CodegenError::unsupported(
                    format!("`{}` of {}", id.name(), arg_ty.type_code(&self.unit.symbols)),
                    span,
                )
            })?;
            return self.lower_const(fx, &value, ty, span);
        }

        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            values.push(self.lower_value(fx, arg)?);
        }
        let result = self.storage_type(ty, span)?;
        let operand = self.storage_type(arg_ty, span)?;
        let x = values[0];
        let y = values.get(1).copied();
        let second = |what: &str| {
            y.ok_or_else(|| CodegenError::internal(format!("`{what}` needs two arguments")))
        };

        Ok(match (id, arg_ty.strip()) {
            (I::Sqrt, Ty::Real { .. }) => self.llvm_call(fx, "sqrt", &operand, &[x]),
            (I::Trunc | I::Aint, Ty::Real { .. }) => self.llvm_call(fx, "trunc", &operand, &[x]),
            (I::Anint, Ty::Real { .. }) => self.llvm_call(fx, "round", &operand, &[x]),
            (I::Floor | I::Ceiling | I::Nint, Ty::Real { .. }) => {
                let base = match id {
                    I::Floor => "floor",
                    I::Ceiling => "ceil",
                    _ => "round",
                };
                let r = self.llvm_call(fx, base, &operand, &[x]);
                fx.fb.fp_to_si(r, result)
            }
            (I::Ifix | I::Idint, Ty::Real { .. }) => fx.fb.fp_to_si(x, result),
            (I::Sngl, Ty::Real { .. }) => fx.fb.float_cast(x, result),
            (I::Dprod, Ty::Real { .. }) => {
                let b = second("dprod")?;
                let a = fx.fb.float_cast(x, result.clone());
                let b = fx.fb.float_cast(b, result);
                fx.fb.fmul(a, b)
            }

            (I::Abs, Ty::Integer { .. }) => {
                let zero = fx.fb.zero(operand);
                let negative = fx.fb.icmp_slt(x, zero);
                let flipped = fx.fb.neg(x);
                fx.fb.select(negative, flipped, x)
            }
            (I::Abs, Ty::UnsignedInteger { .. }) => x,
            (I::Abs, Ty::Real { .. }) => self.llvm_call(fx, "fabs", &operand, &[x]),
            (I::Abs, Ty::Complex { .. }) => {
                let (re, im) = parts(&mut fx.fb, x);
                let sum = squares(fx, re, im);
                self.llvm_call(fx, "sqrt", &result, &[sum])
            }
            (I::Aimag, Ty::Complex { .. }) => fx.fb.extract_value(x, 1),
            (I::Conjg, Ty::Complex { .. }) => {
                let (re, im) = parts(&mut fx.fb, x);
                let im = fx.fb.fneg(im);
                fx.fb.build_struct(&[re, im])
            }
            (I::Hypot, Ty::Real { .. }) => {
                let b = second("hypot")?;
                let sum = squares(fx, x, b);
                self.llvm_call(fx, "sqrt", &operand, &[sum])
            }
            (I::Fma, Ty::Real { .. }) => {
                let (Some(&b), Some(&c)) = (values.get(1), values.get(2)) else {
                    return Err(CodegenError::internal("`fma` needs three arguments"));
                };
                let ab = fx.fb.fmul(x, b);
                fx.fb.fadd(ab, c)
            }

            (I::Mod, Ty::Integer { .. }) => fx.fb.srem(x, second("mod")?),
            (I::Mod, Ty::Real { .. }) => fx.fb.frem(x, second("mod")?),
            (I::Modulo, Ty::Integer { .. } | Ty::Real { .. }) => {
                let b = second("modulo")?;
                let real = arg_ty.is_real();
                let fb = &mut fx.fb;
                let r = if real { fb.frem(x, b) } else { fb.srem(x, b) };
                let zero = fb.zero(operand);
                let (nonzero, r_neg, b_neg) = if real {
                    (
                        fb.fcmp(FloatPredicate::Une, r, zero),
                        fb.fcmp(FloatPredicate::Olt, r, zero),
                        fb.fcmp(FloatPredicate::Olt, b, zero),
                    )
                } else {
                    (fb.icmp_ne(r, zero), fb.icmp_slt(r, zero), fb.icmp_slt(b, zero))
                };
                let opposite = fb.xor(r_neg, b_neg);
                let fix = fb.and(nonzero, opposite);
                let shifted = if real { fb.fadd(r, b) } else { fb.add(r, b) };
                fb.select(fix, shifted, r)
            }
            (I::Sign, Ty::Integer { .. }) => {
                let b = second("sign")?;
                let fb = &mut fx.fb;
                let zero = fb.zero(operand);
                let negative = fb.icmp_slt(x, zero);
                let flipped = fb.neg(x);
                let magnitude = fb.select(negative, flipped, x);
                let minus = fb.neg(magnitude);
                let keep = fb.icmp_sge(b, zero);
                fb.select(keep, magnitude, minus)
            }
            (I::Sign, Ty::Real { .. }) => {
                let b = second("sign")?;
                let magnitude = self.llvm_call(fx, "fabs", &operand, &[x]);
                let fb = &mut fx.fb;
                let zero = fb.zero(operand);
                let minus = fb.fneg(magnitude);
                let negative = fb.fcmp(FloatPredicate::Olt, b, zero);
                fb.select(negative, minus, magnitude)
            }
            (I::Dim, Ty::Integer { .. } | Ty::Real { .. }) => {
                let b = second("dim")?;
                let real = arg_ty.is_real();
                let fb = &mut fx.fb;
                let d = if real { fb.fsub(x, b) } else { fb.sub(x, b) };
                let zero = fb.zero(operand);
                let positive = if real {
                    fb.fcmp(FloatPredicate::Ogt, d, zero)
                } else {
                    fb.icmp_sgt(d, zero)
                };
                fb.select(positive, d, zero)
            }
            (I::FloorDiv, Ty::Integer { .. }) => {
                let b = second("floordiv")?;
                let fb = &mut fx.fb;
                let q = fb.sdiv(x, b);
                let r = fb.srem(x, b);
                let zero = fb.zero(operand);
                let inexact = fb.icmp_ne(r, zero);
                let (a_neg, b_neg) = (fb.icmp_slt(x, zero), fb.icmp_slt(b, zero));
                let opposite = fb.xor(a_neg, b_neg);
                let adjust = fb.and(inexact, opposite);
                let lower = fb.add_const(q, -1);
                fb.select(adjust, lower, q)
            }
            (I::FloorDiv, Ty::Real { .. }) => {
                let q = fx.fb.fdiv(x, second("floordiv")?);
                self.llvm_call(fx, "floor", &operand, &[q])
            }
            (I::FloorDiv, Ty::Logical { .. }) => x,
            (I::Max | I::Min, _) => self.extremum(fx, id == I::Max, &values, arg_ty, span)?,

            (I::Iand, Ty::Integer { .. }) => fx.fb.and(x, second("iand")?),
            (I::Ior, Ty::Integer { .. }) => fx.fb.or(x, second("ior")?),
            (I::Ieor, Ty::Integer { .. }) => fx.fb.xor(x, second("ieor")?),
            (I::Not, Ty::Integer { .. }) => fx.fb.not(x),
            (I::Ibclr | I::Ibset | I::Btest, Ty::Integer { .. }) => {
                let pos = second(id.name())?;
                let fb = &mut fx.fb;
                let pos = fb.int_cast(pos, operand.clone(), true);
                let one = fb.const_int(operand.clone(), 1);
                let mask = fb.shl(one, pos);
                match id {
                    I::Ibclr => {
                        let keep = fb.not(mask);
                        fb.and(x, keep)
                    }
                    I::Ibset => fb.or(x, mask),
                    _ => {
                        let bit = fb.and(x, mask);
                        let zero = fb.zero(operand);
                        fb.icmp_ne(bit, zero)
                    }
                }
            }
            (I::Ishft | I::Shiftl | I::Shiftr, Ty::Integer { .. }) => {
                let by = second(id.name())?;
                let bits = i64::from(operand.int_bits().unwrap_or(32));
                let fb = &mut fx.fb;
                let by = fb.int_cast(by, operand.clone(), true);
                let zero = fb.zero(operand.clone());
                let width = fb.const_int(operand, bits);
                match id {
                    I::Shiftl => {
                        let shifted = fb.shl(x, by);
                        let wide = fb.icmp_sge(by, width);
                        fb.select(wide, zero, shifted)
                    }
                    I::Shiftr => {
                        let shifted = fb.lshr(x, by);
                        let wide = fb.icmp_sge(by, width);
                        fb.select(wide, zero, shifted)
                    }
                    _ => {
                        let left = fb.icmp_sgt(by, zero);
                        let back = fb.neg(by);
                        let amount = fb.select(left, by, back);
                        let shl = fb.shl(x, amount);
                        let lshr = fb.lshr(x, amount);
                        let shifted = fb.select(left, shl, lshr);
                        let wide = fb.icmp_sge(amount, width);
                        fb.select(wide, zero, shifted)
                    }
                }
            }
            (I::Trailz | I::Leadz, Ty::Integer { .. }) => {
                let base = if id == I::Trailz { "cttz" } else { "ctlz" };
                let poison_on_zero = fx.fb.const_bool(false);
                let n = self.llvm_call(fx, base, &operand, &[x, poison_on_zero]);
                fx.fb.int_cast(n, result, true)
            }
            (I::Popcnt | I::Poppar, Ty::Integer { .. }) => {
                let mut n = self.llvm_call(fx, "ctpop", &operand, &[x]);
                if id == I::Poppar {
                    let one = fx.fb.const_int(operand, 1);
                    n = fx.fb.and(n, one);
                }
                fx.fb.int_cast(n, result, true)
            }

            _ => match runtime_function_name(id, arg_ty) {
                Some(name) => self.call_math_runtime(fx, &name, &values, arg_ty, &result),
                None => {
                    return Err(CodegenError::not_implemented(
                        format!(
                            "intrinsic `{}` on {}",
                            id.name(),
                            arg_ty.type_code(&self.unit.symbols)
                        ),
                        span,
                    ))
                }
            },
        })
    }

    /// Call the LLVM intrinsic `base` specialised for `ty`, declaring it
    /// on first use.
    fn llvm_call(&mut self, fx: &mut FnLowering, base: &str, ty: &IrType, args: &[ValueId]) -> ValueId {
        let name = runtime::intrinsic_name(base, ty);
        let params = args.iter().map(|&a| fx.fb.type_of(a).clone()).collect();
        self.module.declare(&name, ty.clone(), params, false);
        fx.fb.call(&name, ty.clone(), args)
    }

    /// `max`/`min` as a chain of selects, first occurrence winning ties.
    fn extremum(
        &mut self,
        fx: &mut FnLowering,
        max: bool,
        values: &[ValueId],
        ty: &Ty,
        span: Span,
    ) -> CodegenResult<ValueId> {
        let mut best = values[0];
        for &v in &values[1..] {
            let fb = &mut fx.fb;
            let better = match ty.strip() {
                Ty::Integer { .. } if max => fb.icmp_sgt(v, best),
                Ty::Integer { .. } => fb.icmp_slt(v, best),
                Ty::Real { .. } if max => fb.fcmp(FloatPredicate::Ogt, v, best),
                Ty::Real { .. } => fb.fcmp(FloatPredicate::Olt, v, best),
                Ty::Character { .. } => {
                    let ord = fb.call(runtime::STRCMP, IrType::I32, &[v, best]);
                    let zero = fb.const_i32(0);
                    if max {
                        fb.icmp_sgt(ord, zero)
                    } else {
                        fb.icmp_slt(ord, zero)
                    }
                }
                other => {
                    return Err(CodegenError::unsupported(
                        format!("max/min of {}", other.type_code(&self.unit.symbols)),
                        span,
                    ))
                }
            };
            best = fb.select(better, v, best);
        }
        Ok(best)
    }

    /// Call a `_lfortran_*` math routine. Complex values cross the call in
    /// the shapes the platform C ABI gives them.
    fn call_math_runtime(
        &mut self,
        fx: &mut FnLowering,
        name: &str,
        values: &[ValueId],
        arg_ty: &Ty,
        result: &IrType,
    ) -> ValueId {
        let Ty::Complex { kind } = arg_ty.element() else {
            let params = values.iter().map(|&v| fx.fb.type_of(v).clone()).collect();
            self.module.declare(name, result.clone(), params, false);
            return fx.fb.call(name, result.clone(), values);
        };
        let platform = self.options.platform;
        let storage = complex_type(*kind);
        let returns = complex_return(platform, *kind);
        let fb = &mut fx.fb;

        let mut args = Vec::with_capacity(values.len() + 1);
        let sret = (returns == ComplexAbi::SRet).then(|| {
            let slot = fb.alloca(storage.clone());
            args.push(slot);
            slot
        });
        for &v in values {
            args.push(match complex_argument(platform, *kind) {
                ComplexAbi::ByReference => fb.alloca_init(v),
                ComplexAbi::Coerced(shape) => {
                    let tmp = fb.alloca_init(v);
                    fb.load(shape, tmp)
                }
                ComplexAbi::Native | ComplexAbi::SRet => v,
            });
        }
        let ret = returns.boundary_type(&storage).unwrap_or(IrType::Void);
        let params = args.iter().map(|&a| fb.type_of(a).clone()).collect();
        self.module.declare(name, ret.clone(), params, false);
        let r = fb.call(name, ret, &args);
        match (sret, returns) {
            (Some(slot), _) => fb.load(storage, slot),
            (None, ComplexAbi::Coerced(_)) => {
                let tmp = fb.alloca_init(r);
                fb.load(storage, tmp)
            }
            _ => r,
        }
    }
}

/// `a * a + b * b`.
fn squares(fx: &mut FnLowering, a: ValueId, b: ValueId) -> ValueId {
    let aa = fx.fb.fmul(a, a);
    let bb = fx.fb.fmul(b, b);
    fx.fb.fadd(aa, bb)
}
