//! Procedure signatures and call lowering.
//!
//! Dummy arguments travel by reference unless declared `value`. Only
//! `bind(c)` procedures deviate from the native layout, and only for
//! complex values, following [`crate::abi`]. A value whose boundary type
//! differs from its storage type is reinterpreted through memory on both
//! sides of the call.

use lfort_ir::{Abi, ExprId, Span, SymbolId, Ty};

use super::FnLowering;
use crate::abi::{complex_return, ComplexAbi};
use crate::context::CodegenCx;
use crate::error::CodegenResult;
use crate::ir::{IrType, ValueId};
use crate::layout::{TypeLayout, UseSite};

/// How a procedure returns its result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReturnAbi {
    Void,
    /// In the return slot as `boundary`, read back as `storage`.
    Direct { storage: IrType, boundary: IrType },
    /// Through a hidden leading pointer; the call returns `void`.
    Indirect { storage: IrType },
}

/// Lowered signature of one procedure.
#[derive(Clone, Debug)]
pub(crate) struct FnAbi {
    pub name: String,
    pub params: Vec<TypeLayout>,
    pub ret: ReturnAbi,
}

impl FnAbi {
    /// IR parameter list, hidden result pointer first.
    pub(crate) fn ir_params(&self) -> Vec<IrType> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        if self.has_sret() {
            params.push(IrType::Ptr);
        }
        params.extend(self.params.iter().map(|p| p.ty.clone()));
        params
    }

    pub(crate) fn ir_ret(&self) -> IrType {
        match &self.ret {
            ReturnAbi::Direct { boundary, .. } => boundary.clone(),
            ReturnAbi::Void | ReturnAbi::Indirect { .. } => IrType::Void,
        }
    }

    pub(crate) fn has_sret(&self) -> bool {
        matches!(self.ret, ReturnAbi::Indirect { .. })
    }
}

/// IR name of a procedure. `main` belongs to the program entry point.
fn procedure_name(name: &str) -> String {
    if name == "main" {
        "main.proc".to_string()
    } else {
        name.to_string()
    }
}

impl CodegenCx<'_> {
    /// Signature of the procedure `sym`, computed once per session.
    pub(crate) fn fn_abi(&mut self, sym: SymbolId, span: Span) -> CodegenResult<FnAbi> {
        if let Some(abi) = self.cached_abi(sym) {
            return Ok(abi.clone());
        }
        let f = self.function(sym)?;
        let mut params = Vec::with_capacity(f.args.len());
        for &arg in &f.args {
            let var = self.variable(arg)?;
            let site = UseSite::Argument {
                by_value: var.by_value,
            };
            params.push(self.type_layout(&var.ty, f.abi, site, span)?);
        }
        let ret = match f.return_var {
            None => ReturnAbi::Void,
            Some(r) => {
                let ty = &self.variable(r)?.ty;
                let storage = self.storage_type(ty, span)?;
                match (ty.strip(), f.abi) {
                    (Ty::Complex { kind }, Abi::BindC) => {
                        match complex_return(self.options.platform, *kind) {
                            ComplexAbi::SRet => ReturnAbi::Indirect { storage },
                            policy => ReturnAbi::Direct {
                                boundary: policy.boundary_type(&storage).unwrap_or_else(|| storage.clone()),
                                storage,
                            },
                        }
                    }
                    _ => ReturnAbi::Direct {
                        boundary: storage.clone(),
                        storage,
                    },
                }
            }
        };
        let abi = FnAbi {
            name: procedure_name(&f.name),
            params,
            ret,
        };
        self.cache_abi(sym, abi.clone());
        Ok(abi)
    }

    /// Call `sym` with `args`; `None` for a subroutine.
    pub(crate) fn lower_call(
        &mut self,
        fx: &mut FnLowering,
        sym: SymbolId,
        args: &[Option<ExprId>],
        span: Span,
    ) -> CodegenResult<Option<ValueId>> {
        let abi = self.fn_abi(sym, span)?;
        if !self.module.has_function(&abi.name) {
            self.module
                .declare(&abi.name, abi.ir_ret(), abi.ir_params(), false);
        }

        let mut values = Vec::with_capacity(abi.params.len() + 1);
        let sret = match &abi.ret {
            ReturnAbi::Indirect { storage } => {
                let slot = fx.fb.alloca(storage.clone());
                values.push(slot);
                Some(slot)
            }
            _ => None,
        };
        for (i, layout) in abi.params.iter().enumerate() {
            let value = match args.get(i).copied().flatten() {
                // Omitted optional argument.
                None => fx.fb.zero(layout.ty.clone()),
                Some(arg) if layout.by_reference => self.lower_addr(fx, arg)?,
                Some(arg) if layout.ty != layout.storage => {
                    let v = self.lower_value(fx, arg)?;
                    let tmp = fx.fb.alloca_init(v);
                    fx.fb.load(layout.ty.clone(), tmp)
                }
                Some(arg) => self.lower_value(fx, arg)?,
            };
            values.push(value);
        }

        let result = fx.fb.call(&abi.name, abi.ir_ret(), &values);
        Ok(match abi.ret {
            ReturnAbi::Void => None,
            ReturnAbi::Direct { storage, boundary } if storage == boundary => Some(result),
            ReturnAbi::Direct { storage, .. } => {
                let tmp = fx.fb.alloca_init(result);
                Some(fx.fb.load(storage, tmp))
            }
            ReturnAbi::Indirect { storage } => sret.map(|slot| fx.fb.load(storage, slot)),
        })
    }
}
