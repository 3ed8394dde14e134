//! Translation-unit driver.
//!
//! Program, module and `save` variables become module globals named
//! `<owner>.<variable>`. Procedures are emitted in a fixed order
//! (intrinsic modules in build order, free procedures, remaining modules
//! in build order, procedures contained in the program) and the program
//! body becomes `i32 main()`, which first gives every global that needs
//! one its initial value.

use tracing::{debug, instrument};

use lfort_ir::{
    ArrayPhysicalType, DefType, ExprKind, ScopeId, Span, Storage, Symbol, SymbolId, Ty,
};

use super::call::ReturnAbi;
use super::FnLowering;
use crate::containers::{move_bytes, HelperOp};
use crate::context::CodegenCx;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{FunctionBuilder, Global, GlobalInit, IrType, Linkage, ValueId};
use crate::layout::{DESC_ALLOCATED, DESC_DATA, DESC_DIMS, DESC_OFFSET, DIM_LENGTH, DIM_LOWER, DIM_STRIDE};
use crate::runtime;

/// A global that `main` initialises before the program body runs.
struct PendingInit {
    sym: SymbolId,
    name: String,
}

/// Lower the whole unit held by `cx` into `cx.module`.
#[instrument(level = "debug", skip_all, fields(items = cx.unit.items().len()))]
pub(crate) fn lower_unit(cx: &mut CodegenCx<'_>) -> CodegenResult<()> {
    let unit = cx.unit;
    let order = unit.module_build_order()?;
    let pending = define_globals(cx)?;

    let (intrinsic, user): (Vec<SymbolId>, Vec<SymbolId>) = order
        .into_iter()
        .partition(|id| unit.symbols.module(*id).is_some_and(|m| m.intrinsic));
    for module in intrinsic {
        lower_module(cx, module)?;
    }
    for &item in unit.items() {
        if unit.symbols.function(item).is_some() {
            lower_procedure(cx, item)?;
        }
    }
    for module in user {
        lower_module(cx, module)?;
    }
    for &item in unit.items() {
        if let Symbol::Program(program) = unit.symbols.get(item) {
            for sym in procedures_in(cx, program.scope) {
                lower_procedure(cx, sym)?;
            }
            lower_program(cx, item, &pending)?;
        }
    }

    let errors = cx.codegen_error_count();
    if errors > 0 {
        return Err(CodegenError::internal(format!(
            "{errors} malformed instruction(s) generated"
        )));
    }
    Ok(())
}

/// Procedures declared directly in `scope`, in declaration order.
fn procedures_in(cx: &CodegenCx<'_>, scope: ScopeId) -> Vec<SymbolId> {
    cx.unit
        .symbols
        .scope(scope)
        .symbols()
        .iter()
        .copied()
        .filter(|s| cx.unit.symbols.function(*s).is_some())
        .collect()
}

/// Variables declared directly in `scope` that live for the whole run.
fn static_variables(cx: &CodegenCx<'_>, scope: ScopeId, all: bool) -> Vec<SymbolId> {
    cx.unit
        .symbols
        .scope(scope)
        .symbols()
        .iter()
        .copied()
        .filter(|s| {
            cx.unit
                .symbols
                .variable(*s)
                .is_some_and(|v| all || v.storage == Storage::Save)
        })
        .collect()
}

fn define_globals(cx: &mut CodegenCx<'_>) -> CodegenResult<Vec<PendingInit>> {
    let unit = cx.unit;
    let mut pending = Vec::new();
    for &item in unit.items() {
        match unit.symbols.get(item) {
            Symbol::Module(m) => {
                for var in static_variables(cx, m.scope, true) {
                    define_global(cx, &m.name, var, Linkage::External, &mut pending)?;
                }
                for f in procedures_in(cx, m.scope) {
                    define_saved(cx, f, &mut pending)?;
                }
            }
            Symbol::Program(p) => {
                for var in static_variables(cx, p.scope, true) {
                    define_global(cx, &p.name, var, Linkage::Internal, &mut pending)?;
                }
                for f in procedures_in(cx, p.scope) {
                    define_saved(cx, f, &mut pending)?;
                }
            }
            Symbol::Function(_) => define_saved(cx, item, &mut pending)?,
            _ => {}
        }
    }
    Ok(pending)
}

/// Globals for the `save` variables of `f` and of the procedures it
/// contains.
fn define_saved(cx: &mut CodegenCx<'_>, f: SymbolId, pending: &mut Vec<PendingInit>) -> CodegenResult<()> {
    let function = cx.function(f)?;
    for var in static_variables(cx, function.scope, false) {
        define_global(cx, &function.name, var, Linkage::Internal, pending)?;
    }
    for inner in procedures_in(cx, function.scope) {
        define_saved(cx, inner, pending)?;
    }
    Ok(())
}

fn define_global(
    cx: &mut CodegenCx<'_>,
    owner: &str,
    sym: SymbolId,
    linkage: Linkage,
    pending: &mut Vec<PendingInit>,
) -> CodegenResult<()> {
    let var = cx.variable(sym)?;
    let span = Span::DUMMY;
    let ty = cx.storage_type(&var.ty, span)?;
    let name = format!("{owner}.{}", var.name);
    let init = static_init(cx, sym, &ty);
    if init.is_none() {
        pending.push(PendingInit {
            sym,
            name: name.clone(),
        });
    }
    cx.module.add_global(Global {
        name: name.clone(),
        ty,
        init: init.unwrap_or(GlobalInit::Zero),
        constant: false,
        linkage,
    });
    cx.set_global_name(sym, name);
    Ok(())
}

/// Initial contents of a scalar global known at compile time. `None` when
/// `main` has to set it up.
fn static_init(cx: &CodegenCx<'_>, sym: SymbolId, ty: &IrType) -> Option<GlobalInit> {
    let var = cx.unit.symbols.variable(sym)?;
    let Some(init) = var.init.or(var.value) else {
        return if needs_setup(&var.ty) { None } else { Some(GlobalInit::Zero) };
    };
    let exprs = &cx.unit.exprs;
    match exprs.constant(init).map(|e| &e.kind) {
        Some(ExprKind::LogicalConstant(b)) if *ty == IrType::I1 => Some(GlobalInit::Int(i64::from(*b))),
        _ if ty.is_int() => exprs.int_constant(init).map(GlobalInit::Int),
        _ if ty.is_float() => exprs.real_constant(init).map(GlobalInit::Float),
        _ => None,
    }
}

/// Types whose zero bit pattern is not a valid empty value.
fn needs_setup(ty: &Ty) -> bool {
    match ty {
        Ty::Character { .. } | Ty::List(_) | Ty::Dict(..) | Ty::Set(_) | Ty::Tuple(_) | Ty::Struct(_) => true,
        Ty::Array(arr) => arr.physical == ArrayPhysicalType::DescriptorArray,
        _ => false,
    }
}

#[instrument(level = "debug", skip_all, fields(name = cx.name(id)))]
fn lower_module(cx: &mut CodegenCx<'_>, id: SymbolId) -> CodegenResult<()> {
    let unit = cx.unit;
    let Some(module) = unit.symbols.module(id) else {
        return Ok(());
    };
    for sym in procedures_in(cx, module.scope) {
        lower_procedure(cx, sym)?;
    }
    Ok(())
}

/// Emit `id` (and the procedures it contains). An interface only gets a
/// declaration.
#[instrument(level = "debug", skip_all, fields(name = cx.name(id)))]
fn lower_procedure(cx: &mut CodegenCx<'_>, id: SymbolId) -> CodegenResult<()> {
    let unit = cx.unit;
    let f = cx.function(id)?;
    let span = Span::DUMMY;
    let abi = cx.fn_abi(id, span)?;
    if f.deftype == DefType::Interface {
        cx.module.declare(&abi.name, abi.ir_ret(), abi.ir_params(), false);
        return Ok(());
    }
    for inner in procedures_in(cx, f.scope) {
        lower_procedure(cx, inner)?;
    }

    let fb = FunctionBuilder::new(abi.name.clone(), abi.ir_params(), abi.ir_ret());
    let mut fx = FnLowering::new(fb);
    let first = usize::from(abi.has_sret());
    for (i, (&arg, layout)) in f.args.iter().zip(&abi.params).enumerate() {
        let param = fx.fb.param(first + i);
        let slot = if layout.by_reference {
            param
        } else if layout.ty == layout.storage {
            fx.fb.alloca_init(param)
        } else {
            // Coerced complex: same bytes, different IR type.
            let slot = fx.fb.alloca(layout.storage.clone());
            fx.fb.store(param, slot);
            slot
        };
        fx.bind(arg, slot);
    }

    for &sym in unit.symbols.scope(f.scope).symbols() {
        let Some(var) = unit.symbols.variable(sym) else {
            continue;
        };
        if var.intent.is_argument() || var.storage == Storage::Save {
            continue;
        }
        let slot = cx.temporary(&mut fx, &var.ty, span)?;
        fx.bind(sym, slot);
        cx.init_storage(&mut fx.fb, &var.ty, slot, span)?;
        if let Some(init) = var.init.or(var.value) {
            cx.assign_to(&mut fx, &var.ty, slot, init, span)?;
        }
    }

    cx.lower_body(&mut fx, &f.body)?;
    fx.fb.br_if_open(fx.epilogue);
    fx.fb.position_at_end(fx.epilogue);
    match &abi.ret {
        ReturnAbi::Void => fx.fb.ret_void(),
        ReturnAbi::Direct { boundary, .. } => {
            let slot = return_slot(&fx, f.return_var)?;
            let v = fx.fb.load(boundary.clone(), slot);
            fx.fb.ret(v);
        }
        ReturnAbi::Indirect { storage } => {
            let slot = return_slot(&fx, f.return_var)?;
            let size = cx.module.types.size_of(storage);
            let out = fx.fb.param(0);
            move_bytes(&mut fx.fb, out, slot, size);
            fx.fb.ret_void();
        }
    }
    debug!(name = %abi.name, "lowered procedure");
    cx.finish_function(fx.fb);
    Ok(())
}

fn return_slot(fx: &FnLowering, var: Option<SymbolId>) -> CodegenResult<ValueId> {
    var.and_then(|v| fx.slot(v))
        .ok_or_else(|| CodegenError::internal("function without a return variable slot"))
}

#[instrument(level = "debug", skip_all, fields(name = cx.name(id)))]
fn lower_program(cx: &mut CodegenCx<'_>, id: SymbolId, pending: &[PendingInit]) -> CodegenResult<()> {
    let unit = cx.unit;
    let Symbol::Program(program) = unit.symbols.get(id) else {
        return Err(CodegenError::internal("program symbol expected"));
    };
    let span = Span::DUMMY;
    let fb = FunctionBuilder::new("main", Vec::new(), IrType::I32);
    let mut fx = FnLowering::new(fb);

    for global in pending {
        let var = cx.variable(global.sym)?;
        let slot = fx.fb.global(&global.name);
        cx.init_storage(&mut fx.fb, &var.ty, slot, span)?;
        if let Some(init) = var.init.or(var.value) {
            cx.assign_to(&mut fx, &var.ty, slot, init, span)?;
        }
    }

    cx.lower_body(&mut fx, &program.body)?;
    fx.fb.br_if_open(fx.epilogue);
    fx.fb.position_at_end(fx.epilogue);
    let zero = fx.fb.const_i32(0);
    fx.fb.ret(zero);
    cx.finish_function(fx.fb);
    Ok(())
}

impl CodegenCx<'_> {
    /// Give the storage of type `ty` at `slot` its empty value: `""` for
    /// strings, empty containers, recursively set up tuples and derived
    /// types, allocated descriptors for arrays with constant bounds, zero
    /// otherwise.
    pub(crate) fn init_storage(
        &mut self,
        fb: &mut FunctionBuilder,
        ty: &Ty,
        slot: ValueId,
        span: Span,
    ) -> CodegenResult<()> {
        match ty {
            Ty::Character { .. } => {
                let empty = self.module.string_constant("");
                let empty = fb.global(&empty);
                let dup = self.helper(&Ty::string(), HelperOp::Dup, span)?;
                let copy = dup.call(fb, &[empty]);
                fb.store(copy, slot);
            }
            Ty::List(_) | Ty::Dict(..) | Ty::Set(_) => {
                let capacity = if matches!(ty, Ty::List(_)) {
                    self.options.initial_list_capacity
                } else {
                    self.options.initial_hash_capacity
                };
                let init = self.helper(ty, HelperOp::Init, span)?;
                let capacity = fb.const_i32(capacity);
                init.call(fb, &[slot, capacity]);
            }
            Ty::Tuple(elements) => {
                let storage = self.storage_type(ty, span)?;
                for (i, el) in elements.iter().enumerate() {
                    let field = fb.struct_gep(&storage, slot, u32::try_from(i).unwrap_or(u32::MAX));
                    self.init_storage(fb, el, field, span)?;
                }
            }
            Ty::Struct(id) => {
                let layout = self.struct_layout(*id, span)?;
                let zero = fb.zero(layout.ty.clone());
                fb.store(zero, slot);
                self.init_members(fb, *id, slot, span)?;
            }
            Ty::Array(arr) if arr.physical == ArrayPhysicalType::DescriptorArray => {
                let storage = self.storage_type(ty, span)?;
                let zero = fb.zero(storage);
                fb.store(zero, slot);
                if let Some(bounds) = self.constant_bounds(arr) {
                    let element = self.storage_type(&arr.element, span)?;
                    let element_size = self.module.types.size_of(&element);
                    self.allocate_descriptor(fb, arr.rank(), &bounds, element_size, slot);
                }
            }
            _ => {
                let storage = self.storage_type(ty, span)?;
                let zero = fb.zero(storage);
                fb.store(zero, slot);
            }
        }
        Ok(())
    }

    /// Members of the derived type `id` (parent part first) that need more
    /// than zeroing.
    fn init_members(&mut self, fb: &mut FunctionBuilder, id: SymbolId, slot: ValueId, span: Span) -> CodegenResult<()> {
        let layout = self.struct_layout(id, span)?;
        if layout.kind == lfort_ir::StructKind::Union {
            return Ok(());
        }
        if let Some(parent) = layout.parent {
            let base = fb.struct_gep(&layout.ty, slot, 0);
            self.init_members(fb, parent, base, span)?;
        }
        let unit = self.unit;
        for member in unit.symbols.struct_members(id) {
            let var = self.variable(member)?;
            if !needs_setup(&var.ty) {
                continue;
            }
            let Some(index) = layout.field(&var.name) else {
                continue;
            };
            let field = fb.struct_gep(&layout.ty, slot, index);
            self.init_storage(fb, &var.ty, field, span)?;
        }
        Ok(())
    }

    /// Fill the descriptor at `desc` for a fresh zeroed column-major array.
    fn allocate_descriptor(
        &mut self,
        fb: &mut FunctionBuilder,
        rank: usize,
        bounds: &[(i64, i64)],
        element_size: u64,
        desc: ValueId,
    ) {
        let desc_ty = self.array_descriptor(rank);
        let dim_ty = self.dimension_descriptor();
        let count: i64 = bounds.iter().map(|(_, extent)| extent).product();
        let count = fb.const_i32(i32::try_from(count.max(1)).unwrap_or(i32::MAX));
        let size = fb.const_i32(i32::try_from(element_size).unwrap_or(i32::MAX));
        let data = fb.call(runtime::CALLOC, IrType::Ptr, &[count, size]);
        fb.store_field(&desc_ty, desc, DESC_DATA, data);
        let offset = fb.const_i32(0);
        fb.store_field(&desc_ty, desc, DESC_OFFSET, offset);
        let dims = fb.struct_gep(&desc_ty, desc, DESC_DIMS);
        let mut stride = 1i64;
        for (k, &(lower, extent)) in bounds.iter().enumerate() {
            let k = fb.const_i32(i32::try_from(k).unwrap_or(i32::MAX));
            let dim = fb.element_ptr(&dim_ty, dims, k);
            for (field, value) in [(DIM_LOWER, lower), (DIM_LENGTH, extent), (DIM_STRIDE, stride)] {
                let value = fb.const_i32(i32::try_from(value).unwrap_or(i32::MAX));
                fb.store_field(&dim_ty, dim, field, value);
            }
            stride *= extent;
        }
        let allocated = fb.const_bool(true);
        fb.store_field(&desc_ty, desc, DESC_ALLOCATED, allocated);
    }
}
