//! Lowering session state.
//!
//! One `CodegenCx` lives for one translation unit. It owns the output
//! [`Module`] and every cache the lowering fills lazily: struct layouts,
//! container layouts, generated helper names, global names and procedure
//! signatures. Nothing here is global; dropping the session drops them.

use rustc_hash::FxHashMap;

use lfort_ir::{Expr, ExprId, Span, Symbol, SymbolId, TranslationUnit, Ty};

use crate::containers::ContainerRegistry;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{Function, FunctionBuilder, Module};
use crate::layout::LayoutCache;
use crate::lower::call::FnAbi;
use crate::options::LoweringOptions;
use crate::runtime;

pub struct CodegenCx<'a> {
    pub unit: &'a TranslationUnit,
    pub options: &'a LoweringOptions,
    pub module: Module,
    pub(crate) layouts: LayoutCache,
    pub(crate) containers: ContainerRegistry,
    /// IR global holding each program, module or `save` variable.
    globals: FxHashMap<SymbolId, String>,
    abis: FxHashMap<SymbolId, FnAbi>,
    /// Builder type mismatches summed over every finished function.
    codegen_errors: u32,
}

impl<'a> CodegenCx<'a> {
    pub fn new(unit: &'a TranslationUnit, options: &'a LoweringOptions) -> Self {
        let mut module = Module::new(options.module_name.clone());
        module.target_triple.clone_from(&options.target_triple);
        runtime::declare_core(&mut module);
        CodegenCx {
            unit,
            options,
            module,
            layouts: LayoutCache::default(),
            containers: ContainerRegistry::default(),
            globals: FxHashMap::default(),
            abis: FxHashMap::default(),
            codegen_errors: 0,
        }
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &'a Expr {
        self.unit.exprs.get(id)
    }

    #[inline]
    pub fn ty(&self, id: ExprId) -> &'a Ty {
        self.unit.exprs.ty(id)
    }

    #[inline]
    pub fn span(&self, id: ExprId) -> Span {
        self.unit.exprs.span(id)
    }

    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &'a Symbol {
        self.unit.symbols.get(id)
    }

    #[inline]
    pub fn name(&self, id: SymbolId) -> &'a str {
        self.unit.symbols.name(id)
    }

    pub fn variable(&self, id: SymbolId) -> CodegenResult<&'a lfort_ir::Variable> {
        self.unit
            .symbols
            .variable(id)
            .ok_or_else(|| CodegenError::internal(format!("`{}` is not a variable", self.name(id))))
    }

    pub fn function(&self, id: SymbolId) -> CodegenResult<&'a lfort_ir::Function> {
        self.unit
            .symbols
            .function(id)
            .ok_or_else(|| CodegenError::internal(format!("`{}` is not a procedure", self.name(id))))
    }

    pub(crate) fn global_name(&self, sym: SymbolId) -> Option<&str> {
        self.globals.get(&sym).map(String::as_str)
    }

    pub(crate) fn set_global_name(&mut self, sym: SymbolId, name: String) {
        self.globals.insert(sym, name);
    }

    pub(crate) fn cached_abi(&self, sym: SymbolId) -> Option<&FnAbi> {
        self.abis.get(&sym)
    }

    pub(crate) fn cache_abi(&mut self, sym: SymbolId, abi: FnAbi) {
        self.abis.insert(sym, abi);
    }

    /// Close `fb` and add the function to the module, keeping its builder
    /// error count.
    pub(crate) fn finish_function(&mut self, fb: FunctionBuilder) {
        self.codegen_errors += fb.codegen_error_count();
        let function: Function = fb.finish();
        self.module.add_function(function);
    }

    pub fn codegen_error_count(&self) -> u32 {
        self.codegen_errors
    }

    pub fn into_module(self) -> Module {
        self.module
    }
}
