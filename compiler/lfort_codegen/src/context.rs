//! Code generation context and state.
//!
//! The `CodegenContext` holds everything the C++ emitters share while
//! walking one translation unit: the unit itself, the output buffer and
//! indentation, per-symbol side tables and the helper templates already
//! emitted.

use rustc_hash::{FxHashMap, FxHashSet};

use lfort_ir::{ExprId, Expr, Symbol, SymbolId, TranslationUnit, Ty};

use crate::error::{CodegenError, CodegenResult};
use crate::CppOptions;

/// Facts derived about a symbol during lowering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    /// A local still has to be declared in its procedure prologue. Cleared
    /// for loop variables bound by a parallel lambda.
    pub needs_declaration: bool,
    /// Function from an intrinsic module that lowers to a native C++ form.
    pub intrinsic_function: bool,
}

impl Default for SymbolInfo {
    fn default() -> Self {
        SymbolInfo {
            needs_declaration: true,
            intrinsic_function: false,
        }
    }
}

/// Code generation context.
pub struct CodegenContext<'a> {
    pub unit: &'a TranslationUnit,
    pub options: &'a CppOptions,
    /// Function whose body is being emitted; `None` inside subroutines
    /// and the program.
    pub current_function: Option<SymbolId>,
    sym_info: FxHashMap<SymbolId, SymbolInfo>,
    /// Current indentation level.
    indent: usize,
    /// Generated code output.
    output: String,
    /// Names of helper templates already emitted.
    generated_helpers: FxHashSet<String>,
    /// Helper template definitions in first-use order.
    helper_defs: Vec<String>,
    /// Counter for generating unique temporary names.
    temp_counter: u32,
}

impl<'a> CodegenContext<'a> {
    pub fn new(unit: &'a TranslationUnit, options: &'a CppOptions) -> Self {
        Self {
            unit,
            options,
            current_function: None,
            sym_info: FxHashMap::default(),
            indent: 0,
            output: String::with_capacity(4096),
            generated_helpers: FxHashSet::default(),
            helper_defs: Vec::new(),
            temp_counter: 0,
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
    pub fn symbol(&self, id: SymbolId) -> &'a Symbol {
        self.unit.symbols.get(id)
    }

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

    pub fn info(&self, id: SymbolId) -> SymbolInfo {
        self.sym_info.get(&id).copied().unwrap_or_default()
    }

    pub fn info_mut(&mut self, id: SymbolId) -> &mut SymbolInfo {
        self.sym_info.entry(id).or_default()
    }

    /// Generate a unique temporary variable name.
    pub fn fresh_temp(&mut self) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        format!("_tmp{n}")
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent called with zero indent");
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write indentation to output.
    pub fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
    }

    /// Write a string to output.
    pub fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    /// Write a line to output (with indentation and newline).
    pub fn writeln(&mut self, s: &str) {
        self.write_indent();
        self.output.push_str(s);
        self.output.push('\n');
    }

    pub fn newline(&mut self) {
        self.output.push('\n');
    }

    /// Take the generated output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Run `f` against an empty buffer and return what it wrote, leaving
    /// the enclosing output untouched.
    pub fn capture(
        &mut self,
        f: impl FnOnce(&mut Self) -> CodegenResult<()>,
    ) -> CodegenResult<String> {
        let outer = std::mem::take(&mut self.output);
        let result = f(self);
        let inner = std::mem::replace(&mut self.output, outer);
        result.map(|()| inner)
    }

    /// Check if a helper function has been generated.
    pub fn has_helper(&self, name: &str) -> bool {
        self.generated_helpers.contains(name)
    }

    /// Record `definition` under `name` unless already present.
    pub fn add_helper(&mut self, name: &str, definition: impl FnOnce() -> String) {
        if self.generated_helpers.insert(name.to_string()) {
            tracing::trace!(helper = name, "emitting C++ helper");
            self.helper_defs.push(definition());
        }
    }

    /// Helper definitions in first-use order.
    pub fn helpers(&self) -> &[String] {
        &self.helper_defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_temp() {
        let unit = TranslationUnit::new();
        let options = CppOptions::default();
        let mut ctx = CodegenContext::new(&unit, &options);
        assert_eq!(ctx.fresh_temp(), "_tmp0");
        assert_eq!(ctx.fresh_temp(), "_tmp1");
        assert_eq!(ctx.fresh_temp(), "_tmp2");
    }

    #[test]
    fn test_indent_dedent() {
        let unit = TranslationUnit::new();
        let options = CppOptions::default();
        let mut ctx = CodegenContext::new(&unit, &options);
        ctx.writeln("line1");
        ctx.indent();
        ctx.writeln("line2");
        ctx.indent();
        ctx.writeln("line3");
        ctx.dedent();
        ctx.writeln("line4");
        ctx.dedent();
        ctx.writeln("line5");
        let output = ctx.take_output();
        assert_eq!(
            output,
            "line1\n    line2\n        line3\n    line4\nline5\n"
        );
    }

    #[test]
    fn capture_restores_outer_buffer() {
        let unit = TranslationUnit::new();
        let options = CppOptions::default();
        let mut ctx = CodegenContext::new(&unit, &options);
        ctx.writeln("outer");
        let inner = ctx.capture(|ctx| {
            ctx.writeln("inner");
            Ok(())
        });
        assert_eq!(inner, Ok("inner\n".to_string()));
        assert_eq!(ctx.take_output(), "outer\n");
    }

    #[test]
    fn helpers_are_emitted_once() {
        let unit = TranslationUnit::new();
        let options = CppOptions::default();
        let mut ctx = CodegenContext::new(&unit, &options);
        ctx.add_helper("lfort_sign", || "a".to_string());
        ctx.add_helper("lfort_sign", || "b".to_string());
        assert!(ctx.has_helper("lfort_sign"));
        assert_eq!(ctx.helpers(), ["a".to_string()]);
    }

    #[test]
    fn symbols_need_declaration_by_default() {
        let unit = TranslationUnit::new();
        let options = CppOptions::default();
        let mut ctx = CodegenContext::new(&unit, &options);
        let id = SymbolId::new(4);
        assert!(ctx.info(id).needs_declaration);
        ctx.info_mut(id).needs_declaration = false;
        assert!(!ctx.info(id).needs_declaration);
    }
}
