//! Translation unit and module dependency ordering.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::expr::ExprArena;
use crate::symbol::{Symbol, SymbolTable};
use crate::{ScopeId, SymbolId};

/// Name prefix of the compiler-provided intrinsic modules.
pub const INTRINSIC_MODULE_PREFIX: &str = "lfortran_intrinsic";

/// Root of a verified ASR: the symbol arena, the expression arena and the
/// global scope whose symbols are the top-level items in order.
#[derive(Clone, Debug)]
pub struct TranslationUnit {
    pub symbols: SymbolTable,
    pub exprs: ExprArena,
    pub global_scope: ScopeId,
}

impl Default for TranslationUnit {
    fn default() -> Self {
        Self::new()
    }
}

/// The module uses-graph contains a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyCycle {
    /// Module names along the cycle, first name repeated at the end.
    pub path: Vec<String>,
}

impl fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module dependency cycle: {}", self.path.join(" -> "))
    }
}

impl std::error::Error for DependencyCycle {}

impl TranslationUnit {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let global_scope = symbols.new_scope(None);
        TranslationUnit {
            symbols,
            exprs: ExprArena::new(),
            global_scope,
        }
    }

    /// Top-level symbols in declaration order.
    pub fn items(&self) -> &[SymbolId] {
        self.symbols.scope(self.global_scope).symbols()
    }

    /// Modules in an order where every module follows the modules it uses.
    ///
    /// Intrinsic modules are visited first. Dependencies naming modules
    /// absent from this unit are assumed to be compiled separately and are
    /// skipped. Ties keep declaration order.
    pub fn module_build_order(&self) -> Result<Vec<SymbolId>, DependencyCycle> {
        let (mut modules, rest): (Vec<SymbolId>, Vec<SymbolId>) = self
            .items()
            .iter()
            .copied()
            .filter(|id| matches!(self.symbols.get(*id), Symbol::Module(_)))
            .partition(|id| self.symbols.module(*id).is_some_and(|m| m.intrinsic));
        modules.extend(rest);

        let mut order = Vec::with_capacity(modules.len());
        let mut done: FxHashSet<SymbolId> = FxHashSet::default();
        let mut visiting: Vec<SymbolId> = Vec::new();
        for id in modules {
            self.visit_module(id, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit_module(
        &self,
        id: SymbolId,
        visiting: &mut Vec<SymbolId>,
        done: &mut FxHashSet<SymbolId>,
        order: &mut Vec<SymbolId>,
    ) -> Result<(), DependencyCycle> {
        if done.contains(&id) {
            return Ok(());
        }
        if let Some(pos) = visiting.iter().position(|v| *v == id) {
            let mut path: Vec<String> = visiting[pos..]
                .iter()
                .map(|v| self.symbols.name(*v).to_string())
                .collect();
            path.push(self.symbols.name(id).to_string());
            return Err(DependencyCycle { path });
        }
        let Some(module) = self.symbols.module(id) else {
            return Ok(());
        };
        visiting.push(id);
        for dep in &module.dependencies {
            if let Some(dep_id) = self.symbols.lookup_local(self.global_scope, dep) {
                if self.symbols.module(dep_id).is_some() {
                    self.visit_module(dep_id, visiting, done, order)?;
                }
            }
        }
        visiting.pop();
        done.insert(id);
        order.push(id);
        Ok(())
    }
}

/// True for the compiler's own intrinsic modules.
pub fn is_intrinsic_module_name(name: &str) -> bool {
    name.starts_with(INTRINSIC_MODULE_PREFIX)
}

#[cfg(test)]
mod tests;
