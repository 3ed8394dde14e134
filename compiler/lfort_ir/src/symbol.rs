//! Symbols and scopes.
//!
//! All symbols of a translation unit live in one arena owned by
//! [`SymbolTable`]. A scope is a name map plus the insertion order of its
//! symbols; functions, modules, programs and derived types each own one.
//! Lowering only reads this table.

use rustc_hash::FxHashMap;

use crate::stmt::Stmt;
use crate::ty::Ty;
use crate::{ExprId, ScopeId, SymbolId};

/// Calling-convention role of a variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    Local,
    In,
    Out,
    InOut,
    ReturnVar,
    Unspecified,
}

impl Intent {
    /// Dummy argument of a procedure.
    pub fn is_argument(self) -> bool {
        matches!(
            self,
            Intent::In | Intent::Out | Intent::InOut | Intent::Unspecified
        )
    }
}

/// Storage class of a variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Storage {
    #[default]
    Default,
    /// `save`: lives for the whole program run.
    Save,
    /// Named compile-time constant.
    Parameter,
}

/// Calling convention a procedure or variable is declared with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Abi {
    /// Fortran convention: everything by reference.
    #[default]
    Source,
    /// `bind(c)`: C calling convention, platform ABI rules apply.
    BindC,
    /// Provided by the compiler's intrinsic modules.
    Intrinsic,
}

/// Whether a procedure has a body in this unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DefType {
    #[default]
    Implementation,
    Interface,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StructKind {
    Struct,
    Union,
    Class,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Ty,
    pub intent: Intent,
    pub storage: Storage,
    /// Initializer expression (`integer :: x = 3`).
    pub init: Option<ExprId>,
    /// Compile-time value for parameters.
    pub value: Option<ExprId>,
    pub abi: Abi,
    /// Passed by value (`value` attribute) rather than by reference.
    pub by_value: bool,
    pub optional: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Ty, intent: Intent) -> Self {
        Variable {
            name: name.into(),
            ty,
            intent,
            storage: Storage::Default,
            init: None,
            value: None,
            abi: Abi::Source,
            by_value: false,
            optional: false,
        }
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn with_init(mut self, init: ExprId) -> Self {
        self.init = Some(init);
        self
    }

    #[must_use]
    pub fn with_abi(mut self, abi: Abi) -> Self {
        self.abi = abi;
        self
    }

    #[must_use]
    pub fn by_value(mut self) -> Self {
        self.by_value = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub scope: ScopeId,
    pub args: Vec<SymbolId>,
    pub return_var: Option<SymbolId>,
    pub body: Vec<Stmt>,
    pub abi: Abi,
    pub deftype: DefType,
    pub elemental: bool,
    /// Names of modules this procedure uses.
    pub dependencies: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub scope: ScopeId,
    pub dependencies: Vec<String>,
    /// Part of the compiler-provided intrinsic module set.
    pub intrinsic: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub name: String,
    pub scope: ScopeId,
    pub body: Vec<Stmt>,
    pub dependencies: Vec<String>,
}

/// Derived type (struct, union or class).
#[derive(Clone, Debug, PartialEq)]
pub struct StructType {
    pub name: String,
    pub scope: ScopeId,
    /// Member names in declaration order; each names a variable in `scope`.
    pub members: Vec<String>,
    /// Single parent for type extension.
    pub parent: Option<SymbolId>,
    pub kind: StructKind,
    pub abi: Abi,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    Variable(Variable),
    Function(Function),
    Module(Module),
    Program(Program),
    Struct(StructType),
    Enum(EnumType),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Variable(v) => &v.name,
            Symbol::Function(f) => &f.name,
            Symbol::Module(m) => &m.name,
            Symbol::Program(p) => &p.name,
            Symbol::Struct(s) => &s.name,
            Symbol::Enum(e) => &e.name,
        }
    }

    /// Short tag for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Symbol::Variable(_) => "variable",
            Symbol::Function(_) => "function",
            Symbol::Module(_) => "module",
            Symbol::Program(_) => "program",
            Symbol::Struct(_) => "derived type",
            Symbol::Enum(_) => "enum",
        }
    }
}

/// Name map of one scope.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    names: FxHashMap<String, SymbolId>,
    order: Vec<SymbolId>,
}

impl Scope {
    /// Symbols in insertion order.
    pub fn symbols(&self) -> &[SymbolId] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }
}

/// Arena of every symbol and scope of a translation unit.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::from_len(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            ..Scope::default()
        });
        id
    }

    /// Add `symbol` to `scope`. A later symbol with the same name shadows
    /// the earlier mapping; both remain in the arena.
    pub fn add(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        let id = SymbolId::from_len(self.symbols.len());
        let name = symbol.name().to_string();
        self.symbols.push(symbol);
        let scope = &mut self.scopes[scope.index()];
        if let Some(old) = scope.names.insert(name, id) {
            scope.order.retain(|s| *s != old);
        }
        scope.order.push(id);
        id
    }

    #[inline]
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    #[inline]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        self.get(id).name()
    }

    /// Look `name` up in `scope` only.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).get(name)
    }

    /// Look `name` up in `scope` and then its ancestors.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(id) = self.scope(s).get(name) {
                return Some(id);
            }
            current = self.scope(s).parent;
        }
        None
    }

    pub fn variable(&self, id: SymbolId) -> Option<&Variable> {
        match self.get(id) {
            Symbol::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn function(&self, id: SymbolId) -> Option<&Function> {
        match self.get(id) {
            Symbol::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn struct_type(&self, id: SymbolId) -> Option<&StructType> {
        match self.get(id) {
            Symbol::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn module(&self, id: SymbolId) -> Option<&Module> {
        match self.get(id) {
            Symbol::Module(m) => Some(m),
            _ => None,
        }
    }

    /// Member variables of a derived type, own members only, in order.
    pub fn struct_members(&self, id: SymbolId) -> Vec<SymbolId> {
        let Some(st) = self.struct_type(id) else {
            return Vec::new();
        };
        st.members
            .iter()
            .filter_map(|m| self.lookup_local(st.scope, m))
            .collect()
    }

    /// Find the derived type (this one or an ancestor) declaring `member`,
    /// together with the chain of parent hops needed to reach it.
    pub fn find_member(&self, ty: SymbolId, member: &str) -> Option<(SymbolId, SymbolId, usize)> {
        let mut current = Some(ty);
        let mut hops = 0;
        while let Some(id) = current {
            let st = self.struct_type(id)?;
            if st.members.iter().any(|m| m == member) {
                let sym = self.lookup_local(st.scope, member)?;
                return Some((id, sym, hops));
            }
            current = st.parent;
            hops += 1;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests;
