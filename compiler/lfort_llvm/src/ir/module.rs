//! In-memory IR module: named types, globals, declarations, functions.

use rustc_hash::FxHashMap;

use super::types::{IrType, TypeTable};
use super::value::{Block, BlockId, Value, ValueId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Private,
}

impl Linkage {
    pub const fn keyword(self) -> &'static str {
        match self {
            Linkage::External => "",
            Linkage::Internal => "internal ",
            Linkage::Private => "private ",
        }
    }
}

/// A function definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret: IrType,
    pub linkage: Linkage,
    pub values: Vec<Value>,
    pub blocks: Vec<Block>,
}

impl Function {
    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Value ids of the parameters, in order.
    pub fn param_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| matches!(v.kind, super::value::ValueKind::Param(_)))
            .map(|(i, _)| ValueId::from_index(i))
    }
}

/// An external function declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub varargs: bool,
}

/// Parameter and return types of a callee, defined or declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub varargs: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GlobalInit {
    Zero,
    Int(i64),
    Float(f64),
    /// NUL-terminated byte string (`c"...\00"`).
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
    pub init: GlobalInit,
    pub constant: bool,
    pub linkage: Linkage,
}

/// One IR module: the unit of output of the LLVM backend.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub name: String,
    pub target_triple: Option<String>,
    pub types: TypeTable,
    globals: Vec<Global>,
    global_index: FxHashMap<String, usize>,
    strings: FxHashMap<String, String>,
    declarations: Vec<Declaration>,
    functions: Vec<Function>,
    function_index: FxHashMap<String, usize>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Module::default()
        }
    }

    /// Name of a private NUL-terminated constant holding `text`.
    ///
    /// Identical strings share one global.
    pub fn string_constant(&mut self, text: &str) -> String {
        if let Some(name) = self.strings.get(text) {
            return name.clone();
        }
        let name = format!(".str.{}", self.strings.len());
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.add_global(Global {
            name: name.clone(),
            ty: IrType::array(bytes.len() as u64, IrType::I8),
            init: GlobalInit::Bytes(bytes),
            constant: true,
            linkage: Linkage::Private,
        });
        self.strings.insert(text.to_string(), name.clone());
        name
    }

    /// Add `global` unless one with the same name exists.
    pub fn add_global(&mut self, global: Global) {
        if self.global_index.contains_key(&global.name) {
            return;
        }
        self.global_index
            .insert(global.name.clone(), self.globals.len());
        self.globals.push(global);
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.global_index.get(name).map(|i| &self.globals[*i])
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    /// Declare an external function; repeated declarations are ignored.
    pub fn declare(&mut self, name: &str, ret: IrType, params: Vec<IrType>, varargs: bool) {
        if self.declarations.iter().any(|d| d.name == name) || self.has_function(name) {
            return;
        }
        self.declarations.push(Declaration {
            name: name.to_string(),
            ret,
            params,
            varargs,
        });
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn add_function(&mut self, function: Function) {
        self.declarations.retain(|d| d.name != function.name);
        if let Some(i) = self.function_index.get(&function.name) {
            self.functions[*i] = function;
            return;
        }
        self.function_index
            .insert(function.name.clone(), self.functions.len());
        self.functions.push(function);
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.function_index.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.function_index.get(name).map(|i| &self.functions[*i])
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Signature of a defined or declared function.
    pub fn signature(&self, name: &str) -> Option<Signature> {
        if let Some(f) = self.function(name) {
            return Some(Signature {
                ret: f.ret.clone(),
                params: f.params.clone(),
                varargs: false,
            });
        }
        self.declarations
            .iter()
            .find(|d| d.name == name)
            .map(|d| Signature {
                ret: d.ret.clone(),
                params: d.params.clone(),
                varargs: d.varargs,
            })
    }
}
