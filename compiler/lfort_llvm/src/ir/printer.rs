//! Textual LLVM IR output.

use std::fmt::Write;

use super::module::{Declaration, Function, Global, GlobalInit, Module};
use super::types::{local_ident, IrType, TypeTable};
use super::value::{Instr, InstrNode, Terminator, ValueId, ValueKind};

impl Module {
    /// Render the module as LLVM assembly.
    pub fn to_llvm_ir(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = '{}'", self.name);
        let _ = writeln!(out, "source_filename = \"{}\"", self.name);
        if let Some(triple) = &self.target_triple {
            let _ = writeln!(out, "target triple = \"{triple}\"");
        }

        let mut any_types = false;
        for (_, name, body) in self.types.iter() {
            if !any_types {
                out.push('\n');
                any_types = true;
            }
            let ident = local_ident(name);
            match body {
                Some(fields) => {
                    let body = IrType::Struct(fields.to_vec());
                    let _ = writeln!(out, "%{ident} = type {}", self.types.display(&body));
                }
                None => {
                    let _ = writeln!(out, "%{ident} = type opaque");
                }
            }
        }

        if !self.globals().is_empty() {
            out.push('\n');
        }
        for global in self.globals() {
            print_global(&mut out, &self.types, global);
        }

        if !self.declarations().is_empty() {
            out.push('\n');
        }
        for decl in self.declarations() {
            print_declaration(&mut out, &self.types, decl);
        }

        for function in self.functions() {
            out.push('\n');
            FunctionPrinter {
                module: self,
                func: function,
                out: &mut out,
            }
            .print();
        }
        out
    }
}

fn print_global(out: &mut String, types: &TypeTable, global: &Global) {
    let kind = if global.constant { "constant" } else { "global" };
    let init = match &global.init {
        GlobalInit::Zero => zero_literal(&global.ty),
        GlobalInit::Int(n) => int_literal(&global.ty, *n),
        GlobalInit::Float(x) => float_literal(*x),
        GlobalInit::Bytes(bytes) => format!("c\"{}\"", escape_bytes(bytes)),
    };
    let _ = writeln!(
        out,
        "@{} = {}{kind} {} {init}",
        local_ident(&global.name),
        global.linkage.keyword(),
        types.display(&global.ty)
    );
}

fn print_declaration(out: &mut String, types: &TypeTable, decl: &Declaration) {
    let mut params: Vec<String> = decl
        .params
        .iter()
        .map(|p| types.display(p).to_string())
        .collect();
    if decl.varargs {
        params.push("...".to_string());
    }
    let _ = writeln!(
        out,
        "declare {} @{}({})",
        types.display(&decl.ret),
        local_ident(&decl.name),
        params.join(", ")
    );
}

fn zero_literal(ty: &IrType) -> String {
    match ty {
        IrType::Ptr => "null".to_string(),
        IrType::I1 => "false".to_string(),
        t if t.is_int() => "0".to_string(),
        t if t.is_float() => float_literal(0.0),
        _ => "zeroinitializer".to_string(),
    }
}

fn int_literal(ty: &IrType, n: i64) -> String {
    if *ty == IrType::I1 {
        if n == 0 { "false" } else { "true" }.to_string()
    } else {
        n.to_string()
    }
}

/// Floats are written as the hex image of their `double` value, which is
/// exact for both `float` and `double`.
fn float_literal(x: f64) -> String {
    format!("0x{:016X}", x.to_bits())
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    for &b in bytes {
        if (b.is_ascii_graphic() && b != b'"' && b != b'\\') || b == b' ' {
            s.push(char::from(b));
        } else {
            let _ = write!(s, "\\{b:02X}");
        }
    }
    s
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    func: &'a Function,
    out: &'a mut String,
}

impl FunctionPrinter<'_> {
    fn ty(&self, ty: &IrType) -> String {
        self.module.types.display(ty).to_string()
    }

    fn operand(&self, id: ValueId) -> String {
        let value = self.func.value(id);
        match &value.kind {
            ValueKind::Param(_) | ValueKind::Inst => format!("%v{}", id.raw()),
            ValueKind::ConstInt(n) => int_literal(&value.ty, *n),
            ValueKind::ConstFloat(x) => float_literal(*x),
            ValueKind::Null => "null".to_string(),
            ValueKind::Undef => "undef".to_string(),
            ValueKind::Zero => zero_literal(&value.ty),
            ValueKind::Global(name) => format!("@{}", local_ident(name)),
        }
    }

    fn typed(&self, id: ValueId) -> String {
        format!("{} {}", self.ty(&self.func.value(id).ty), self.operand(id))
    }

    fn label(&self, block: super::value::BlockId) -> String {
        format!("%{}", local_ident(&self.func.block(block).label))
    }

    fn print(mut self) {
        let params: Vec<String> = self
            .func
            .param_ids()
            .map(|id| self.typed(id))
            .collect();
        let header = format!(
            "define {}{} @{}({}) {{",
            self.func.linkage.keyword(),
            self.ty(&self.func.ret),
            local_ident(&self.func.name),
            params.join(", ")
        );
        self.line(&header);
        let func = self.func;
        for (i, block) in func.blocks.iter().enumerate() {
            if i > 0 {
                self.line("");
            }
            let label = format!("{}:", local_ident(&block.label));
            self.line(&label);
            for node in &block.instrs {
                let text = self.instr(node);
                self.line(&format!("  {text}"));
            }
            let term = match &block.terminator {
                Some(t) => self.terminator(t),
                None => "unreachable".to_string(),
            };
            self.line(&format!("  {term}"));
        }
        self.line("}");
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn instr(&self, node: &InstrNode) -> String {
        let body = match &node.instr {
            Instr::Alloca { ty } => format!("alloca {}", self.ty(ty)),
            Instr::Load { ty, ptr } => format!("load {}, {}", self.ty(ty), self.typed(*ptr)),
            Instr::Store { value, ptr } => {
                format!("store {}, {}", self.typed(*value), self.typed(*ptr))
            }
            Instr::Gep {
                elem_ty,
                base,
                indices,
            } => {
                let mut s = format!("getelementptr {}, {}", self.ty(elem_ty), self.typed(*base));
                for index in indices {
                    let _ = write!(s, ", {}", self.typed(*index));
                }
                s
            }
            Instr::Binary { op, lhs, rhs } => format!(
                "{} {}, {}",
                op.mnemonic(),
                self.typed(*lhs),
                self.operand(*rhs)
            ),
            Instr::FNeg { value } => format!("fneg {}", self.typed(*value)),
            Instr::ICmp { pred, lhs, rhs } => format!(
                "icmp {} {}, {}",
                pred.mnemonic(),
                self.typed(*lhs),
                self.operand(*rhs)
            ),
            Instr::FCmp { pred, lhs, rhs } => format!(
                "fcmp {} {}, {}",
                pred.mnemonic(),
                self.typed(*lhs),
                self.operand(*rhs)
            ),
            Instr::Cast { op, value, to } => {
                format!("{} {} to {}", op.mnemonic(), self.typed(*value), self.ty(to))
            }
            Instr::Select {
                cond,
                then_value,
                else_value,
            } => format!(
                "select {}, {}, {}",
                self.typed(*cond),
                self.typed(*then_value),
                self.typed(*else_value)
            ),
            Instr::Call { callee, ret, args } => {
                let args: Vec<String> = args.iter().map(|a| self.typed(*a)).collect();
                let fn_ty = match self.module.signature(callee) {
                    Some(sig) if sig.varargs => {
                        let mut params: Vec<String> =
                            sig.params.iter().map(|p| self.ty(p)).collect();
                        params.push("...".to_string());
                        format!("{} ({})", self.ty(ret), params.join(", "))
                    }
                    _ => self.ty(ret),
                };
                format!("call {fn_ty} @{}({})", local_ident(callee), args.join(", "))
            }
            Instr::ExtractValue { agg, index } => {
                format!("extractvalue {}, {index}", self.typed(*agg))
            }
            Instr::InsertValue { agg, value, index } => format!(
                "insertvalue {}, {}, {index}",
                self.typed(*agg),
                self.typed(*value)
            ),
            Instr::Phi { incoming } => {
                let ty = incoming
                    .first()
                    .map_or_else(String::new, |(v, _)| self.ty(&self.func.value(*v).ty));
                let arms: Vec<String> = incoming
                    .iter()
                    .map(|(v, b)| format!("[ {}, {} ]", self.operand(*v), self.label(*b)))
                    .collect();
                format!("phi {ty} {}", arms.join(", "))
            }
        };
        match node.result {
            Some(id) => format!("%v{} = {body}", id.raw()),
            None => body,
        }
    }

    fn terminator(&self, term: &Terminator) -> String {
        match term {
            Terminator::Ret(Some(v)) => format!("ret {}", self.typed(*v)),
            Terminator::Ret(None) => "ret void".to_string(),
            Terminator::Br(dest) => format!("br label {}", self.label(*dest)),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => format!(
                "br {}, label {}, label {}",
                self.typed(*cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Terminator::Switch {
                value,
                default,
                cases,
            } => {
                let ty = self.ty(&self.func.value(*value).ty);
                let arms: Vec<String> = cases
                    .iter()
                    .map(|(n, b)| format!("{ty} {n}, label {}", self.label(*b)))
                    .collect();
                format!(
                    "switch {}, label {} [ {} ]",
                    self.typed(*value),
                    self.label(*default),
                    arms.join(" ")
                )
            }
            Terminator::Unreachable => "unreachable".to_string(),
        }
    }
}
