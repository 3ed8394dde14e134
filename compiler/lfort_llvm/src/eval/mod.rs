//! Interpreter for IR modules.
//!
//! `Machine` executes a [`Module`] directly, with the C runtime replaced by
//! the shims in `shims.rs`. It exists so generated code (container helpers,
//! lowered programs) can be tested end to end without an LLVM toolchain.

mod memory;
mod shims;
mod value;

#[cfg(test)]
mod tests;

use rustc_hash::FxHashMap;

use crate::ir::types::{sign_extend, zero_extend};
use crate::ir::{
    BinaryOp, BlockId, CastOp, FloatPredicate, Function, GlobalInit, Instr, IntPredicate, IrType,
    Module, Terminator, ValueId, ValueKind,
};

pub use memory::{Memory, Region};
pub use shims::format_printf;
pub use value::RtValue;

/// Instructions a run may execute before it is stopped.
pub const DEFAULT_STEP_LIMIT: u64 = 50_000_000;

const MAX_CALL_DEPTH: usize = 10_000;

/// Why execution stopped early.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    #[error("program exited with code {0}")]
    Exit(i32),
    #[error("invalid memory access at {addr:#x}")]
    InvalidAccess { addr: u64 },
    #[error("invalid free of {addr:#x}")]
    InvalidFree { addr: u64 },
    #[error("integer division by zero")]
    DivideByZero,
    #[error("reached unreachable code in `{function}`")]
    Unreachable { function: String },
    #[error("call to unknown function `{0}`")]
    UnknownFunction(String),
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
    #[error("call depth limit exceeded")]
    StackOverflow,
    #[error("bad call to `{name}`: {reason}")]
    BadCall { name: String, reason: String },
    #[error("malformed IR: {0}")]
    Malformed(String),
}

/// Result of running `main` to completion or to `exit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub struct Machine<'m> {
    module: &'m Module,
    memory: Memory,
    globals: FxHashMap<String, u64>,
    stdout: String,
    stderr: String,
    steps: u64,
    step_limit: u64,
    depth: usize,
}

struct Frame<'f> {
    func: &'f Function,
    args: Vec<RtValue>,
    regs: Vec<Option<RtValue>>,
    allocas: Vec<u64>,
}

impl<'m> Machine<'m> {
    /// Load `module`: lay out and initialise its globals.
    pub fn new(module: &'m Module) -> Self {
        let mut memory = Memory::new();
        let mut globals = FxHashMap::default();
        for global in module.globals() {
            let size = module.types.size_of(&global.ty) as usize;
            let ptr = memory.alloc(size.max(1), Region::Global);
            let init = match &global.init {
                GlobalInit::Zero => None,
                GlobalInit::Int(n) => Some(RtValue::Int(*n)),
                GlobalInit::Float(x) => Some(RtValue::Float(*x)),
                GlobalInit::Bytes(bytes) => {
                    if let Ok(slot) = memory.bytes_mut(ptr, bytes.len()) {
                        slot.copy_from_slice(bytes);
                    }
                    None
                }
            };
            if let Some(value) = init {
                let _ = memory.store(&module.types, &global.ty, ptr, &value);
            }
            globals.insert(global.name.clone(), ptr);
        }
        Machine {
            module,
            memory,
            globals,
            stdout: String::new(),
            stderr: String::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run `main()`. `exit(n)` ends the run with code `n`.
    pub fn run_main(&mut self) -> Result<RunOutcome, Trap> {
        let exit_code = match self.call("main", Vec::new()) {
            Ok(v) => v.as_int().unwrap_or(0) as i32,
            Err(Trap::Exit(code)) => code,
            Err(other) => return Err(other),
        };
        Ok(RunOutcome {
            exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }

    /// Call a defined or external function by name.
    pub fn call(&mut self, name: &str, args: Vec<RtValue>) -> Result<RtValue, Trap> {
        let module = self.module;
        if let Some(func) = module.function(name) {
            return self.call_function(func, args);
        }
        let sig = module
            .signature(name)
            .ok_or_else(|| Trap::UnknownFunction(name.to_string()))?;
        self.call_external(name, &args, &sig.ret, &sig.params)
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Address of the global `name`.
    pub fn global_address(&self, name: &str) -> Option<u64> {
        self.globals.get(name).copied()
    }

    /// Heap allocation of `size` bytes, as the program's malloc would make.
    pub fn alloc(&mut self, size: usize) -> u64 {
        self.memory.alloc(size, Region::Heap)
    }

    pub fn load(&self, ty: &IrType, ptr: u64) -> Result<RtValue, Trap> {
        self.memory.load(&self.module.types, ty, ptr)
    }

    pub fn store(&mut self, ty: &IrType, ptr: u64, value: &RtValue) -> Result<(), Trap> {
        self.memory.store(&self.module.types, ty, ptr, value)
    }

    fn call_function(&mut self, func: &'m Function, args: Vec<RtValue>) -> Result<RtValue, Trap> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Trap::StackOverflow);
        }
        self.depth += 1;
        let mut frame = Frame {
            func,
            args,
            regs: vec![None; func.values.len()],
            allocas: Vec::new(),
        };
        let result = lfort_ir::ensure_sufficient_stack(|| self.execute(&mut frame));
        for ptr in frame.allocas {
            self.memory.release_stack(ptr);
        }
        self.depth -= 1;
        result
    }

    fn execute(&mut self, frame: &mut Frame<'m>) -> Result<RtValue, Trap> {
        let func = frame.func;
        let mut block = BlockId::from_index(0);
        let mut prev: Option<BlockId> = None;
        loop {
            let current = func.block(block);
            // Phis read their inputs before any of them is written.
            let mut phi_values = Vec::new();
            for node in &current.instrs {
                let Instr::Phi { incoming } = &node.instr else {
                    break;
                };
                let from = prev.ok_or_else(|| Trap::Malformed("phi in entry block".into()))?;
                let (value, _) = incoming
                    .iter()
                    .find(|(_, b)| *b == from)
                    .ok_or_else(|| Trap::Malformed(format!("phi without edge from {}", func.block(from).label)))?;
                phi_values.push((node.result, self.operand(frame, *value)?));
            }
            for (result, value) in phi_values {
                if let Some(id) = result {
                    frame.regs[id.index()] = Some(value);
                }
            }

            for node in &current.instrs {
                if matches!(node.instr, Instr::Phi { .. }) {
                    continue;
                }
                self.tick()?;
                let value = self.step(frame, &node.instr)?;
                if let Some(id) = node.result {
                    frame.regs[id.index()] = Some(value);
                }
            }

            self.tick()?;
            let next = match &current.terminator {
                Some(Terminator::Ret(value)) => {
                    return match value {
                        Some(v) => self.operand(frame, *v),
                        None => Ok(RtValue::Void),
                    }
                }
                Some(Terminator::Br(dest)) => *dest,
                Some(Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                }) => {
                    if self.operand(frame, *cond)?.as_bool().unwrap_or(false) {
                        *then_block
                    } else {
                        *else_block
                    }
                }
                Some(Terminator::Switch {
                    value,
                    default,
                    cases,
                }) => {
                    let v = self.operand(frame, *value)?.as_int().unwrap_or(0);
                    cases
                        .iter()
                        .find(|(n, _)| *n == v)
                        .map_or(*default, |(_, b)| *b)
                }
                Some(Terminator::Unreachable) | None => {
                    return Err(Trap::Unreachable {
                        function: func.name.clone(),
                    })
                }
            };
            prev = Some(block);
            block = next;
        }
    }

    fn tick(&mut self) -> Result<(), Trap> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(Trap::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn operand(&self, frame: &Frame<'_>, id: ValueId) -> Result<RtValue, Trap> {
        let value = frame.func.value(id);
        Ok(match &value.kind {
            ValueKind::Param(i) => frame
                .args
                .get(*i as usize)
                .cloned()
                .ok_or_else(|| Trap::Malformed(format!("missing argument {i} of `{}`", frame.func.name)))?,
            ValueKind::ConstInt(n) => RtValue::Int(*n),
            ValueKind::ConstFloat(x) => RtValue::Float(*x),
            ValueKind::Null => RtValue::Ptr(0),
            ValueKind::Undef | ValueKind::Zero => RtValue::zero(&self.module.types, &value.ty),
            ValueKind::Global(name) => RtValue::Ptr(self.global_address(name).ok_or_else(|| {
                Trap::Malformed(format!("unknown global `{name}`"))
            })?),
            ValueKind::Inst => frame.regs[id.index()]
                .clone()
                .ok_or_else(|| Trap::Malformed(format!("use of undefined %v{}", id.raw())))?,
        })
    }

    fn int_operand(&self, frame: &Frame<'_>, id: ValueId) -> Result<i64, Trap> {
        self.operand(frame, id)?
            .as_int()
            .ok_or_else(|| Trap::Malformed(format!("%v{} is not an integer", id.raw())))
    }

    fn float_operand(&self, frame: &Frame<'_>, id: ValueId) -> Result<f64, Trap> {
        self.operand(frame, id)?
            .as_float()
            .ok_or_else(|| Trap::Malformed(format!("%v{} is not a float", id.raw())))
    }

    fn step(&mut self, frame: &mut Frame<'m>, instr: &'m Instr) -> Result<RtValue, Trap> {
        let module = self.module;
        let types = &module.types;
        Ok(match instr {
            Instr::Alloca { ty } => {
                let size = types.size_of(ty) as usize;
                let ptr = self.memory.alloc(size.max(1), Region::Stack);
                frame.allocas.push(ptr);
                RtValue::Ptr(ptr)
            }
            Instr::Load { ty, ptr } => {
                let ptr = self.pointer(frame, *ptr)?;
                self.memory.load(types, ty, ptr)?
            }
            Instr::Store { value, ptr } => {
                let ty = &frame.func.value(*value).ty;
                let v = self.operand(frame, *value)?;
                let ptr = self.pointer(frame, *ptr)?;
                self.memory.store(types, ty, ptr, &v)?;
                RtValue::Void
            }
            Instr::Gep {
                elem_ty,
                base,
                indices,
            } => {
                let base = self.pointer(frame, *base)?;
                let mut offset: i64 = 0;
                let mut ty = elem_ty.clone();
                for (i, index) in indices.iter().enumerate() {
                    let n = self.int_operand(frame, *index)?;
                    if i == 0 {
                        offset += n * types.size_of(&ty) as i64;
                        continue;
                    }
                    let field = u32::try_from(n).unwrap_or(0);
                    offset += types.field_offset(&ty, field) as i64;
                    ty = types
                        .field_type(&ty, field)
                        .cloned()
                        .ok_or_else(|| Trap::Malformed("gep index out of range".into()))?;
                }
                RtValue::Ptr(base.wrapping_add(offset as u64))
            }
            Instr::Binary { op, lhs, rhs } => {
                let ty = &frame.func.value(*lhs).ty;
                if op.is_float() {
                    let (a, b) = (self.float_operand(frame, *lhs)?, self.float_operand(frame, *rhs)?);
                    let r = match op {
                        BinaryOp::FAdd => a + b,
                        BinaryOp::FSub => a - b,
                        BinaryOp::FMul => a * b,
                        BinaryOp::FDiv => a / b,
                        _ => a % b,
                    };
                    RtValue::Float(round_float(ty, r))
                } else {
                    let bits = ty.int_bits().unwrap_or(64);
                    let (a, b) = (self.int_operand(frame, *lhs)?, self.int_operand(frame, *rhs)?);
                    RtValue::Int(sign_extend(int_binary(*op, a, b, bits)?, bits))
                }
            }
            Instr::FNeg { value } => {
                let ty = &frame.func.value(*value).ty;
                RtValue::Float(round_float(ty, -self.float_operand(frame, *value)?))
            }
            Instr::ICmp { pred, lhs, rhs } => {
                let bits = frame.func.value(*lhs).ty.int_bits().unwrap_or(64);
                let a = self.int_operand(frame, *lhs)?;
                let b = self.int_operand(frame, *rhs)?;
                let (ua, ub) = (zero_extend(a, bits), zero_extend(b, bits));
                let r = match pred {
                    IntPredicate::Eq => ua == ub,
                    IntPredicate::Ne => ua != ub,
                    IntPredicate::Slt => a < b,
                    IntPredicate::Sle => a <= b,
                    IntPredicate::Sgt => a > b,
                    IntPredicate::Sge => a >= b,
                    IntPredicate::Ult => ua < ub,
                    IntPredicate::Ule => ua <= ub,
                    IntPredicate::Ugt => ua > ub,
                    IntPredicate::Uge => ua >= ub,
                };
                RtValue::Int(i64::from(r))
            }
            Instr::FCmp { pred, lhs, rhs } => {
                let a = self.float_operand(frame, *lhs)?;
                let b = self.float_operand(frame, *rhs)?;
                let r = match pred {
                    FloatPredicate::Oeq => a == b,
                    FloatPredicate::Une => a != b,
                    FloatPredicate::Olt => a < b,
                    FloatPredicate::Ole => a <= b,
                    FloatPredicate::Ogt => a > b,
                    FloatPredicate::Oge => a >= b,
                };
                RtValue::Int(i64::from(r))
            }
            Instr::Cast { op, value, to } => {
                let from = &frame.func.value(*value).ty;
                let v = self.operand(frame, *value)?;
                cast(*op, from, to, &v)?
            }
            Instr::Select {
                cond,
                then_value,
                else_value,
            } => {
                if self.operand(frame, *cond)?.as_bool().unwrap_or(false) {
                    self.operand(frame, *then_value)?
                } else {
                    self.operand(frame, *else_value)?
                }
            }
            Instr::Call { callee, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.operand(frame, *arg)?);
                }
                self.call(callee, values)?
            }
            Instr::ExtractValue { agg, index } => match self.operand(frame, *agg)? {
                RtValue::Agg(mut fields) if (*index as usize) < fields.len() => {
                    fields.swap_remove(*index as usize)
                }
                other => return Err(Trap::Malformed(format!("extractvalue from `{other}`"))),
            },
            Instr::InsertValue { agg, value, index } => {
                let v = self.operand(frame, *value)?;
                match self.operand(frame, *agg)? {
                    RtValue::Agg(mut fields) if (*index as usize) < fields.len() => {
                        fields[*index as usize] = v;
                        RtValue::Agg(fields)
                    }
                    other => return Err(Trap::Malformed(format!("insertvalue into `{other}`"))),
                }
            }
            Instr::Phi { .. } => return Err(Trap::Malformed("phi after non-phi".into())),
        })
    }

    fn pointer(&self, frame: &Frame<'_>, id: ValueId) -> Result<u64, Trap> {
        self.operand(frame, id)?
            .as_ptr()
            .ok_or_else(|| Trap::Malformed(format!("%v{} is not a pointer", id.raw())))
    }
}

fn round_float(ty: &IrType, x: f64) -> f64 {
    if *ty == IrType::Float {
        f64::from(x as f32)
    } else {
        x
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64, bits: u32) -> Result<i64, Trap> {
    let (ua, ub) = (zero_extend(a, bits), zero_extend(b, bits));
    let shift = |n: i64| -> Option<u32> { u32::try_from(n).ok().filter(|s| *s < bits) };
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::SDiv | BinaryOp::SRem | BinaryOp::UDiv | BinaryOp::URem if b == 0 => {
            return Err(Trap::DivideByZero)
        }
        BinaryOp::SDiv => a.wrapping_div(b),
        BinaryOp::SRem => a.wrapping_rem(b),
        BinaryOp::UDiv => (ua / ub) as i64,
        BinaryOp::URem => (ua % ub) as i64,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => shift(b).map_or(0, |s| ((ua << s) & mask(bits)) as i64),
        BinaryOp::LShr => shift(b).map_or(0, |s| (ua >> s) as i64),
        BinaryOp::AShr => shift(b).map_or(if a < 0 { -1 } else { 0 }, |s| a >> s),
        _ => return Err(Trap::Malformed(format!("{} on integers", op.mnemonic()))),
    })
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn cast(op: CastOp, from: &IrType, to: &IrType, v: &RtValue) -> Result<RtValue, Trap> {
    let from_bits = from.int_bits().unwrap_or(64);
    let to_bits = to.int_bits().unwrap_or(64);
    let int = || {
        v.as_int()
            .ok_or_else(|| Trap::Malformed(format!("{} of non-integer", op.mnemonic())))
    };
    let float = || {
        v.as_float()
            .ok_or_else(|| Trap::Malformed(format!("{} of non-float", op.mnemonic())))
    };
    Ok(match op {
        CastOp::Trunc => RtValue::Int(sign_extend(int()?, to_bits)),
        CastOp::ZExt => RtValue::Int(sign_extend(zero_extend(int()?, from_bits) as i64, to_bits)),
        CastOp::SExt => {
            let n = int()?;
            // i1 true is all ones once sign-extended.
            RtValue::Int(if from_bits == 1 { -n } else { n })
        }
        CastOp::FPTrunc | CastOp::FPExt => RtValue::Float(round_float(to, float()?)),
        CastOp::FPToSI => RtValue::Int(sign_extend(float()? as i64, to_bits)),
        CastOp::FPToUI => RtValue::Int(sign_extend(float()? as u64 as i64, to_bits)),
        CastOp::SIToFP => RtValue::Float(round_float(to, int()? as f64)),
        CastOp::UIToFP => RtValue::Float(round_float(to, zero_extend(int()?, from_bits) as f64)),
        CastOp::PtrToInt => RtValue::Int(sign_extend(v.as_ptr().unwrap_or(0) as i64, to_bits)),
        CastOp::IntToPtr => RtValue::Ptr(int()? as u64),
        CastOp::Bitcast => match (from, to, v) {
            (IrType::Double, IrType::I64, RtValue::Float(x)) => RtValue::Int(x.to_bits() as i64),
            (IrType::I64, IrType::Double, RtValue::Int(n)) => RtValue::Float(f64::from_bits(*n as u64)),
            (IrType::Float, IrType::I32, RtValue::Float(x)) => {
                RtValue::Int(i64::from((*x as f32).to_bits() as i32))
            }
            (IrType::I32, IrType::Float, RtValue::Int(n)) => {
                RtValue::Float(f64::from(f32::from_bits(*n as u32)))
            }
            (_, _, other) => other.clone(),
        },
    })
}
