use pretty_assertions::assert_eq;

use super::{Machine, Memory, Region, RtValue, Trap};
use crate::ir::{FunctionBuilder, IrType, Module};
use crate::runtime;

fn factorial_module() -> Module {
    let mut module = Module::new("fact");
    let mut fb = FunctionBuilder::new("fact", vec![IrType::I32], IrType::I64);
    let n = fb.param(0);
    let entry = fb.current_block();
    let head = fb.append_block("head");
    let body = fb.append_block("body");
    let done = fb.append_block("done");
    let one64 = fb.const_i64(1);
    let one32 = fb.const_i32(1);
    fb.br(head);

    fb.position_at_end(head);
    let i = fb.phi(IrType::I32, &[(one32, entry)]);
    let acc = fb.phi(IrType::I64, &[(one64, entry)]);
    let more = fb.icmp_sle(i, n);
    fb.cond_br(more, body, done);

    fb.position_at_end(body);
    let wide = fb.int_cast(i, IrType::I64, true);
    let next_acc = fb.mul(acc, wide);
    let next_i = fb.add(i, one32);
    fb.br(head);

    fb.position_at_end(done);
    fb.ret(acc);
    let mut func = fb.finish();
    // Back edges are known only once the body is built.
    for node in &mut func.blocks[head.index()].instrs {
        if let crate::ir::Instr::Phi { incoming } = &mut node.instr {
            let value = if node.result == Some(i) { next_i } else { next_acc };
            incoming.push((value, body));
        }
    }
    module.add_function(func);
    module
}

#[test]
fn loops_with_phis() {
    let module = factorial_module();
    let mut m = Machine::new(&module);
    assert_eq!(m.call("fact", vec![RtValue::Int(10)]), Ok(RtValue::Int(3_628_800)));
    assert_eq!(m.call("fact", vec![RtValue::Int(0)]), Ok(RtValue::Int(1)));
}

#[test]
fn integer_arithmetic_wraps_at_width() {
    let mut module = Module::new("m");
    let mut fb = FunctionBuilder::new("f", vec![IrType::I8, IrType::I8], IrType::I8);
    let (a, b) = (fb.param(0), fb.param(1));
    let sum = fb.add(a, b);
    fb.ret(sum);
    module.add_function(fb.finish());

    let mut fb = FunctionBuilder::new("div", vec![IrType::I32, IrType::I32], IrType::I32);
    let (a, b) = (fb.param(0), fb.param(1));
    let q = fb.sdiv(a, b);
    fb.ret(q);
    module.add_function(fb.finish());

    let mut m = Machine::new(&module);
    assert_eq!(m.call("f", vec![RtValue::Int(100), RtValue::Int(100)]), Ok(RtValue::Int(-56)));
    assert_eq!(m.call("div", vec![RtValue::Int(-7), RtValue::Int(2)]), Ok(RtValue::Int(-3)));
    assert_eq!(m.call("div", vec![RtValue::Int(1), RtValue::Int(0)]), Err(Trap::DivideByZero));
}

#[test]
fn main_output_and_exit() {
    let mut module = Module::new("m");
    runtime::declare_core(&mut module);
    let fmt = module.string_constant("%d %5.2f|%-4s|%s\n");
    let word = module.string_constant("ab");
    let mut fb = FunctionBuilder::new("main", vec![], IrType::I32);
    let f = fb.global(&fmt);
    let w = fb.global(&word);
    let n = fb.const_i32(-42);
    let x = fb.const_f64(3.14159);
    fb.call(runtime::PRINTF, IrType::Void, &[f, n, x, w, w]);
    let code = fb.const_i32(3);
    fb.call(runtime::EXIT, IrType::Void, &[code]);
    fb.unreachable();
    module.add_function(fb.finish());

    let outcome = Machine::new(&module).run_main();
    let outcome = outcome.map(|o| (o.exit_code, o.stdout));
    assert_eq!(outcome, Ok((3, "-42  3.14|ab  |ab\n".to_string())));
}

#[test]
fn heap_misuse_traps() {
    let mut memory = Memory::new();
    let p = memory.alloc(8, Region::Heap);
    assert_eq!(memory.free(p), Ok(()));
    assert_eq!(memory.free(p), Err(Trap::InvalidFree { addr: p }));
    assert_eq!(memory.bytes(p, 1).err(), Some(Trap::InvalidAccess { addr: p }));
    let q = memory.alloc(4, Region::Heap);
    assert!(memory.bytes(q + 2, 4).is_err());
    assert_eq!(memory.free(0), Ok(()));
}

#[test]
fn realloc_keeps_contents() {
    let mut memory = Memory::new();
    let p = memory.alloc_c_string("abc");
    let p = memory.realloc(p, 16).unwrap_or(0);
    assert_eq!(memory.c_string(p), Ok(b"abc".to_vec()));
    assert_eq!(memory.live_heap_allocations(), 1);
}

#[test]
fn runaway_loops_hit_the_step_limit() {
    let mut module = Module::new("m");
    let mut fb = FunctionBuilder::new("spin", vec![], IrType::Void);
    let head = fb.append_block("head");
    fb.br(head);
    fb.position_at_end(head);
    fb.br(head);
    module.add_function(fb.finish());
    let mut m = Machine::new(&module).with_step_limit(1000);
    assert_eq!(m.call("spin", vec![]), Err(Trap::StepLimit(1000)));
}

#[test]
fn printf_follows_c() {
    let mut memory = Memory::new();
    let cases: Vec<(&str, Vec<RtValue>, &str)> = vec![
        ("%23.17f", vec![RtValue::Float(0.1)], "    0.10000000000000001"),
        ("%f", vec![RtValue::Float(f64::NAN)], "nan"),
        ("%f", vec![RtValue::Float(f64::NEG_INFINITY)], "-inf"),
        ("%e", vec![RtValue::Float(12345.678)], "1.234568e+04"),
        ("%g", vec![RtValue::Float(0.0001)], "0.0001"),
        ("%g", vec![RtValue::Float(1e-5)], "1e-05"),
        ("%g", vec![RtValue::Float(100.0)], "100"),
        ("%05d|%lld", vec![RtValue::Int(-12), RtValue::Int(1 << 40)], "-0012|1099511627776"),
        ("%u %%", vec![RtValue::Int(-1)], "4294967295 %"),
        ("(%f,%f)", vec![RtValue::Float(1.5), RtValue::Float(-2.0)], "(1.500000,-2.000000)"),
    ];
    for (fmt, args, expected) in cases {
        let p = memory.alloc_c_string(fmt);
        assert_eq!(super::format_printf(&memory, p, &args).as_deref(), Ok(expected), "{fmt}");
    }
}

#[test]
fn complex_runtime_calls_decode_each_shape() {
    let mut module = Module::new("m");
    let vec2 = IrType::vector(2, IrType::Float);
    module.declare("_lfortran_csqrt", vec2.clone(), vec![vec2], false);
    module.declare("_lfortran_zexp", IrType::Void, vec![IrType::Ptr, IrType::Ptr], false);
    let mut m = Machine::new(&module);

    let z = RtValue::Agg(vec![RtValue::Float(-4.0), RtValue::Float(0.0)]);
    let r = m.call("_lfortran_csqrt", vec![z]);
    assert_eq!(r, Ok(RtValue::Agg(vec![RtValue::Float(0.0), RtValue::Float(2.0)])));

    let pair = IrType::Struct(vec![IrType::Double, IrType::Double]);
    let input = m.alloc(16);
    let output = m.alloc(16);
    let zero = RtValue::Agg(vec![RtValue::Float(0.0), RtValue::Float(0.0)]);
    assert_eq!(m.store(&pair, input, &zero), Ok(()));
    let r = m.call("_lfortran_zexp", vec![RtValue::Ptr(output), RtValue::Ptr(input)]);
    assert_eq!(r, Ok(RtValue::Void));
    assert_eq!(
        m.load(&pair, output),
        Ok(RtValue::Agg(vec![RtValue::Float(1.0), RtValue::Float(0.0)]))
    );
}

#[test]
fn stack_slots_die_with_their_frame() {
    let mut module = Module::new("m");
    let mut fb = FunctionBuilder::new("leak", vec![], IrType::Ptr);
    let slot = fb.alloca(IrType::I32);
    fb.ret(slot);
    module.add_function(fb.finish());
    let mut m = Machine::new(&module);
    let p = m.call("leak", vec![]).ok().and_then(|v| v.as_ptr()).unwrap_or(0);
    assert!(m.load(&IrType::I32, p).is_err());
}
