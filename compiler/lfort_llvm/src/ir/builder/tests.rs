use pretty_assertions::assert_eq;

use super::FunctionBuilder;
use crate::ir::types::IrType;
use crate::ir::value::{Instr, Terminator, ValueKind};

#[test]
fn allocas_stay_at_the_head_of_entry() {
    let mut fb = FunctionBuilder::new("f", vec![IrType::I32], IrType::Void);
    let p = fb.param(0);
    let first = fb.alloca(IrType::I32);
    fb.store(p, first);
    let second = fb.alloca(IrType::I64);
    fb.ret_void();
    let f = fb.finish();
    let entry = &f.blocks[0];
    assert_eq!(entry.instrs[0].result, Some(first));
    assert_eq!(entry.instrs[1].result, Some(second));
    assert!(matches!(entry.instrs[2].instr, Instr::Store { .. }));
}

#[test]
fn mismatched_operands_are_counted_not_built() {
    let mut fb = FunctionBuilder::new("f", vec![], IrType::Void);
    let a = fb.const_i32(1);
    let b = fb.const_i64(2);
    let sum = fb.add(a, b);
    assert_eq!(fb.codegen_error_count(), 1);
    assert_eq!(fb.const_value(sum), Some(0));
    let x = fb.const_f64(1.0);
    fb.add(x, x);
    assert_eq!(fb.codegen_error_count(), 2);
}

#[test]
fn bool_constants_are_normalized() {
    let mut fb = FunctionBuilder::new("f", vec![], IrType::Void);
    let t = fb.const_int(IrType::I1, -1);
    let byte = fb.const_int(IrType::I8, 200);
    assert_eq!(fb.const_value(t), Some(1));
    assert_eq!(fb.const_value(byte), Some(-56));
}

#[test]
fn phis_precede_other_instructions() {
    let mut fb = FunctionBuilder::new("f", vec![IrType::I1], IrType::I32);
    let cond = fb.param(0);
    let left = fb.append_block("left");
    let right = fb.append_block("right");
    let join = fb.append_block("join");
    fb.cond_br(cond, left, right);
    fb.position_at_end(left);
    let one = fb.const_i32(1);
    fb.br(join);
    fb.position_at_end(right);
    let two = fb.const_i32(2);
    fb.br(join);
    fb.position_at_end(join);
    let first = fb.phi(IrType::I32, &[(one, left), (two, right)]);
    let sum = fb.add(first, first);
    let second = fb.phi(IrType::I32, &[(two, left), (one, right)]);
    let total = fb.add(sum, second);
    fb.ret(total);
    let f = fb.finish();
    let join = &f.blocks[join.index()];
    assert_eq!(join.instrs[0].result, Some(first));
    assert_eq!(join.instrs[1].result, Some(second));
    assert_eq!(f.blocks[left.index()].label, "left.1");
}

#[test]
fn finish_closes_open_blocks() {
    let mut fb = FunctionBuilder::new("f", vec![], IrType::Void);
    fb.ret_void();
    let dead = fb.append_block("after");
    fb.position_at_end(dead);
    let f = fb.finish();
    assert_eq!(f.blocks[1].terminator, Some(Terminator::Unreachable));
}

#[test]
fn int_cast_picks_the_instruction() {
    let mut fb = FunctionBuilder::new("f", vec![IrType::I32], IrType::Void);
    let p = fb.param(0);
    assert_eq!(fb.int_cast(p, IrType::I32, true), p);
    let wide = fb.int_cast(p, IrType::I64, true);
    let narrow = fb.int_cast(p, IrType::I8, false);
    fb.ret_void();
    let f = fb.finish();
    let ops: Vec<_> = f.blocks[0]
        .instrs
        .iter()
        .filter_map(|n| match &n.instr {
            Instr::Cast { op, .. } => Some(op.mnemonic()),
            _ => None,
        })
        .collect();
    assert_eq!(ops, vec!["sext", "trunc"]);
    assert_eq!(f.value(wide).ty, IrType::I64);
    assert_eq!(f.value(narrow).kind, ValueKind::Inst);
}

#[test]
fn struct_values_from_fields() {
    let mut fb = FunctionBuilder::new("f", vec![], IrType::Void);
    let re = fb.const_f32(1.5);
    let im = fb.const_f32(-2.0);
    let c = fb.build_struct(&[re, im]);
    assert_eq!(
        fb.type_of(c),
        &IrType::Struct(vec![IrType::Float, IrType::Float])
    );
    let back = fb.extract_value(c, 1);
    assert_eq!(fb.type_of(back), &IrType::Float);
    assert_eq!(fb.codegen_error_count(), 0);
}
