use pretty_assertions::assert_eq;

use super::{FunctionBuilder, Global, GlobalInit, IrType, Linkage, Module};

#[test]
fn prints_a_complete_module() {
    let mut module = Module::new("demo");
    module.target_triple = Some("x86_64-unknown-linux-gnu".to_string());
    let list = module
        .types
        .define("list_i32", vec![IrType::I32, IrType::I32, IrType::Ptr]);
    module.add_global(Global {
        name: "counter".to_string(),
        ty: IrType::I32,
        init: GlobalInit::Int(7),
        constant: false,
        linkage: Linkage::External,
    });
    let fmt = module.string_constant("%d\n");
    module.declare("_lfortran_printf", IrType::Void, vec![IrType::Ptr], true);

    let mut fb = FunctionBuilder::new("main", vec![], IrType::I32);
    let slot = fb.alloca(list.clone());
    let len_ptr = fb.struct_gep(&list, slot, 0);
    let counter = fb.global("counter");
    let n = fb.load(IrType::I32, counter);
    fb.store(n, len_ptr);
    let fmt_ptr = fb.global(&fmt);
    fb.call("_lfortran_printf", IrType::Void, &[fmt_ptr, n]);
    let zero = fb.const_i32(0);
    fb.ret(zero);
    module.add_function(fb.finish());

    let expected = "\
; ModuleID = 'demo'
source_filename = \"demo\"
target triple = \"x86_64-unknown-linux-gnu\"

%list_i32 = type { i32, i32, ptr }

@counter = global i32 7
@.str.0 = private constant [4 x i8] c\"%d\\0A\\00\"

declare void @_lfortran_printf(ptr, ...)

define i32 @main() {
entry:
  %v0 = alloca %list_i32
  %v3 = getelementptr %list_i32, ptr %v0, i32 0, i32 0
  %v5 = load i32, ptr %v4
  store i32 %v5, ptr %v3
  call void (ptr, ...) @_lfortran_printf(ptr @.str.0, i32 %v5)
  ret i32 0
}
";
    assert_eq!(module.to_llvm_ir(), expected);
}

#[test]
fn strings_are_shared() {
    let mut module = Module::new("m");
    let a = module.string_constant("abc");
    let b = module.string_constant("abc");
    let c = module.string_constant("abd");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(module.globals().len(), 2);
}

#[test]
fn defining_a_declared_function_drops_the_declaration() {
    let mut module = Module::new("m");
    module.declare("helper", IrType::I32, vec![IrType::I32], false);
    let mut fb = FunctionBuilder::new("helper", vec![IrType::I32], IrType::I32);
    let p = fb.param(0);
    fb.ret(p);
    module.add_function(fb.finish());
    module.declare("helper", IrType::I32, vec![IrType::I32], false);
    assert!(module.declarations().is_empty());
    let sig = module.signature("helper");
    assert_eq!(sig.map(|s| s.params), Some(vec![IrType::I32]));
}

#[test]
fn control_flow_and_floats_print() {
    let module = {
        let mut module = Module::new("m");
        let mut fb = FunctionBuilder::new("pick", vec![IrType::I1], IrType::Double)
            .with_linkage(Linkage::Internal);
        let cond = fb.param(0);
        let yes = fb.append_block("yes");
        let no = fb.append_block("no");
        fb.cond_br(cond, yes, no);
        fb.position_at_end(yes);
        let one = fb.const_f64(1.0);
        fb.ret(one);
        fb.position_at_end(no);
        let half = fb.const_f64(0.5);
        fb.ret(half);
        module.add_function(fb.finish());
        module
    };
    let text = module.to_llvm_ir();
    assert!(text.contains("define internal double @pick(i1 %v0) {"));
    assert!(text.contains("  br i1 %v0, label %yes.1, label %no.2"));
    assert!(text.contains("  ret double 0x3FF0000000000000"));
    assert!(text.contains("  ret double 0x3FE0000000000000"));
}
