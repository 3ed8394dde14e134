use pretty_assertions::assert_eq;

use lfort_ir::{Abi, ArrayPhysicalType, AsrBuilder, Dimension, Span, StructKind, Ty};

use super::UseSite;
use crate::context::CodegenCx;
use crate::error::CodegenError;
use crate::ir::IrType;
use crate::options::{LoweringOptions, Platform};

fn fixed(b: &mut AsrBuilder, element: Ty, extents: &[i64]) -> Ty {
    let dims: Vec<Dimension> = extents
        .iter()
        .map(|&n| {
            let one = b.i32(1);
            let end = b.i32(n);
            Dimension::new(Some(one), Some(end))
        })
        .collect();
    Ty::array(element, dims, ArrayPhysicalType::FixedSizeArray)
}

#[test]
fn scalars_follow_their_kind() {
    let unit = AsrBuilder::new().finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);
    let span = Span::DUMMY;
    assert_eq!(cx.storage_type(&Ty::integer(1), span), Ok(IrType::I8));
    assert_eq!(cx.storage_type(&Ty::integer(8), span), Ok(IrType::I64));
    assert_eq!(cx.storage_type(&Ty::f32(), span), Ok(IrType::Float));
    assert_eq!(cx.storage_type(&Ty::logical(), span), Ok(IrType::I1));
    assert_eq!(cx.storage_type(&Ty::string(), span), Ok(IrType::Ptr));
    assert_eq!(
        cx.storage_type(&Ty::complex(8), span),
        Ok(IrType::Struct(vec![IrType::Double, IrType::Double]))
    );
    assert_eq!(
        cx.storage_type(&Ty::allocatable(Ty::i32()), span),
        Ok(IrType::I32)
    );
    assert!(matches!(
        cx.storage_type(&Ty::integer(3), span),
        Err(CodegenError::Unsupported { .. })
    ));
}

#[test]
fn tuples_are_literal_structs() {
    let unit = AsrBuilder::new().finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);
    let ty = Ty::tuple(vec![Ty::i32(), Ty::string(), Ty::f64()]);
    assert_eq!(
        cx.storage_type(&ty, Span::DUMMY),
        Ok(IrType::Struct(vec![IrType::I32, IrType::Ptr, IrType::Double]))
    );
}

#[test]
fn arrays_by_physical_type() {
    let mut b = AsrBuilder::new();
    let matrix = fixed(&mut b, Ty::f64(), &[3, 4]);
    let dims = [Dimension::deferred()];
    let descriptor = Ty::array(Ty::i32(), dims, ArrayPhysicalType::DescriptorArray);
    let raw = Ty::array(Ty::i32(), dims, ArrayPhysicalType::PointerToDataArray);
    let unit = b.finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);
    let span = Span::DUMMY;

    assert_eq!(
        cx.storage_type(&matrix, span),
        Ok(IrType::array(12, IrType::Double))
    );
    assert_eq!(cx.storage_type(&raw, span), Ok(IrType::Ptr));
    let desc = cx.storage_type(&descriptor, span).unwrap();
    assert_eq!(desc, cx.array_descriptor(1));
    // data, offset, dims, allocated
    assert_eq!(cx.module.types.fields(&desc).map(<[IrType]>::len), Some(4));

    let layout = cx
        .type_layout(&matrix, Abi::Source, UseSite::Value, span)
        .unwrap();
    assert_eq!(layout.element_size, 8);
    assert!(!layout.is_descriptor);
    assert!(cx
        .type_layout(&descriptor, Abi::Source, UseSite::Value, span)
        .unwrap()
        .is_descriptor);
}

#[test]
fn fixed_size_arrays_need_constant_extents() {
    let mut b = AsrBuilder::new();
    let scope = b.global();
    let n = b.variable(scope, "n", Ty::i32());
    let one = b.i32(1);
    let end = b.var(n);
    let ty = Ty::array(
        Ty::i32(),
        [Dimension::new(Some(one), Some(end))],
        ArrayPhysicalType::FixedSizeArray,
    );
    let unit = b.finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);
    assert!(matches!(
        cx.storage_type(&ty, Span::DUMMY),
        Err(CodegenError::Unsupported { .. })
    ));
}

#[test]
fn derived_types_embed_their_parent_first() {
    let mut b = AsrBuilder::new();
    let scope = b.global();
    let (base, _) = b.struct_type(scope, "base", StructKind::Struct, None, vec![("id", Ty::i64())]);
    let (child, _) = b.struct_type(
        scope,
        "child",
        StructKind::Struct,
        Some(base),
        vec![("x", Ty::f64()), ("name", Ty::string())],
    );
    let unit = b.finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);

    let child_layout = cx.struct_layout(child, Span::DUMMY).unwrap();
    let base_layout = cx.struct_layout(base, Span::DUMMY).unwrap();
    assert_eq!(child_layout.parent, Some(base));
    assert_eq!(child_layout.field("x"), Some(1));
    assert_eq!(child_layout.field("name"), Some(2));
    // Inherited members are reached through the parent.
    assert_eq!(child_layout.field("id"), None);
    assert_eq!(
        cx.module.types.fields(&child_layout.ty),
        Some(&[base_layout.ty.clone(), IrType::Double, IrType::Ptr][..])
    );
    assert_eq!(cx.module.types.size_of(&child_layout.ty), 24);
}

#[test]
fn unions_overlay_their_members() {
    let mut b = AsrBuilder::new();
    let scope = b.global();
    let (u, _) = b.struct_type(
        scope,
        "u",
        StructKind::Union,
        None,
        vec![("i", Ty::i32()), ("z", Ty::complex(8)), ("b", Ty::logical())],
    );
    let unit = b.finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);
    let layout = cx.struct_layout(u, Span::DUMMY).unwrap();
    assert_eq!(layout.field("i"), Some(0));
    assert_eq!(layout.field("z"), Some(0));
    assert_eq!(cx.module.types.size_of(&layout.ty), 16);
}

#[test]
fn struct_layouts_are_memoized() {
    let mut b = AsrBuilder::new();
    let scope = b.global();
    let (point, _) = b.struct_type(
        scope,
        "point",
        StructKind::Struct,
        None,
        vec![("x", Ty::f32()), ("y", Ty::f32())],
    );
    let unit = b.finish();
    let options = LoweringOptions::default();
    let mut cx = CodegenCx::new(&unit, &options);
    let first = cx.storage_type(&Ty::Struct(point), Span::DUMMY).unwrap();
    let second = cx.storage_type(&Ty::Struct(point), Span::DUMMY).unwrap();
    assert_eq!(first, second);
    assert_eq!(cx.module.types.iter().filter(|(_, name, _)| name.contains("point")).count(), 1);
}

#[test]
fn dummy_arguments_travel_by_reference() {
    let unit = AsrBuilder::new().finish();
    let options = LoweringOptions::default().with_platform(Platform::Linux);
    let mut cx = CodegenCx::new(&unit, &options);
    let span = Span::DUMMY;
    let by_ref = cx
        .type_layout(&Ty::f64(), Abi::Source, UseSite::Argument { by_value: false }, span)
        .unwrap();
    assert!(by_ref.by_reference);
    assert_eq!(by_ref.ty, IrType::Ptr);
    assert_eq!(by_ref.storage, IrType::Double);

    let by_value = cx
        .type_layout(&Ty::f64(), Abi::Source, UseSite::Argument { by_value: true }, span)
        .unwrap();
    assert!(!by_value.by_reference);
    assert_eq!(by_value.ty, IrType::Double);
}

#[test]
fn bind_c_complex_values_follow_the_platform() {
    let unit = AsrBuilder::new().finish();
    let span = Span::DUMMY;
    let site = UseSite::Argument { by_value: true };
    let cases = [
        (Platform::Linux, 4, IrType::vector(2, IrType::Float), false),
        (Platform::MacosArm, 4, IrType::array(2, IrType::Float), false),
        (Platform::Windows, 4, IrType::I64, false),
        (Platform::Windows, 8, IrType::Ptr, true),
        (
            Platform::Linux,
            8,
            IrType::Struct(vec![IrType::Double, IrType::Double]),
            false,
        ),
    ];
    for (platform, kind, boundary, by_reference) in cases {
        let options = LoweringOptions::default().with_platform(platform);
        let mut cx = CodegenCx::new(&unit, &options);
        let layout = cx
            .type_layout(&Ty::complex(kind), Abi::BindC, site, span)
            .unwrap();
        assert_eq!(layout.ty, boundary, "{platform:?} complex({kind})");
        assert_eq!(layout.by_reference, by_reference);
        // Source procedures never leave the native pair.
        let native = cx
            .type_layout(&Ty::complex(kind), Abi::Source, site, span)
            .unwrap();
        assert_eq!(native.ty, native.storage);
    }
}
