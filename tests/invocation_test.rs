mod common;

use common::*;
use reflect_db::*;

fn method(owner: &'static Struct, name: &str) -> &'static Method {
    owner
        .get_method_by_name(name, MethodFlags::empty(), true)
        .unwrap_or_else(|| panic!("method {name} registered"))
}

fn square_value() -> Square {
    Square {
        named: Named { id: 7 },
        shape: Shape { sides: 4, scale: 1.0 },
        side: 3.0,
    }
}

// =============================================================================
// Address adjustment
// =============================================================================

#[test]
fn inherited_method_runs_on_the_parent_sub_object() {
    let mut value = square_value();

    let set_scale = method(square(), "set_scale");
    assert_eq!(set_scale.declaring_struct().map(|s| s.id()), Some(SHAPE_ID));

    set_scale
        .checked_invoke::<(f32,), (), _>(&mut value, (2.5,))
        .expect("Square derives from Shape");

    assert_eq!(value.shape.scale, 2.5);
    assert_eq!(value.named.id, 7);
    assert_eq!(value.side, 3.0);
}

#[test]
fn const_method_through_shared_reference() {
    let value = square_value();

    let sides = method(square(), "sides");
    assert_eq!(sides.checked_invoke_const::<(), u32, _>(&value, ()), Ok(4));

    let area = method(square(), "area");
    assert_eq!(area.checked_invoke_const::<(), f32, _>(&value, ()), Ok(9.0));
}

#[test]
fn unchecked_invoke_adjusts_through_object() {
    let mut value = square_value();
    let set_scale = method(shape(), "set_scale");

    unsafe { set_scale.invoke::<(f32,), (), _>(&mut value, (0.5,)) };
    assert_eq!(value.shape.scale, 0.5);
}

#[test]
fn unchecked_raw_invoke_uses_address_as_is() {
    let mut value = Shape { sides: 5, scale: 1.0 };
    let sides = method(shape(), "sides");

    let receiver = (&mut value as *mut Shape).cast::<u8>();
    assert_eq!(unsafe { sides.invoke_raw::<(), u32>(receiver, ()) }, 5);
}

#[test]
fn sub_object_offsets_follow_parent_edges() {
    assert_eq!(sub_object_offset(square(), named()), Some(0));
    assert_eq!(sub_object_offset(square(), shape()), Some(std::mem::offset_of!(Square, shape)));
    assert_eq!(sub_object_offset(shape(), square()), None);
}

// =============================================================================
// Checked invocation failures
// =============================================================================

#[test]
fn wrong_argument_count_performs_no_call() {
    let mut value = square_value();
    let set_scale = method(shape(), "set_scale");
    let before = shape_calls();

    let err = set_scale.checked_invoke::<(), (), _>(&mut value, ()).unwrap_err();
    assert!(matches!(err, InvocationError::ArgCountMismatch { expected: 1, found: 0, .. }));

    let err = set_scale.checked_invoke::<(f32, f32), (), _>(&mut value, (1.0, 2.0)).unwrap_err();
    assert!(matches!(err, InvocationError::ArgCountMismatch { expected: 1, found: 2, .. }));

    assert_eq!(shape_calls(), before);
    assert_eq!(value.shape.scale, 1.0);
}

#[test]
fn argument_and_return_types_are_strict() {
    let mut value = square_value();
    let set_scale = method(shape(), "set_scale");

    assert!(matches!(
        set_scale.checked_invoke::<(f64,), (), _>(&mut value, (2.0,)),
        Err(InvocationError::ArgTypeMismatch { index: 0, .. })
    ));
    assert!(matches!(
        set_scale.checked_invoke::<(f32,), bool, _>(&mut value, (2.0,)),
        Err(InvocationError::ReturnTypeMismatch { .. })
    ));
    assert_eq!(value.shape.scale, 1.0);
}

#[test]
fn unrelated_caller_is_rejected() {
    let mut unrelated = Named { id: 1 };
    let set_scale = method(shape(), "set_scale");
    let before = shape_calls();

    let err = set_scale.checked_invoke::<(f32,), (), _>(&mut unrelated, (2.0,)).unwrap_err();
    match err {
        InvocationError::InvalidCaller { caller, declaring, .. } => {
            assert_eq!(caller, "Named");
            assert_eq!(declaring, "Shape");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(shape_calls(), before);
}

#[test]
fn base_object_cannot_call_derived_method() {
    let shape_value = Shape::default();
    let area = method(square(), "area");

    assert!(matches!(
        area.checked_invoke_const::<(), f32, _>(&shape_value, ()),
        Err(InvocationError::InvalidCaller { .. })
    ));
}

#[test]
fn constness_must_match_the_call_path() {
    let mut value = square_value();

    let sides = method(shape(), "sides");
    assert!(matches!(
        sides.checked_invoke::<(), u32, _>(&mut value, ()),
        Err(InvocationError::ConstViolation { method_is_const: true, .. })
    ));

    let set_scale = method(shape(), "set_scale");
    assert!(matches!(
        set_scale.checked_invoke_const::<(f32,), (), _>(&value, (3.0,)),
        Err(InvocationError::ConstViolation { method_is_const: false, .. })
    ));
    assert_eq!(value.shape.scale, 1.0);
}

#[test]
fn signature_checks_come_before_caller_checks() {
    let mut unrelated = Named::default();
    let set_scale = method(shape(), "set_scale");

    assert!(matches!(
        set_scale.checked_invoke::<(u8,), (), _>(&mut unrelated, (1,)),
        Err(InvocationError::ArgTypeMismatch { .. })
    ));
}

// =============================================================================
// Fields and instantiation
// =============================================================================

#[test]
fn inherited_field_access_is_adjusted() {
    let mut value = square_value();

    let scale = square().get_field_by_name("scale", FieldFlags::PUBLIC, true).expect("inherited scale");
    assert_eq!(scale.get::<f32, _>(&value), Ok(&1.0));
    scale.set(&mut value, 4.0f32).expect("set scale");
    assert_eq!(value.shape.scale, 4.0);

    let id = square().get_field_by_name("id", FieldFlags::empty(), true).expect("inherited id");
    assert_eq!(id.get::<u32, _>(&value), Ok(&7));
}

#[test]
fn field_of_unrelated_struct_is_rejected() {
    let value = Named::default();
    let side = square().get_field_by_name("side", FieldFlags::empty(), false).expect("side");
    assert!(matches!(side.get::<f32, _>(&value), Err(InvocationError::InvalidCaller { .. })));
}

#[test]
fn instantiators() {
    let default = shape().make_instance::<Shape>().expect("default instantiator");
    assert_eq!(default.sides, 0);
    assert_eq!(default.scale, 0.0);

    let hexagon = shape().make_instance_with::<Shape, _>((6u32,)).expect("custom instantiator");
    assert_eq!(hexagon.sides, 6);
    assert_eq!(hexagon.scale, 1.0);

    assert!(shape().make_instance_with::<Shape, _>((6i64,)).is_none());
    assert!(square().make_instance::<Square>().is_none());
}

#[test]
fn parameter_metadata() {
    let set_scale = method(shape(), "set_scale");
    let parameters = set_scale.signature().parameters();
    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0].name(), "scale");
    assert_eq!(parameters[0].ty(), Type::of::<f32>());
    assert!(set_scale.signature().return_type().is::<()>());
}
