//! Hand-written registrations shared by the integration tests, shaped like
//! generated code.
//!
//! ```text
//! Named        Shape
//!     \        /
//!      Square          (Named at +0, Shape at +offset_of!(Square, shape))
//! ```

#![allow(dead_code)]

use std::mem::offset_of;
use std::sync::atomic::{AtomicUsize, Ordering};

use reflect_db::*;

// =============================================================================
// Rust types
// =============================================================================

#[repr(C)]
#[derive(Debug, Default)]
pub struct Named {
    pub id: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
pub struct Shape {
    pub sides: u32,
    pub scale: f32,
}

#[repr(C)]
#[derive(Debug, Default)]
pub struct Square {
    pub named: Named,
    pub shape: Shape,
    pub side: f32,
}

/// Number of times any `Shape` method body ran.
pub static SHAPE_CALLS: AtomicUsize = AtomicUsize::new(0);

pub fn shape_calls() -> usize {
    SHAPE_CALLS.load(Ordering::SeqCst)
}

// =============================================================================
// Thunks
// =============================================================================

unsafe fn shape_set_scale(this: *mut u8, (scale,): (f32,)) {
    SHAPE_CALLS.fetch_add(1, Ordering::SeqCst);
    let shape = unsafe { &mut *this.cast::<Shape>() };
    shape.scale = scale;
}

unsafe fn shape_sides(this: *const u8, (): ()) -> u32 {
    SHAPE_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { (*this.cast::<Shape>()).sides }
}

unsafe fn square_area(this: *const u8, (): ()) -> f32 {
    let square = unsafe { &*this.cast::<Square>() };
    square.side * square.side * square.shape.scale
}

fn shape_unit((): ()) -> Box<Shape> {
    Box::new(Shape { sides: 0, scale: 1.0 })
}

fn shape_with_sides((sides,): (u32,)) -> Box<Shape> {
    Box::new(Shape { sides, scale: 1.0 })
}

// =============================================================================
// Archetypes
// =============================================================================

static NAMED: StructCell = StructCell::new();
static SHAPE: StructCell = StructCell::new();
static SQUARE: StructCell = StructCell::new();

pub const NAMED_ID: EntityId = entity_id("geo::Named");
pub const SHAPE_ID: EntityId = entity_id("geo::Shape");
pub const SQUARE_ID: EntityId = entity_id("geo::Square");

pub fn named() -> &'static Struct {
    NAMED.get_or_init(|| {
        let mut archetype = Struct::new_struct("Named", NAMED_ID, size_of::<Named>());
        unsafe {
            archetype.add_field(Field::new(
                "id",
                member_id(NAMED_ID, "id", 0),
                Type::reflected::<u32>(),
                FieldFlags::PUBLIC,
                offset_of!(Named, id),
            ));
        }
        archetype
    })
}

pub fn shape() -> &'static Struct {
    SHAPE.get_or_init(|| {
        let mut archetype = Struct::new_class("Shape", SHAPE_ID, size_of::<Shape>());
        unsafe {
            archetype.add_field(Field::new(
                "sides",
                member_id(SHAPE_ID, "sides", 0),
                Type::reflected::<u32>(),
                FieldFlags::PROTECTED,
                offset_of!(Shape, sides),
            ));
            archetype.add_field(Field::new(
                "scale",
                member_id(SHAPE_ID, "scale", 0),
                Type::reflected::<f32>(),
                FieldFlags::PUBLIC,
                offset_of!(Shape, scale),
            ));
        }
        archetype.add_method(
            Method::new(
                "set_scale",
                member_id(SHAPE_ID, "set_scale", 0),
                MethodFlags::PUBLIC | MethodFlags::VIRTUAL,
                shape_set_scale as MethodThunk<(f32,), ()>,
            )
            .with_parameter_names(&["scale"]),
        );
        archetype.add_method(Method::new_const(
            "sides",
            member_id(SHAPE_ID, "sides", 1),
            MethodFlags::PUBLIC,
            shape_sides as ConstMethodThunk<(), u32>,
        ));
        archetype.set_default_instantiator(|| Box::new(Shape::default()));
        archetype.add_instantiator(StaticMethod::new(
            "unit",
            member_id(SHAPE_ID, "unit", 0),
            MethodFlags::PUBLIC,
            shape_unit as FreeThunk<(), Box<Shape>>,
        ));
        archetype.add_instantiator(StaticMethod::new(
            "with_sides",
            member_id(SHAPE_ID, "with_sides", 0),
            MethodFlags::PUBLIC,
            shape_with_sides as FreeThunk<(u32,), Box<Shape>>,
        ));
        archetype
    })
}

pub fn square() -> &'static Struct {
    SQUARE.get_or_init(|| {
        let mut archetype = Struct::new_class("Square", SQUARE_ID, size_of::<Square>());
        unsafe {
            archetype.add_direct_parent(named(), AccessSpecifier::Public, offset_of!(Square, named));
            archetype.add_direct_parent(shape(), AccessSpecifier::Public, offset_of!(Square, shape));
            archetype.add_field(Field::new(
                "side",
                member_id(SQUARE_ID, "side", 0),
                Type::reflected::<f32>(),
                FieldFlags::PUBLIC,
                offset_of!(Square, side),
            ));
        }
        archetype.add_method(Method::new_const(
            "area",
            member_id(SQUARE_ID, "area", 0),
            MethodFlags::PUBLIC,
            square_area as ConstMethodThunk<(), f32>,
        ));
        archetype
    })
}

// =============================================================================
// Object / Reflect
// =============================================================================

macro_rules! reflected {
    ($($ty:ty => $archetype:ident),* $(,)?) => {
        $(
            unsafe impl Object for $ty {
                fn dynamic_archetype(&self) -> &'static Struct {
                    $archetype()
                }
            }

            impl Reflect for $ty {
                fn reflected_archetype() -> ArchetypeRef {
                    ArchetypeRef::Struct($archetype())
                }
            }
        )*
    };
}

reflected! {
    Named => named,
    Shape => shape,
    Square => square,
}
