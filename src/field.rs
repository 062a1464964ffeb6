//! Fields and static fields of reflected structs.

use std::any::{Any, TypeId};
use std::sync::OnceLock;

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::entity::{Entity, EntityInfo, EntityKind};
use crate::error::InvocationError;
use crate::layout::sub_object_offset;
use crate::structure::Struct;
use crate::types::{Object, Type};
use crate::EntityId;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u8 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        const MUTABLE = 1 << 4;
    }
}

/// An instance field stored at a fixed offset inside its declaring struct.
#[derive(Debug)]
pub struct Field {
    info: EntityInfo,
    ty: Type,
    flags: FieldFlags,
    offset: usize,
    declaring: OnceLock<&'static Struct>,
}

impl Field {
    /// # Safety
    ///
    /// `offset` must be the byte offset of a properly aligned value of type
    /// `ty` inside every instance of the struct this field is added to.
    pub unsafe fn new(name: impl Into<String>, id: EntityId, ty: Type, flags: FieldFlags, offset: usize) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            ty,
            flags: flags - FieldFlags::STATIC,
            offset,
            declaring: OnceLock::new(),
        }
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    #[inline]
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Byte offset inside the declaring struct.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Struct that declares this field, once that struct is registered.
    #[inline]
    pub fn declaring_struct(&self) -> Option<&'static Struct> {
        self.declaring.get().copied()
    }

    pub(crate) fn bind(&'static self, owner: &'static Struct) {
        let _ = self.declaring.set(owner);
        self.info.set_outer_entity(Some(&owner.into()));
    }

    // -------------------------------------------------------------------------
    // Checked access
    // -------------------------------------------------------------------------

    /// Borrow the field inside `caller`.
    pub fn get<'a, T: 'static, C: Object + ?Sized>(&self, caller: &'a C) -> Result<&'a T, InvocationError> {
        let offset = self.checked_offset::<T>(caller.dynamic_archetype())?;
        let base = (caller as *const C).cast::<u8>();
        // SAFETY: `Object` guarantees the layout the offset was computed on,
        // and the value type was checked above.
        Ok(unsafe { &*base.add(offset).cast::<T>() })
    }

    /// Mutably borrow the field inside `caller`.
    pub fn get_mut<'a, T: 'static, C: Object + ?Sized>(&self, caller: &'a mut C) -> Result<&'a mut T, InvocationError> {
        let offset = self.checked_offset::<T>(caller.dynamic_archetype())?;
        let base = (caller as *mut C).cast::<u8>();
        // SAFETY: as in `get`, with exclusive access inherited from `caller`.
        Ok(unsafe { &mut *base.add(offset).cast::<T>() })
    }

    /// Overwrite the field inside `caller`, dropping the previous value.
    pub fn set<T: 'static, C: Object + ?Sized>(&self, caller: &mut C, value: T) -> Result<(), InvocationError> {
        *self.get_mut::<T, C>(caller)? = value;
        Ok(())
    }

    /// Read the field out of the raw bytes of an object whose dynamic
    /// archetype is `owner`. `Ok(None)` when `image` is too short.
    pub fn read_from_bytes<T: FromBytes + 'static>(
        &self,
        owner: &Struct,
        image: &[u8],
    ) -> Result<Option<T>, InvocationError> {
        let offset = self.checked_offset::<T>(owner)?;
        Ok(image
            .get(offset..)
            .and_then(|bytes| T::read_from_prefix(bytes).ok())
            .map(|(value, _)| value))
    }

    /// Write `value` into the raw bytes of an object whose dynamic archetype
    /// is `owner`. `Ok(false)` when `image` is too short.
    pub fn write_to_bytes<T: IntoBytes + Immutable + 'static>(
        &self,
        owner: &Struct,
        image: &mut [u8],
        value: &T,
    ) -> Result<bool, InvocationError> {
        let offset = self.checked_offset::<T>(owner)?;
        Ok(image
            .get_mut(offset..)
            .is_some_and(|bytes| value.write_to_prefix(bytes).is_ok()))
    }

    /// Offset of this field inside an object whose dynamic archetype is
    /// `dynamic`, after checking the value type and the caller.
    fn checked_offset<T: 'static>(&self, dynamic: &Struct) -> Result<usize, InvocationError> {
        if self.ty.type_id() != TypeId::of::<T>() {
            return Err(InvocationError::ValueTypeMismatch {
                member: self.info.name().to_owned(),
                expected: self.ty.name(),
                found: std::any::type_name::<T>(),
            });
        }

        let declaring = self.declaring_struct();
        declaring
            .and_then(|declaring| sub_object_offset(dynamic, declaring))
            .map(|sub_object| sub_object + self.offset)
            .ok_or_else(|| InvocationError::InvalidCaller {
                member: self.info.name().to_owned(),
                caller: dynamic.name().to_owned(),
                declaring: declaring.map_or("<unregistered>", |declaring| declaring.name()).to_owned(),
            })
    }

    // -------------------------------------------------------------------------
    // Unchecked access
    // -------------------------------------------------------------------------

    /// Borrow the field of the declaring-struct sub-object at `instance`.
    ///
    /// # Safety
    ///
    /// `instance` must point to a live instance of the declaring struct and
    /// `T` must be the field's type. The returned lifetime is unbounded.
    pub unsafe fn get_unchecked<'a, T>(&self, instance: *const u8) -> &'a T {
        unsafe { &*instance.add(self.offset).cast::<T>() }
    }

    /// # Safety
    ///
    /// As [`get_unchecked`](Self::get_unchecked), with exclusive access.
    pub unsafe fn get_unchecked_mut<'a, T>(&self, instance: *mut u8) -> &'a mut T {
        unsafe { &mut *instance.add(self.offset).cast::<T>() }
    }
}

impl Entity for Field {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::FIELD
    }
}

// =============================================================================
// StaticField
// =============================================================================

/// A field shared by every instance, backed by `'static` storage.
#[derive(Debug)]
pub struct StaticField {
    info: EntityInfo,
    ty: Type,
    flags: FieldFlags,
    value: &'static (dyn Any + Send + Sync),
    declaring: OnceLock<&'static Struct>,
}

impl StaticField {
    pub fn new<T: Any + Send + Sync>(
        name: impl Into<String>,
        id: EntityId,
        flags: FieldFlags,
        value: &'static T,
    ) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            ty: Type::of::<T>(),
            flags: flags | FieldFlags::STATIC,
            value,
            declaring: OnceLock::new(),
        }
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    #[inline]
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    #[inline]
    pub fn declaring_struct(&self) -> Option<&'static Struct> {
        self.declaring.get().copied()
    }

    pub(crate) fn bind(&'static self, owner: &'static Struct) {
        let _ = self.declaring.set(owner);
        self.info.set_outer_entity(Some(&owner.into()));
    }

    pub fn get<T: 'static>(&self) -> Result<&'static T, InvocationError> {
        let value: &'static (dyn Any + Send + Sync) = self.value;
        value.downcast_ref::<T>().ok_or_else(|| InvocationError::ValueTypeMismatch {
            member: self.info.name().to_owned(),
            expected: self.ty.name(),
            found: std::any::type_name::<T>(),
        })
    }
}

impl Entity for StaticField {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::FIELD
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::hash::{entity_id, member_id};
    use crate::structure::StructCell;

    #[repr(C)]
    #[derive(Default)]
    struct Stats {
        level: u16,
        health: u32,
    }

    static STATS: StructCell = StructCell::new();
    static SPAWNED: AtomicU32 = AtomicU32::new(3);

    fn stats() -> &'static Struct {
        STATS.get_or_init(|| {
            let id = entity_id("field_tests::Stats");
            let mut archetype = Struct::new_struct("Stats", id, size_of::<Stats>());
            unsafe {
                archetype.add_field(Field::new(
                    "level",
                    member_id(id, "level", 0),
                    Type::of::<u16>(),
                    FieldFlags::PUBLIC,
                    offset_of!(Stats, level),
                ));
                archetype.add_field(Field::new(
                    "health",
                    member_id(id, "health", 0),
                    Type::of::<u32>(),
                    FieldFlags::PRIVATE,
                    offset_of!(Stats, health),
                ));
            }
            archetype.add_static_field(StaticField::new(
                "spawned",
                member_id(id, "spawned", 0),
                FieldFlags::PUBLIC,
                &SPAWNED,
            ));
            archetype
        })
    }

    unsafe impl Object for Stats {
        fn dynamic_archetype(&self) -> &'static Struct {
            stats()
        }
    }

    fn field(name: &str) -> &'static Field {
        stats().get_field_by_name(name, FieldFlags::empty(), false).expect("field registered")
    }

    #[test]
    fn checked_get_and_set() {
        let mut value = Stats { level: 7, health: 90 };

        assert_eq!(field("level").get::<u16, _>(&value), Ok(&7));
        field("health").set(&mut value, 120u32).expect("set health");
        assert_eq!(value.health, 120);

        *field("level").get_mut::<u16, _>(&mut value).expect("level") += 1;
        assert_eq!(value.level, 8);
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let value = Stats::default();
        let err = field("health").get::<i32, _>(&value).unwrap_err();
        assert!(matches!(err, InvocationError::ValueTypeMismatch { .. }));
    }

    #[test]
    fn declaring_struct_is_bound() {
        let health = field("health");
        assert_eq!(health.declaring_struct().map(|owner| owner.id()), Some(stats().id()));
        assert_eq!(health.outer_entity().map(|outer| outer.id()), Some(stats().id()));
        assert!(!health.flags().contains(FieldFlags::STATIC));
    }

    #[test]
    fn byte_image_access() {
        let mut image = vec![0u8; size_of::<Stats>()];
        let health = field("health");

        assert_eq!(health.write_to_bytes(stats(), &mut image, &42u32), Ok(true));
        assert_eq!(health.read_from_bytes::<u32>(stats(), &image), Ok(Some(42)));
        assert_eq!(health.read_from_bytes::<u32>(stats(), &image[..2]), Ok(None));
        assert!(health.read_from_bytes::<u64>(stats(), &image).is_err());
    }

    #[test]
    fn unchecked_access() {
        let value = Stats { level: 2, health: 5 };
        let base = (&value as *const Stats).cast::<u8>();
        let health: &u32 = unsafe { field("health").get_unchecked(base) };
        assert_eq!(*health, 5);
    }

    #[test]
    fn static_field_value() {
        let spawned = stats().get_static_field_by_name("spawned", FieldFlags::empty(), false).expect("static");
        assert!(spawned.flags().contains(FieldFlags::STATIC));
        assert_eq!(spawned.get::<AtomicU32>().map(|v| v.load(Ordering::Relaxed)), Ok(3));
        assert!(spawned.get::<u32>().is_err());
    }
}
