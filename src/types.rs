//! Type descriptors and the traits tying Rust types to their archetypes.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::archetype::ArchetypeRef;
use crate::structure::Struct;

/// Reflected description of a Rust type: identity, display name and, when the
/// type is reflected, a way to reach its archetype.
///
/// Equality is type identity; the name is only for diagnostics.
#[derive(Clone, Copy)]
pub struct Type {
    id: TypeId,
    name: &'static str,
    archetype: Option<fn() -> ArchetypeRef>,
}

impl Type {
    /// Descriptor of any `'static` type, without archetype.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            archetype: None,
        }
    }

    /// Descriptor of a reflected type, carrying its archetype.
    pub fn reflected<T: Reflect>() -> Self {
        Self {
            archetype: Some(T::reflected_archetype),
            ..Self::of::<T>()
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn archetype(&self) -> Option<ArchetypeRef> {
        self.archetype.map(|archetype| archetype())
    }

    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A Rust type with a reflected archetype.
pub trait Reflect: 'static {
    fn reflected_archetype() -> ArchetypeRef;
}

/// A reflected struct instance that knows its own dynamic archetype.
///
/// # Safety
///
/// `dynamic_archetype` must return the archetype describing the concrete
/// type stored at `self`'s address, with field offsets and parent offsets
/// that are valid for that layout. Member access and invocation adjust raw
/// pointers based on this answer.
pub unsafe trait Object {
    fn dynamic_archetype(&self) -> &'static Struct;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_type_identity() {
        assert_eq!(Type::of::<u32>(), Type::of::<u32>());
        assert_ne!(Type::of::<u32>(), Type::of::<i32>());
        assert_ne!(Type::of::<&u32>(), Type::of::<u32>());
        assert!(Type::of::<String>().is::<String>());
    }

    #[test]
    fn reflected_type_exposes_archetype() {
        let ty = Type::reflected::<f32>();
        assert_eq!(ty, Type::of::<f32>());
        assert_eq!(ty.archetype().map(|archetype| archetype.name().to_owned()), Some("f32".to_owned()));
        assert!(Type::of::<Vec<u8>>().archetype().is_none());
    }
}
