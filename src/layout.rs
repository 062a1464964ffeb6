//! Sub-object layout: locating a base sub-object inside a derived object.
//!
//! Every inheritance edge stores the byte offset of the parent sub-object
//! inside the child's layout. Moving from a derived address to a base
//! address sums the offsets along one path through the parent graph.
//!
//! ```text
//! Derived ─┬─ +0  ─▶ Left  ── +8 ─▶ Root
//!          └─ +16 ─▶ Right
//!
//! offset(Derived → Root) = 0 + 8
//! ```

use crate::entity::Entity;
use crate::structure::Struct;

/// Byte offset of the `base` sub-object inside an object whose dynamic
/// archetype is `derived`.
///
/// Identity is offset 0. Otherwise the parents of `derived` are walked depth
/// first in declaration order and the first path reaching `base` wins.
/// Returns `None` when `base` is not an ancestor of `derived`.
pub fn sub_object_offset(derived: &Struct, base: &Struct) -> Option<usize> {
    if derived.id() == base.id() {
        return Some(0);
    }

    derived.direct_parents().iter().find_map(|parent| {
        sub_object_offset(parent.archetype(), base).map(|rest| parent.offset() + rest)
    })
}

/// Shift `ptr`, the address of a `derived` object, to its `base` sub-object.
///
/// # Safety
///
/// `ptr` must point to a live object whose dynamic archetype is `derived`
/// and whose layout matches the offsets registered on `derived`.
pub unsafe fn adjust_ptr(ptr: *const u8, derived: &Struct, base: &Struct) -> Option<*const u8> {
    let offset = sub_object_offset(derived, base)?;
    // SAFETY: the offset lies inside the object per the caller's contract.
    Some(unsafe { ptr.add(offset) })
}

/// Mutable counterpart of [`adjust_ptr`].
///
/// # Safety
///
/// Same contract as [`adjust_ptr`].
pub unsafe fn adjust_ptr_mut(ptr: *mut u8, derived: &Struct, base: &Struct) -> Option<*mut u8> {
    let offset = sub_object_offset(derived, base)?;
    // SAFETY: as above.
    Some(unsafe { ptr.add(offset) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::AccessSpecifier;
    use crate::hash::entity_id;

    fn leak(archetype: Struct) -> &'static Struct {
        Box::leak(Box::new(archetype))
    }

    fn diamond() -> (&'static Struct, &'static Struct, &'static Struct, &'static Struct) {
        let root = leak(Struct::new_struct("Root", entity_id("layout::Root"), 8));

        let mut left = Struct::new_struct("Left", entity_id("layout::Left"), 16);
        let mut right = Struct::new_struct("Right", entity_id("layout::Right"), 24);
        unsafe {
            left.add_direct_parent(root, AccessSpecifier::Public, 8);
            right.add_direct_parent(root, AccessSpecifier::Public, 16);
        }
        let (left, right) = (leak(left), leak(right));

        let mut derived = Struct::new_struct("Derived", entity_id("layout::Derived"), 40);
        unsafe {
            derived.add_direct_parent(left, AccessSpecifier::Public, 0);
            derived.add_direct_parent(right, AccessSpecifier::Public, 16);
        }
        (root, left, right, leak(derived))
    }

    #[test]
    fn identity_is_zero() {
        let (root, ..) = diamond();
        assert_eq!(sub_object_offset(root, root), Some(0));
    }

    #[test]
    fn offsets_accumulate_along_path() {
        let (root, left, right, derived) = diamond();
        assert_eq!(sub_object_offset(derived, left), Some(0));
        assert_eq!(sub_object_offset(derived, right), Some(16));
        // left branch is declared first
        assert_eq!(sub_object_offset(derived, root), Some(8));
    }

    #[test]
    fn unrelated_has_no_offset() {
        let (root, left, right, derived) = diamond();
        assert_eq!(sub_object_offset(left, right), None);
        assert_eq!(sub_object_offset(root, derived), None);
    }

    #[test]
    fn pointer_adjustment() {
        let (_, _, right, derived) = diamond();
        let buffer = [0u8; 40];
        let base = buffer.as_ptr();

        let adjusted = unsafe { adjust_ptr(base, derived, right) };
        assert_eq!(adjusted, Some(base.wrapping_add(16)));

        let mut buffer = [0u8; 40];
        let base = buffer.as_mut_ptr();
        let adjusted = unsafe { adjust_ptr_mut(base, right, derived) };
        assert_eq!(adjusted, None);
    }
}
