//! User-defined metadata attached to entities.
//!
//! A property is an instance of a reflected struct, leaked for the lifetime
//! of the process and attached by reference. Its [`PropertySettings`] decide
//! which entity kinds it may target, whether several instances of its type
//! may coexist on one entity and whether it propagates to derived types and
//! overriding methods.

use std::any::Any;

use crate::entity::EntityKind;
use crate::structure::Struct;

/// Rules governing where and how a property type may be attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertySettings {
    pub targets: EntityKind,
    pub allow_multiple: bool,
    pub should_inherit: bool,
}

impl PropertySettings {
    /// Settings targeting `targets`, single-instance and inheritable.
    pub const fn new(targets: EntityKind) -> Self {
        Self {
            targets,
            allow_multiple: false,
            should_inherit: true,
        }
    }

    pub const fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub const fn should_inherit(mut self, inherit: bool) -> Self {
        self.should_inherit = inherit;
        self
    }
}

/// A metadata object attachable to entities.
pub trait Property: Any + Send + Sync {
    /// Reflected archetype of the property's concrete type.
    fn archetype(&self) -> &'static Struct;

    fn settings(&self) -> PropertySettings;

    fn as_any(&self) -> &dyn Any;
}

/// Same instance.
#[inline]
pub(crate) fn same_property(a: &dyn Property, b: &dyn Property) -> bool {
    std::ptr::addr_eq(a as *const dyn Property, b as *const dyn Property)
}

/// Same concrete Rust type.
#[inline]
pub(crate) fn same_property_type(a: &dyn Property, b: &dyn Property) -> bool {
    a.as_any().type_id() == b.as_any().type_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::hash::entity_id;
    use crate::structure::StructCell;

    struct Tooltip(&'static str);

    static TOOLTIP: StructCell = StructCell::new();

    impl Property for Tooltip {
        fn archetype(&self) -> &'static Struct {
            TOOLTIP.get_or_init(|| Struct::new_struct("Tooltip", entity_id("Tooltip"), size_of::<Tooltip>()))
        }

        fn settings(&self) -> PropertySettings {
            PropertySettings::new(EntityKind::FIELD | EntityKind::METHOD)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn settings_defaults() {
        let settings = PropertySettings::new(EntityKind::STRUCT);
        assert!(!settings.allow_multiple);
        assert!(settings.should_inherit);

        let settings = settings.allow_multiple(true).should_inherit(false);
        assert!(settings.allow_multiple);
        assert!(!settings.should_inherit);
    }

    #[test]
    fn identity_and_type_comparison() {
        let a: &'static dyn Property = Box::leak(Box::new(Tooltip("a")));
        let b: &'static dyn Property = Box::leak(Box::new(Tooltip("b")));

        assert!(same_property(a, a));
        assert!(!same_property(a, b));
        assert!(same_property_type(a, b));
        assert_eq!(a.archetype().name(), "Tooltip");
        assert_eq!(a.as_any().downcast_ref::<Tooltip>().map(|t| t.0), Some("a"));
    }
}
