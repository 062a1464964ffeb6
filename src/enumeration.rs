//! Enums and their values.

use std::fmt;
use std::sync::{Once, OnceLock};

use crate::archetype::{Archetype, ArchetypeRef};
use crate::entity::{Entity, EntityInfo, EntityKind, EntityRef};
use crate::EntityId;

/// One named value. Several values may share an integer (aliases).
#[derive(Debug)]
pub struct EnumValue {
    info: EntityInfo,
    value: i64,
}

impl EnumValue {
    pub fn new(name: impl Into<String>, id: EntityId, value: i64) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            value,
        }
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl Entity for EnumValue {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::ENUM_VALUE
    }
}

/// A reflected enum.
pub struct Enum {
    archetype: Archetype,
    underlying: ArchetypeRef,
    values: Vec<EnumValue>,
}

impl Enum {
    /// `underlying` is the integer archetype backing the enum, e.g.
    /// `u8::reflected_archetype()`.
    pub fn new(name: impl Into<String>, id: EntityId, underlying: ArchetypeRef) -> Self {
        Self {
            archetype: Archetype::new(name, id, underlying.memory_size()),
            underlying,
            values: Vec::new(),
        }
    }

    #[inline]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    #[inline]
    pub fn underlying_type(&self) -> ArchetypeRef {
        self.underlying
    }

    pub fn add_enum_value(&mut self, name: impl Into<String>, id: EntityId, value: i64) -> &EnumValue {
        self.values.push(EnumValue::new(name, id, value));
        let index = self.values.len() - 1;
        &self.values[index]
    }

    /// Values in registration order.
    pub fn values(&self) -> impl Iterator<Item = &EnumValue> {
        self.values.iter()
    }

    #[inline]
    pub fn values_count(&self) -> usize {
        self.values.len()
    }

    pub fn get_enum_value(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.name() == name)
    }

    /// The first registered value equal to `value`.
    pub fn get_enum_value_by_value(&self, value: i64) -> Option<&EnumValue> {
        self.values.iter().find(|candidate| candidate.value == value)
    }

    /// Every value equal to `value`, aliases included, in registration order.
    pub fn get_enum_values(&self, value: i64) -> Vec<&EnumValue> {
        self.values.iter().filter(|candidate| candidate.value == value).collect()
    }

    pub fn foreach_enum_value(&self, mut visitor: impl FnMut(&EnumValue) -> bool) -> bool {
        self.values.iter().all(&mut visitor)
    }

    pub(crate) fn on_first_registration(&'static self) {
        let this = EntityRef::Enum(self);
        for value in &self.values {
            value.info.set_outer_entity(Some(&this));
        }
    }
}

impl Entity for Enum {
    #[inline]
    fn info(&self) -> &EntityInfo {
        self.archetype.info()
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::ENUM
    }
}

impl fmt::Debug for Enum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enum")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("underlying", &self.underlying.name())
            .field("values", &self.values.len())
            .finish()
    }
}

/// Lazily built, process-lifetime storage for one enum archetype.
pub struct EnumCell {
    cell: OnceLock<Enum>,
    registered: Once,
}

impl EnumCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            registered: Once::new(),
        }
    }

    pub fn get_or_init(&'static self, init: impl FnOnce() -> Enum) -> &'static Enum {
        let archetype = self.cell.get_or_init(init);
        self.registered.call_once(|| archetype.on_first_registration());
        archetype
    }

    pub fn get(&'static self) -> Option<&'static Enum> {
        self.cell.get().filter(|_| self.registered.is_completed())
    }
}

impl Default for EnumCell {
    fn default() -> Self {
        Self::new()
    }
}
