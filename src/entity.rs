//! Entity model: the node shared by every reflected item.
//!
//! Every type, member, function, enum value and namespace carries an
//! [`EntityInfo`]: its id, its name, a back-reference to its lexical parent
//! and the properties attached to it. [`EntityRef`] is the cheap, cloneable
//! handle the database stores and hands out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::archetype::{ArchetypeRef, FundamentalArchetype};
use crate::enumeration::{Enum, EnumValue};
use crate::error::PropertyError;
use crate::field::{Field, StaticField};
use crate::function::{Function, Method, StaticMethod};
use crate::namespace::Namespace;
use crate::property::{Property, same_property, same_property_type};
use crate::structure::Struct;
use crate::variable::Variable;
use crate::EntityId;

bitflags! {
    /// Kind of a reflected entity. Used as a bitmask by property settings.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EntityKind: u16 {
        const NAMESPACE = 1 << 0;
        const CLASS = 1 << 1;
        const STRUCT = 1 << 2;
        const ENUM = 1 << 3;
        const ENUM_VALUE = 1 << 4;
        const FUNDAMENTAL_ARCHETYPE = 1 << 5;
        const VARIABLE = 1 << 6;
        const FIELD = 1 << 7;
        const FUNCTION = 1 << 8;
        const METHOD = 1 << 9;
    }
}

/// Lexical parent as stored. Namespaces are held weakly so that a namespace
/// can be dropped once its last fragment is gone.
#[derive(Clone)]
enum Outer {
    Entity(EntityRef),
    Namespace(Weak<Namespace>),
}

/// Data common to every entity.
pub struct EntityInfo {
    id: EntityId,
    name: String,
    outer: RwLock<Option<Outer>>,
    properties: RwLock<Vec<&'static dyn Property>>,
}

impl EntityInfo {
    pub fn new(name: impl Into<String>, id: EntityId) -> Self {
        Self {
            id,
            name: name.into(),
            outer: RwLock::new(None),
            properties: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lexical or nesting parent, if any.
    pub fn outer_entity(&self) -> Option<EntityRef> {
        match self.outer.read().as_ref()? {
            Outer::Entity(entity) => Some(entity.clone()),
            Outer::Namespace(namespace) => namespace.upgrade().map(EntityRef::Namespace),
        }
    }

    pub(crate) fn set_outer_entity(&self, outer: Option<&EntityRef>) {
        *self.outer.write() = outer.map(|entity| match entity {
            EntityRef::Namespace(namespace) => Outer::Namespace(Arc::downgrade(namespace)),
            other => Outer::Entity(other.clone()),
        });
    }

    /// Clear the outer entity only if it is still `outer`.
    pub(crate) fn clear_outer_entity_if(&self, outer: EntityId) {
        let mut slot = self.outer.write();
        let matches = match slot.as_ref() {
            Some(Outer::Entity(entity)) => entity.id() == outer,
            Some(Outer::Namespace(namespace)) => {
                namespace.upgrade().is_none_or(|namespace| namespace.info().id() == outer)
            }
            None => false,
        };
        if matches {
            *slot = None;
        }
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    /// Attach `property` to this entity of kind `kind`.
    ///
    /// Fails when the property's target mask does not include `kind` (unless
    /// `allow_kind_override`), or when a property of the same concrete type is
    /// already attached and the settings forbid multiple instances. On failure
    /// nothing is attached.
    pub fn add_property(
        &self,
        kind: EntityKind,
        property: &'static dyn Property,
        allow_kind_override: bool,
    ) -> Result<(), PropertyError> {
        let settings = property.settings();

        if !allow_kind_override && !settings.targets.intersects(kind) {
            let err = PropertyError::InvalidTarget {
                property: property.archetype().info().name().to_owned(),
                entity: self.name.clone(),
                kind,
            };
            debug!(entity = %self.name, %err, "property rejected");
            return Err(err);
        }

        let mut properties = self.properties.write();
        if !settings.allow_multiple
            && properties.iter().any(|attached| same_property_type(*attached, property))
        {
            let err = PropertyError::DuplicateProperty {
                property: property.archetype().info().name().to_owned(),
                entity: self.name.clone(),
            };
            debug!(entity = %self.name, %err, "property rejected");
            return Err(err);
        }

        properties.push(property);
        Ok(())
    }

    /// Copy every inheritable property of `base` onto this entity.
    ///
    /// Properties already present (same instance, or same type when multiple
    /// instances are not allowed) are skipped.
    pub(crate) fn inherit_properties_from(&self, kind: EntityKind, base: &EntityInfo) {
        for property in base.properties() {
            if !property.settings().should_inherit {
                continue;
            }
            if self.properties.read().iter().any(|attached| same_property(*attached, property)) {
                continue;
            }
            // a single-instance property already attached here wins over the inherited one
            if let Err(err) = self.add_property(kind, property, true) {
                trace!(entity = %self.name(), %err, "inherited property skipped");
            }
        }
    }

    /// Detach one occurrence of each listed property instance.
    pub(crate) fn remove_properties(&self, removed: &[&'static dyn Property]) {
        let mut properties = self.properties.write();
        for property in removed {
            if let Some(index) = properties.iter().position(|attached| same_property(*attached, *property)) {
                properties.remove(index);
            }
        }
    }

    /// Snapshot of the attached properties, in attachment order.
    pub fn properties(&self) -> Vec<&'static dyn Property> {
        self.properties.read().clone()
    }

    #[inline]
    pub fn property_count(&self) -> usize {
        self.properties.read().len()
    }

    /// First attached property whose concrete type is exactly `P`.
    pub fn get_property<P: Property>(&self) -> Option<&'static P> {
        self.properties
            .read()
            .iter()
            .find_map(|property| property.as_any().downcast_ref::<P>())
    }

    /// Every attached property whose concrete type is exactly `P`.
    pub fn get_properties<P: Property>(&self) -> Vec<&'static P> {
        self.properties
            .read()
            .iter()
            .filter_map(|property| property.as_any().downcast_ref::<P>())
            .collect()
    }

    /// First property whose archetype is `archetype`, or derives from it when
    /// `is_child_class_valid`.
    pub fn get_property_by_archetype(
        &self,
        archetype: &Struct,
        is_child_class_valid: bool,
    ) -> Option<&'static dyn Property> {
        self.get_property_by_predicate(|property| {
            property_matches(property, archetype, is_child_class_valid)
        })
    }

    /// Every property whose archetype is `archetype` (or derives from it).
    pub fn get_properties_by_archetype(
        &self,
        archetype: &Struct,
        is_child_class_valid: bool,
    ) -> Vec<&'static dyn Property> {
        self.properties
            .read()
            .iter()
            .copied()
            .filter(|property| property_matches(*property, archetype, is_child_class_valid))
            .collect()
    }

    pub fn get_property_by_predicate(
        &self,
        mut predicate: impl FnMut(&'static dyn Property) -> bool,
    ) -> Option<&'static dyn Property> {
        self.properties.read().iter().copied().find(|property| predicate(*property))
    }
}

fn property_matches(property: &dyn Property, archetype: &Struct, is_child_class_valid: bool) -> bool {
    let actual = property.archetype();
    if is_child_class_valid {
        archetype.is_base_of(actual)
    } else {
        actual.info().id() == archetype.info().id()
    }
}

impl fmt::Debug for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("properties", &self.property_count())
            .finish()
    }
}

// =============================================================================
// Entity trait
// =============================================================================

/// Common accessors of every reflected node.
pub trait Entity {
    fn info(&self) -> &EntityInfo;

    fn kind(&self) -> EntityKind;

    #[inline]
    fn id(&self) -> EntityId {
        self.info().id()
    }

    #[inline]
    fn name(&self) -> &str {
        self.info().name()
    }

    fn outer_entity(&self) -> Option<EntityRef> {
        self.info().outer_entity()
    }

    /// Attach a property, validating it against this entity's kind.
    fn add_property(&self, property: &'static dyn Property) -> Result<(), PropertyError> {
        self.info().add_property(self.kind(), property, false)
    }

    /// Attach a property without checking its target mask.
    fn add_property_overriding_kind(&self, property: &'static dyn Property) -> Result<(), PropertyError> {
        self.info().add_property(self.kind(), property, true)
    }

    fn get_property<P: Property>(&self) -> Option<&'static P>
    where
        Self: Sized,
    {
        self.info().get_property::<P>()
    }

    fn get_properties<P: Property>(&self) -> Vec<&'static P>
    where
        Self: Sized,
    {
        self.info().get_properties::<P>()
    }

    fn property_count(&self) -> usize {
        self.info().property_count()
    }
}

// =============================================================================
// EntityRef
// =============================================================================

/// Handle to any registered entity.
///
/// Everything except namespaces lives for the whole process; namespaces are
/// shared between fragments and reference counted.
#[derive(Clone)]
pub enum EntityRef {
    Namespace(Arc<Namespace>),
    Struct(&'static Struct),
    Enum(&'static Enum),
    EnumValue(&'static EnumValue),
    Fundamental(&'static FundamentalArchetype),
    Field(&'static Field),
    StaticField(&'static StaticField),
    Method(&'static Method),
    StaticMethod(&'static StaticMethod),
    Variable(&'static Variable),
    Function(&'static Function),
}

macro_rules! each_entity {
    ($value:expr, $bound:ident => $body:expr) => {
        match $value {
            EntityRef::Namespace($bound) => $body,
            EntityRef::Struct($bound) => $body,
            EntityRef::Enum($bound) => $body,
            EntityRef::EnumValue($bound) => $body,
            EntityRef::Fundamental($bound) => $body,
            EntityRef::Field($bound) => $body,
            EntityRef::StaticField($bound) => $body,
            EntityRef::Method($bound) => $body,
            EntityRef::StaticMethod($bound) => $body,
            EntityRef::Variable($bound) => $body,
            EntityRef::Function($bound) => $body,
        }
    };
}

impl EntityRef {
    pub fn info(&self) -> &EntityInfo {
        each_entity!(self, entity => entity.info())
    }

    pub fn kind(&self) -> EntityKind {
        each_entity!(self, entity => entity.kind())
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.info().id()
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.info().name()
    }

    /// Same entity. Ids are unique across the graph, except that a namespace
    /// reopened after its last fragment left is a new object under the old id.
    #[inline]
    pub fn is(&self, other: &EntityRef) -> bool {
        match (self, other) {
            (Self::Namespace(a), Self::Namespace(b)) => Arc::ptr_eq(a, b),
            _ => self.id() == other.id() && self.kind() == other.kind(),
        }
    }

    pub fn as_namespace(&self) -> Option<&Arc<Namespace>> {
        match self {
            Self::Namespace(namespace) => Some(namespace),
            _ => None,
        }
    }

    /// Struct or class.
    pub fn as_struct(&self) -> Option<&'static Struct> {
        match self {
            Self::Struct(archetype) => Some(*archetype),
            _ => None,
        }
    }

    /// Class only.
    pub fn as_class(&self) -> Option<&'static Struct> {
        self.as_struct().filter(|archetype| archetype.kind() == EntityKind::CLASS)
    }

    pub fn as_enum(&self) -> Option<&'static Enum> {
        match self {
            Self::Enum(archetype) => Some(*archetype),
            _ => None,
        }
    }

    pub fn as_enum_value(&self) -> Option<&'static EnumValue> {
        match self {
            Self::EnumValue(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_fundamental(&self) -> Option<&'static FundamentalArchetype> {
        match self {
            Self::Fundamental(archetype) => Some(*archetype),
            _ => None,
        }
    }

    pub fn as_archetype(&self) -> Option<ArchetypeRef> {
        match self {
            Self::Struct(archetype) => Some(ArchetypeRef::Struct(*archetype)),
            Self::Enum(archetype) => Some(ArchetypeRef::Enum(*archetype)),
            Self::Fundamental(archetype) => Some(ArchetypeRef::Fundamental(*archetype)),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&'static Field> {
        match self {
            Self::Field(field) => Some(*field),
            _ => None,
        }
    }

    pub fn as_static_field(&self) -> Option<&'static StaticField> {
        match self {
            Self::StaticField(field) => Some(*field),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&'static Method> {
        match self {
            Self::Method(method) => Some(*method),
            _ => None,
        }
    }

    pub fn as_static_method(&self) -> Option<&'static StaticMethod> {
        match self {
            Self::StaticMethod(method) => Some(*method),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&'static Variable> {
        match self {
            Self::Variable(variable) => Some(*variable),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&'static Function> {
        match self {
            Self::Function(function) => Some(*function),
            _ => None,
        }
    }

    /// Entities owned by this one and indexed by id along with it.
    ///
    /// Namespaces return nothing: their contents are registered by the
    /// fragments that contribute them.
    pub(crate) fn sub_entities(&self) -> Vec<EntityRef> {
        match self {
            Self::Struct(archetype) => {
                let archetype: &'static Struct = *archetype;
                let mut out: Vec<EntityRef> = Vec::new();
                out.extend(archetype.fields().map(EntityRef::Field));
                out.extend(archetype.static_fields().map(EntityRef::StaticField));
                out.extend(archetype.methods().map(EntityRef::Method));
                out.extend(archetype.static_methods().map(EntityRef::StaticMethod));
                out.extend(archetype.nested_archetypes().map(|nested| nested.archetype().into()));
                out
            }
            Self::Enum(archetype) => {
                let archetype: &'static Enum = *archetype;
                archetype.values().map(EntityRef::EnumValue).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}#{:#x})", self.kind(), self.name(), self.id())
    }
}

impl From<Arc<Namespace>> for EntityRef {
    fn from(namespace: Arc<Namespace>) -> Self {
        Self::Namespace(namespace)
    }
}

impl From<ArchetypeRef> for EntityRef {
    fn from(archetype: ArchetypeRef) -> Self {
        match archetype {
            ArchetypeRef::Struct(archetype) => Self::Struct(archetype),
            ArchetypeRef::Enum(archetype) => Self::Enum(archetype),
            ArchetypeRef::Fundamental(archetype) => Self::Fundamental(archetype),
        }
    }
}

macro_rules! entity_ref_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<&'static $ty> for EntityRef {
                fn from(entity: &'static $ty) -> Self {
                    Self::$variant(entity)
                }
            }
        )*
    };
}

entity_ref_from! {
    Struct => Struct,
    Enum => Enum,
    EnumValue => EnumValue,
    FundamentalArchetype => Fundamental,
    Field => Field,
    StaticField => StaticField,
    Method => Method,
    StaticMethod => StaticMethod,
    Variable => Variable,
    Function => Function,
}

// =============================================================================
// NameBag
// =============================================================================

/// Declarations in registration order, indexed by name.
///
/// Several declarations may share a name (overloads, shadowing); lookups
/// return them in registration order.
pub(crate) struct NameBag<T> {
    items: Vec<T>,
    by_name: HashMap<String, Vec<usize>>,
}

impl<T> Default for NameBag<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T: Entity> NameBag<T> {
    pub(crate) fn push(&mut self, item: T) -> &T {
        let index = self.items.len();
        self.by_name.entry(item.name().to_owned()).or_default().push(index);
        self.items.push(item);
        &self.items[index]
    }

    pub(crate) fn named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a T> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|&index| &self.items[index])
    }

    #[inline]
    pub(crate) fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
