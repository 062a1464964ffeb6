//! Namespaces and the fragment merge protocol.
//!
//! A namespace may be reopened in many places. Each reopening contributes a
//! [`NamespaceFragment`]; a [`NamespaceFragmentRegisterer`] merges the
//! fragment into the single shared [`Namespace`] for its name/id and
//! unmerges it again when dropped. The namespace counts its live fragments
//! and leaves the database when the last one goes away.
//!
//! Nested namespaces are contributed like any other entity: the fragment of
//! `A` lists the namespace produced by the registerer of `A::B`. When `A::B`
//! loses its last fragment first, it is detached from `A` at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::archetype::ArchetypeRef;
use crate::entity::{Entity, EntityInfo, EntityKind, EntityRef};
use crate::enumeration::Enum;
use crate::function::{Function, FunctionFlags};
use crate::registry::{Database, database};
use crate::structure::Struct;
use crate::variable::{VarFlags, Variable};
use crate::EntityId;

struct NamespaceMember {
    entity: EntityRef,
    contributions: usize,
}

/// A logical namespace, shared by every fragment that reopens it.
pub struct Namespace {
    info: EntityInfo,
    contents: RwLock<HashMap<String, Vec<NamespaceMember>>>,
    ref_count: AtomicUsize,
}

impl Namespace {
    pub(crate) fn new(name: impl Into<String>, id: EntityId) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            contents: RwLock::new(HashMap::new()),
            ref_count: AtomicUsize::new(0),
        }
    }

    /// Number of live fragments contributing to this namespace.
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(&self) -> usize {
        self.ref_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the remaining count.
    pub(crate) fn release(&self) -> usize {
        let previous = self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| Some(count.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    // =========================================================================
    // Merge
    // =========================================================================

    fn merge_entity(&self, entity: &EntityRef) {
        let mut contents = self.contents.write();
        let bucket = contents.entry(entity.name().to_owned()).or_default();
        match bucket.iter_mut().find(|member| member.entity.is(entity)) {
            Some(member) => member.contributions += 1,
            None => bucket.push(NamespaceMember {
                entity: entity.clone(),
                contributions: 1,
            }),
        }
    }

    /// Returns `true` when the last contribution of `entity` was removed.
    fn unmerge_entity(&self, entity: &EntityRef) -> bool {
        let mut contents = self.contents.write();
        let Some(bucket) = contents.get_mut(entity.name()) else {
            return false;
        };
        let Some(index) = bucket.iter().position(|member| member.entity.is(entity)) else {
            return false;
        };

        bucket[index].contributions -= 1;
        if bucket[index].contributions > 0 {
            return false;
        }
        bucket.remove(index);
        if bucket.is_empty() {
            contents.remove(entity.name());
        }
        true
    }

    /// Remove `entity` whatever its contribution count.
    pub(crate) fn detach_entity(&self, entity: &EntityRef) {
        let mut contents = self.contents.write();
        if let Some(bucket) = contents.get_mut(entity.name()) {
            bucket.retain(|member| !member.entity.is(entity));
            if bucket.is_empty() {
                contents.remove(entity.name());
            }
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn find<T>(&self, name: &str, cast: impl Fn(&EntityRef) -> Option<T>) -> Option<T> {
        self.contents
            .read()
            .get(name)?
            .iter()
            .find_map(|member| cast(&member.entity))
    }

    pub fn get_namespace_by_name(&self, name: &str) -> Option<Arc<Namespace>> {
        self.find(name, |entity| entity.as_namespace().cloned())
    }

    pub fn get_struct_by_name(&self, name: &str) -> Option<&'static Struct> {
        self.find(name, |entity| entity.as_struct().filter(|archetype| archetype.kind() == EntityKind::STRUCT))
    }

    pub fn get_class_by_name(&self, name: &str) -> Option<&'static Struct> {
        self.find(name, EntityRef::as_class)
    }

    pub fn get_enum_by_name(&self, name: &str) -> Option<&'static Enum> {
        self.find(name, EntityRef::as_enum)
    }

    pub fn get_archetype_by_name(&self, name: &str) -> Option<ArchetypeRef> {
        self.find(name, EntityRef::as_archetype)
    }

    pub fn get_variable_by_name(&self, name: &str, min_flags: VarFlags) -> Option<&'static Variable> {
        self.find(name, |entity| entity.as_variable().filter(|variable| variable.flags().contains(min_flags)))
    }

    pub fn get_function_by_name(&self, name: &str, min_flags: FunctionFlags) -> Option<&'static Function> {
        self.find(name, |entity| entity.as_function().filter(|function| function.flags().contains(min_flags)))
    }

    pub fn get_functions_by_name(&self, name: &str, min_flags: FunctionFlags) -> Vec<&'static Function> {
        self.contents
            .read()
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|member| member.entity.as_function())
            .filter(|function| function.flags().contains(min_flags))
            .collect()
    }

    /// Snapshot of everything currently merged into this namespace.
    pub fn nested_entities(&self) -> Vec<EntityRef> {
        self.contents
            .read()
            .values()
            .flatten()
            .map(|member| member.entity.clone())
            .collect()
    }

    pub fn foreach_nested_entity(&self, mut visitor: impl FnMut(&EntityRef) -> bool) -> bool {
        self.nested_entities().iter().all(|entity| visitor(entity))
    }
}

impl Entity for Namespace {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::NAMESPACE
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("ref_count", &self.ref_count())
            .field("entities", &self.contents.read().values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

// =============================================================================
// NamespaceFragment
// =============================================================================

/// One reopening of a namespace and what it declares.
pub struct NamespaceFragment {
    info: EntityInfo,
    nested: Vec<EntityRef>,
}

impl NamespaceFragment {
    pub fn new(name: impl Into<String>, id: EntityId) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            nested: Vec::new(),
        }
    }

    pub fn add_nested_entity(&mut self, entity: impl Into<EntityRef>) {
        self.nested.push(entity.into());
    }

    pub fn with_nested(mut self, entity: impl Into<EntityRef>) -> Self {
        self.add_nested_entity(entity);
        self
    }

    #[inline]
    pub fn nested_entities(&self) -> &[EntityRef] {
        &self.nested
    }

    pub fn foreach_nested_entity(&self, mut visitor: impl FnMut(&EntityRef) -> bool) -> bool {
        self.nested.iter().all(|entity| visitor(entity))
    }
}

impl Entity for NamespaceFragment {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::NAMESPACE
    }
}

impl fmt::Debug for NamespaceFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceFragment")
            .field("name", &self.name())
            .field("nested", &self.nested)
            .finish()
    }
}

// =============================================================================
// NamespaceFragmentRegisterer
// =============================================================================

/// Keeps one fragment merged into its namespace for as long as it lives.
///
/// File-level namespaces are indexed by name in the database; nested ones
/// only by id and reached through their parent namespace.
pub struct NamespaceFragmentRegisterer<'a> {
    db: &'a Database,
    fragment: &'a NamespaceFragment,
    namespace: Arc<Namespace>,
}

impl<'a> NamespaceFragmentRegisterer<'a> {
    /// Register into the process-wide database.
    pub fn new(fragment: &'a NamespaceFragment, file_level: bool) -> Self {
        Self::with_database(database(), fragment, file_level)
    }

    pub fn with_database(db: &'a Database, fragment: &'a NamespaceFragment, file_level: bool) -> Self {
        let namespace = db.generate_namespace(fragment.name(), fragment.id());
        let outer = EntityRef::Namespace(namespace.clone());

        for entity in &fragment.nested {
            namespace.merge_entity(entity);
            entity.info().set_outer_entity(Some(&outer));
        }
        for property in fragment.info.properties() {
            let _ = namespace.info.add_property(EntityKind::NAMESPACE, property, true);
        }

        namespace.acquire();

        if file_level {
            db.register_file_level_entity(outer.clone());
        } else {
            db.register_entity_id(outer.clone(), false);
        }
        for entity in fragment.nested.iter().filter(|entity| entity.as_namespace().is_none()) {
            db.register_entity_id(entity.clone(), true);
        }

        Self { db, fragment, namespace }
    }

    /// The shared namespace this fragment was merged into.
    #[inline]
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }
}

impl Drop for NamespaceFragmentRegisterer<'_> {
    fn drop(&mut self) {
        for entity in self.fragment.nested.iter().filter(|entity| entity.as_namespace().is_none()) {
            self.db.unregister_entity(entity, true);
        }

        for entity in &self.fragment.nested {
            if self.namespace.unmerge_entity(entity) {
                entity.info().clear_outer_entity_if(self.namespace.id());
            }
        }
        self.namespace.info.remove_properties(&self.fragment.info.properties());

        self.db.release_namespace(&self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::entity_id;
    use crate::property::{Property, PropertySettings};
    use crate::structure::StructCell;
    use std::any::Any;

    fn leak_struct(namespace: &str, name: &str) -> &'static Struct {
        let id = entity_id(&format!("{namespace}::{name}"));
        let archetype: &'static Struct = Box::leak(Box::new(Struct::new_struct(name, id, 4)));
        archetype.on_first_registration();
        archetype
    }

    #[test]
    fn two_fragments_share_one_namespace() {
        let db = Database::new();
        let position = leak_struct("math", "Position");
        let velocity = leak_struct("math", "Velocity");

        let first = NamespaceFragment::new("math", entity_id("math")).with_nested(position);
        let second = NamespaceFragment::new("math", entity_id("math")).with_nested(velocity);

        let a = NamespaceFragmentRegisterer::with_database(&db, &first, true);
        let b = NamespaceFragmentRegisterer::with_database(&db, &second, true);
        assert!(Arc::ptr_eq(a.namespace(), b.namespace()));
        assert_eq!(a.namespace().ref_count(), 2);

        let math = db.get_namespace_by_name("math").expect("well formed").expect("registered");
        assert!(math.get_struct_by_name("Position").is_some());
        assert!(math.get_struct_by_name("Velocity").is_some());
        assert!(position.outer_entity().is_some_and(|outer| outer.id() == math.id()));

        drop(b);
        assert!(math.get_struct_by_name("Velocity").is_none());
        assert!(velocity.outer_entity().is_none());
        assert!(db.get_entity_by_id(velocity.id()).is_none());
        assert!(db.get_namespace_by_name("math").expect("well formed").is_some());

        drop(a);
        assert!(db.get_namespace_by_name("math").expect("well formed").is_none());
        assert!(db.get_entity_by_id(entity_id("math")).is_none());
    }

    #[test]
    fn shared_entity_survives_until_last_contribution() {
        let db = Database::new();
        let shared = leak_struct("shared", "Thing");

        let first = NamespaceFragment::new("shared", entity_id("shared")).with_nested(shared);
        let second = NamespaceFragment::new("shared", entity_id("shared")).with_nested(shared);

        let a = NamespaceFragmentRegisterer::with_database(&db, &first, true);
        let b = NamespaceFragmentRegisterer::with_database(&db, &second, true);
        let namespace = a.namespace().clone();

        drop(a);
        assert!(namespace.get_struct_by_name("Thing").is_some());
        drop(b);
        assert!(namespace.get_struct_by_name("Thing").is_none());
        assert_eq!(namespace.ref_count(), 0);
    }

    struct Module;

    static MODULE: StructCell = StructCell::new();

    impl Property for Module {
        fn archetype(&self) -> &'static Struct {
            MODULE.get_or_init(|| Struct::new_struct("Module", entity_id("Module"), 0))
        }

        fn settings(&self) -> PropertySettings {
            PropertySettings::new(EntityKind::NAMESPACE)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn fragment_properties_follow_the_fragment() {
        let db = Database::new();
        let fragment = NamespaceFragment::new("tagged", entity_id("tagged"));
        fragment.add_property(Box::leak(Box::new(Module))).expect("namespace target");

        let registerer = NamespaceFragmentRegisterer::with_database(&db, &fragment, true);
        let namespace = registerer.namespace().clone();
        assert!(namespace.get_property::<Module>().is_some());

        drop(registerer);
        assert_eq!(namespace.property_count(), 0);
    }

    #[test]
    fn release_saturates_at_zero() {
        let namespace = Namespace::new("n", entity_id("n"));
        assert_eq!(namespace.acquire(), 1);
        assert_eq!(namespace.release(), 0);
        assert_eq!(namespace.release(), 0);
    }
}
