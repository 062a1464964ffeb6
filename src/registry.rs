//! Registration database: id and name indices over every reflected entity.
//!
//! Provides:
//! - id → entity lookup covering nested members, nested types and enum values
//! - name lookup for file-level namespaces, structs, classes, enums,
//!   variables, functions and fundamental archetypes
//! - qualified namespace resolution (`"a::b::c"`)
//! - shared namespace generation with fragment reference counting
//!
//! One process-wide instance lives behind [`database()`]; independent
//! instances can be built with [`Database::new`].

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::archetype::{ArchetypeRef, FundamentalArchetype, fundamental_archetypes};
use crate::entity::{Entity, EntityKind, EntityRef};
use crate::enumeration::{Enum, EnumValue};
use crate::error::LookupError;
use crate::field::{Field, StaticField};
use crate::function::{Function, FunctionFlags, Method, StaticMethod};
use crate::namespace::Namespace;
use crate::structure::Struct;
use crate::variable::{VarFlags, Variable};
use crate::EntityId;

static DATABASE: LazyLock<Database> = LazyLock::new(Database::new);

/// The process-wide database, created on first access.
pub fn database() -> &'static Database {
    &DATABASE
}

#[derive(Default)]
struct Tables {
    entities_by_id: HashMap<EntityId, EntityRef>,
    namespaces_by_name: HashMap<String, Arc<Namespace>>,
    structs_by_name: HashMap<String, &'static Struct>,
    classes_by_name: HashMap<String, &'static Struct>,
    enums_by_name: HashMap<String, &'static Enum>,
    variables_by_name: HashMap<String, &'static Variable>,
    functions_by_name: HashMap<String, Vec<&'static Function>>,
    fundamentals_by_name: HashMap<String, &'static FundamentalArchetype>,
    /// Shared namespaces handed out to fragments, by namespace id.
    generated_namespaces: HashMap<EntityId, Arc<Namespace>>,
}

impl Tables {
    fn insert_id(&mut self, entity: EntityRef, recursive: bool) {
        if recursive {
            for sub_entity in entity.sub_entities() {
                self.insert_id(sub_entity, true);
            }
        }
        trace!(id = entity.id(), name = %entity.name(), "entity indexed");
        self.entities_by_id.insert(entity.id(), entity);
    }

    fn remove_id(&mut self, entity: &EntityRef, recursive: bool) {
        if recursive {
            for sub_entity in entity.sub_entities() {
                self.remove_id(&sub_entity, true);
            }
        }
        let indexed = self.entities_by_id.get(&entity.id()).is_some_and(|indexed| indexed.is(entity));
        if indexed {
            trace!(id = entity.id(), name = %entity.name(), "entity unindexed");
            self.entities_by_id.remove(&entity.id());
        }
    }

    fn insert_name(&mut self, entity: &EntityRef) {
        let name = entity.name().to_owned();
        match entity {
            EntityRef::Namespace(namespace) => {
                self.namespaces_by_name.insert(name, namespace.clone());
            }
            &EntityRef::Struct(archetype) if archetype.kind() == EntityKind::CLASS => {
                self.classes_by_name.insert(name, archetype);
            }
            &EntityRef::Struct(archetype) => {
                self.structs_by_name.insert(name, archetype);
            }
            &EntityRef::Enum(archetype) => {
                self.enums_by_name.insert(name, archetype);
            }
            &EntityRef::Fundamental(archetype) => {
                self.fundamentals_by_name.insert(name, archetype);
            }
            &EntityRef::Variable(variable) => {
                self.variables_by_name.insert(name, variable);
            }
            &EntityRef::Function(function) => {
                let bucket = self.functions_by_name.entry(name).or_default();
                if !bucket.iter().any(|existing| existing.id() == function.id()) {
                    bucket.push(function);
                }
            }
            // members are reached through their owner
            EntityRef::EnumValue(_)
            | EntityRef::Field(_)
            | EntityRef::StaticField(_)
            | EntityRef::Method(_)
            | EntityRef::StaticMethod(_) => {}
        }
    }

    fn remove_name(&mut self, entity: &EntityRef) {
        fn remove_if<T>(map: &mut HashMap<String, T>, name: &str, same: impl Fn(&T) -> bool) {
            if map.get(name).is_some_and(same) {
                map.remove(name);
            }
        }

        let id = entity.id();
        let name = entity.name();
        match entity {
            EntityRef::Namespace(namespace) => {
                remove_if(&mut self.namespaces_by_name, name, |n| Arc::ptr_eq(n, namespace))
            }
            EntityRef::Struct(_) => {
                remove_if(&mut self.classes_by_name, name, |s| s.id() == id);
                remove_if(&mut self.structs_by_name, name, |s| s.id() == id);
            }
            EntityRef::Enum(_) => remove_if(&mut self.enums_by_name, name, |e| e.id() == id),
            EntityRef::Fundamental(_) => remove_if(&mut self.fundamentals_by_name, name, |f| f.id() == id),
            EntityRef::Variable(_) => remove_if(&mut self.variables_by_name, name, |v| v.id() == id),
            EntityRef::Function(_) => {
                if let Some(bucket) = self.functions_by_name.get_mut(name) {
                    bucket.retain(|function| function.id() != id);
                    if bucket.is_empty() {
                        self.functions_by_name.remove(name);
                    }
                }
            }
            EntityRef::EnumValue(_)
            | EntityRef::Field(_)
            | EntityRef::StaticField(_)
            | EntityRef::Method(_)
            | EntityRef::StaticMethod(_) => {}
        }
    }
}

/// Counts of indexed entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DatabaseSummary {
    pub entities: usize,
    pub namespaces: usize,
    pub structs: usize,
    pub classes: usize,
    pub enums: usize,
    pub variables: usize,
    pub functions: usize,
    pub fundamentals: usize,
}

/// Registry of reflected entities.
pub struct Database {
    inner: RwLock<Tables>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// An empty database holding only the fundamental archetypes.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for archetype in fundamental_archetypes() {
            let entity = EntityRef::from(archetype);
            tables.insert_name(&entity);
            tables.insert_id(entity, false);
        }
        Self {
            inner: RwLock::new(tables),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a file-level entity: name index of its kind, plus the id index
    /// for it and everything nested in it.
    pub fn register_file_level_entity(&self, entity: EntityRef) {
        debug!(name = %entity.name(), kind = ?entity.kind(), "registering file-level entity");
        let mut tables = self.inner.write();
        tables.insert_name(&entity);
        tables.insert_id(entity, true);
    }

    /// Add `entity` to the id index, with its nested entities when `recursive`.
    pub fn register_entity_id(&self, entity: EntityRef, recursive: bool) {
        self.inner.write().insert_id(entity, recursive);
    }

    /// Remove `entity` from every index it appears in.
    ///
    /// Entries that were never registered, or already removed, are skipped.
    pub fn unregister_entity(&self, entity: &EntityRef, recursive: bool) {
        debug!(name = %entity.name(), kind = ?entity.kind(), "unregistering entity");
        let mut tables = self.inner.write();
        tables.remove_name(entity);
        tables.remove_id(entity, recursive);
    }

    /// The shared namespace for `(name, id)`, created on first request.
    pub(crate) fn generate_namespace(&self, name: &str, id: EntityId) -> Arc<Namespace> {
        self.inner
            .write()
            .generated_namespaces
            .entry(id)
            .or_insert_with(|| {
                debug!(name, id, "namespace created");
                Arc::new(Namespace::new(name, id))
            })
            .clone()
    }

    /// Drop one fragment reference; the namespace leaves every index when the
    /// count reaches zero.
    pub(crate) fn release_namespace(&self, namespace: &Arc<Namespace>) {
        if namespace.release() > 0 {
            return;
        }

        debug!(name = %namespace.name(), id = namespace.id(), "namespace removed");
        let entity = EntityRef::Namespace(namespace.clone());
        // an enclosing namespace may outlive this one
        if let Some(EntityRef::Namespace(outer)) = namespace.outer_entity() {
            outer.detach_entity(&entity);
            namespace.info().clear_outer_entity_if(outer.id());
        }
        let mut tables = self.inner.write();
        tables.remove_name(&entity);
        tables.remove_id(&entity, false);
        if tables
            .generated_namespaces
            .get(&namespace.id())
            .is_some_and(|generated| Arc::ptr_eq(generated, namespace))
        {
            tables.generated_namespaces.remove(&namespace.id());
        }
    }

    // =========================================================================
    // Id lookups
    // =========================================================================

    pub fn get_entity_by_id(&self, id: EntityId) -> Option<EntityRef> {
        self.inner.read().entities_by_id.get(&id).cloned()
    }

    pub fn get_namespace_by_id(&self, id: EntityId) -> Option<Arc<Namespace>> {
        self.get_entity_by_id(id)?.as_namespace().cloned()
    }

    pub fn get_archetype_by_id(&self, id: EntityId) -> Option<ArchetypeRef> {
        self.get_entity_by_id(id)?.as_archetype()
    }

    /// Struct or class.
    pub fn get_struct_by_id(&self, id: EntityId) -> Option<&'static Struct> {
        self.get_entity_by_id(id)?.as_struct()
    }

    pub fn get_class_by_id(&self, id: EntityId) -> Option<&'static Struct> {
        self.get_entity_by_id(id)?.as_class()
    }

    pub fn get_enum_by_id(&self, id: EntityId) -> Option<&'static Enum> {
        self.get_entity_by_id(id)?.as_enum()
    }

    pub fn get_enum_value_by_id(&self, id: EntityId) -> Option<&'static EnumValue> {
        self.get_entity_by_id(id)?.as_enum_value()
    }

    pub fn get_fundamental_archetype_by_id(&self, id: EntityId) -> Option<&'static FundamentalArchetype> {
        self.get_entity_by_id(id)?.as_fundamental()
    }

    pub fn get_field_by_id(&self, id: EntityId) -> Option<&'static Field> {
        self.get_entity_by_id(id)?.as_field()
    }

    pub fn get_static_field_by_id(&self, id: EntityId) -> Option<&'static StaticField> {
        self.get_entity_by_id(id)?.as_static_field()
    }

    pub fn get_method_by_id(&self, id: EntityId) -> Option<&'static Method> {
        self.get_entity_by_id(id)?.as_method()
    }

    pub fn get_static_method_by_id(&self, id: EntityId) -> Option<&'static StaticMethod> {
        self.get_entity_by_id(id)?.as_static_method()
    }

    pub fn get_variable_by_id(&self, id: EntityId) -> Option<&'static Variable> {
        self.get_entity_by_id(id)?.as_variable()
    }

    pub fn get_function_by_id(&self, id: EntityId) -> Option<&'static Function> {
        self.get_entity_by_id(id)?.as_function()
    }

    // =========================================================================
    // Name lookups (file-level entities)
    // =========================================================================

    /// Class, then struct, then enum, then fundamental archetype.
    pub fn get_archetype_by_name(&self, name: &str) -> Option<ArchetypeRef> {
        let tables = self.inner.read();
        if let Some(&archetype) = tables.classes_by_name.get(name).or_else(|| tables.structs_by_name.get(name)) {
            return Some(ArchetypeRef::Struct(archetype));
        }
        if let Some(&archetype) = tables.enums_by_name.get(name) {
            return Some(ArchetypeRef::Enum(archetype));
        }
        tables
            .fundamentals_by_name
            .get(name)
            .map(|&archetype| ArchetypeRef::Fundamental(archetype))
    }

    pub fn get_struct_by_name(&self, name: &str) -> Option<&'static Struct> {
        self.inner.read().structs_by_name.get(name).copied()
    }

    pub fn get_class_by_name(&self, name: &str) -> Option<&'static Struct> {
        self.inner.read().classes_by_name.get(name).copied()
    }

    pub fn get_enum_by_name(&self, name: &str) -> Option<&'static Enum> {
        self.inner.read().enums_by_name.get(name).copied()
    }

    pub fn get_fundamental_archetype_by_name(&self, name: &str) -> Option<&'static FundamentalArchetype> {
        self.inner.read().fundamentals_by_name.get(name).copied()
    }

    /// Resolve a `::`-separated namespace path.
    ///
    /// The whole path is validated before any lookup: an empty segment or a
    /// stray `:` fails with [`LookupError::BadNamespaceFormat`]. An empty
    /// path, or one naming no registered namespace, resolves to `Ok(None)`.
    pub fn get_namespace_by_name(&self, qualified_name: &str) -> Result<Option<Arc<Namespace>>, LookupError> {
        if qualified_name.is_empty() {
            return Ok(None);
        }

        let segments: Vec<&str> = qualified_name.split("::").collect();
        if segments.iter().any(|segment| segment.is_empty() || segment.contains(':')) {
            return Err(LookupError::BadNamespaceFormat(qualified_name.to_owned()));
        }

        let Some(mut namespace) = self.inner.read().namespaces_by_name.get(segments[0]).cloned() else {
            return Ok(None);
        };
        for segment in &segments[1..] {
            match namespace.get_namespace_by_name(segment) {
                Some(nested) => namespace = nested,
                None => return Ok(None),
            }
        }
        Ok(Some(namespace))
    }

    pub fn get_variable_by_name(&self, name: &str, min_flags: VarFlags) -> Option<&'static Variable> {
        self.inner
            .read()
            .variables_by_name
            .get(name)
            .copied()
            .filter(|variable| variable.flags().contains(min_flags))
    }

    /// First registered overload named `name` carrying at least `min_flags`.
    pub fn get_function_by_name(&self, name: &str, min_flags: FunctionFlags) -> Option<&'static Function> {
        self.inner
            .read()
            .functions_by_name
            .get(name)?
            .iter()
            .copied()
            .find(|function| function.flags().contains(min_flags))
    }

    pub fn get_functions_by_name(&self, name: &str, min_flags: FunctionFlags) -> Vec<&'static Function> {
        self.inner
            .read()
            .functions_by_name
            .get(name)
            .into_iter()
            .flatten()
            .copied()
            .filter(|function| function.flags().contains(min_flags))
            .collect()
    }

    pub fn summary(&self) -> DatabaseSummary {
        let tables = self.inner.read();
        DatabaseSummary {
            entities: tables.entities_by_id.len(),
            namespaces: tables.namespaces_by_name.len(),
            structs: tables.structs_by_name.len(),
            classes: tables.classes_by_name.len(),
            enums: tables.enums_by_name.len(),
            variables: tables.variables_by_name.len(),
            functions: tables.functions_by_name.values().map(Vec::len).sum(),
            fundamentals: tables.fundamentals_by_name.len(),
        }
    }
}

// =============================================================================
// Registerer
// =============================================================================

/// Keeps a file-level entity registered for as long as it lives.
pub struct Registerer<'db> {
    db: &'db Database,
    entity: EntityRef,
}

impl Registerer<'static> {
    /// Register into the process-wide database.
    pub fn new(entity: impl Into<EntityRef>) -> Self {
        Self::with_database(database(), entity)
    }
}

impl<'db> Registerer<'db> {
    pub fn with_database(db: &'db Database, entity: impl Into<EntityRef>) -> Self {
        let entity = entity.into();
        db.register_file_level_entity(entity.clone());
        Self { db, entity }
    }

    #[inline]
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }
}

impl Drop for Registerer<'_> {
    fn drop(&mut self) {
        self.db.unregister_entity(&self.entity, true);
    }
}
