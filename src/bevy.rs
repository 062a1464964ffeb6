//! Bevy integration for the reflection database.
//!
//! Provides:
//! - `ReflectionPlugin`: builder-pattern plugin exposing the database as a Resource
//! - `DynamicArchetype`: component tagging an ECS entity with a reflected struct
//!
//! # Example
//!
//! ```ignore
//! use bevy::prelude::*;
//! use reflect_db::bevy::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(ReflectionPlugin::new().log_summary(true))
//!         .add_systems(Update, list_weapons)
//!         .run();
//! }
//!
//! fn list_weapons(reflection: Res<Reflection>, query: Query<&DynamicArchetype>) {
//!     let Some(weapon) = reflection.get_class_by_name("Weapon") else { return };
//!     for archetype in query.iter().filter(|a| a.is_a(weapon)) {
//!         info!("{}", archetype.name());
//!     }
//! }
//! ```

use std::ops::Deref;

use bevy::prelude::*;

use crate::entity::Entity as _;
use crate::registry::{Database, database};
use crate::structure::Struct;

// =============================================================================
// Plugin
// =============================================================================

/// Bevy plugin exposing a reflection database.
///
/// ```ignore
/// App::new().add_plugins(ReflectionPlugin::new().log_summary(true))
/// ```
#[derive(Default)]
pub struct ReflectionPlugin {
    database: Option<&'static Database>,
    log_summary: bool,
}

impl ReflectionPlugin {
    /// Plugin over the process-wide database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `database` instead of the process-wide one.
    pub fn with_database(mut self, database: &'static Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Log index sizes when the plugin is built.
    ///
    /// Default: `false`
    pub fn log_summary(mut self, enabled: bool) -> Self {
        self.log_summary = enabled;
        self
    }
}

impl Plugin for ReflectionPlugin {
    fn build(&self, app: &mut App) {
        let db = self.database.unwrap_or_else(database);

        if self.log_summary {
            let summary = db.summary();
            tracing::info!(
                entities = summary.entities,
                namespaces = summary.namespaces,
                structs = summary.structs,
                classes = summary.classes,
                enums = summary.enums,
                functions = summary.functions,
                "reflection database ready"
            );
        }

        app.insert_resource(Reflection(db));
        app.insert_resource(ReflectionConfig {
            log_summary: self.log_summary,
        });
    }
}

/// Handle to the reflection database, usable as `Res<Reflection>`.
#[derive(Resource, Clone, Copy)]
pub struct Reflection(&'static Database);

impl Reflection {
    #[inline]
    pub fn database(&self) -> &'static Database {
        self.0
    }
}

impl Deref for Reflection {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.0
    }
}

/// Runtime configuration for the reflection plugin.
#[derive(Resource, Clone, Debug)]
pub struct ReflectionConfig {
    /// Whether the database summary was logged at startup.
    pub log_summary: bool,
}

// =============================================================================
// DynamicArchetype Component
// =============================================================================

/// The reflected struct an ECS entity stands for.
///
/// `is_a` is a set lookup in the transitive subclass set of the queried
/// archetype, so filtering a query by base class stays cheap.
#[derive(Component, Clone, Copy, Debug)]
pub struct DynamicArchetype(&'static Struct);

impl DynamicArchetype {
    #[inline]
    pub fn new(archetype: &'static Struct) -> Self {
        Self(archetype)
    }

    #[inline]
    pub fn archetype(&self) -> &'static Struct {
        self.0
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.0.info().name()
    }

    /// `true` when the tagged struct is `base` or derives from it.
    #[inline]
    pub fn is_a(&self, base: &Struct) -> bool {
        base.is_base_of(self.0)
    }

    #[inline]
    pub fn is_exactly(&self, archetype: &Struct) -> bool {
        self.0.id() == archetype.id()
    }
}

impl PartialEq for DynamicArchetype {
    fn eq(&self, other: &Self) -> bool {
        self.is_exactly(other.0)
    }
}

impl Eq for DynamicArchetype {}

// =============================================================================
// Tests
// =============================================================================
