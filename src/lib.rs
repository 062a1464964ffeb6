//! # Runtime Reflection Database (reflect-db)
//!
//! Lets a program inspect and manipulate its own types at run time: find
//! structs, fields, methods, enums and namespaces by name or id, walk
//! inheritance and nesting, attach metadata, and invoke members dynamically
//! with optional strict type checking.
//!
//! ## Design
//!
//! Declarations are described by registration calls, normally emitted by a
//! code generator, and land in two places:
//!
//! ```text
//! ┌──────────────┐   build once    ┌────────────────────┐
//! │ StructCell   │ ──────────────▶ │ &'static Struct    │──┐ fields, methods,
//! │ EnumCell     │                 │ &'static Enum      │  │ nested types,
//! └──────────────┘                 └────────────────────┘  │ enum values
//!                                                          ▼
//! ┌──────────────┐   register      ┌────────────────────────────────────┐
//! │ Registerer   │ ──────────────▶ │ Database: id index (everything)    │
//! │ Namespace-   │                 │           name indices (top level) │
//! │ Fragment-    │ ──merge/unmerge▶│ Namespace (ref counted)            │
//! │ Registerer   │                 └────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! Archetypes live for the whole process. Registerers add entities to the
//! database when built and remove them when dropped.
//!
//! ## Invocation
//!
//! ```ignore
//! use reflect_db::{Entity, MethodFlags};
//!
//! let method = Player::archetype().get_method_by_name("heal", MethodFlags::empty(), true).unwrap();
//! let healed: u32 = method.checked_invoke::<(u32,), u32, _>(&mut player, (10,))?;
//! ```
//!
//! Checked calls validate argument count, argument types, return type,
//! constness and caller before moving the receiver to the declaring
//! sub-object. Unchecked calls are `unsafe` and skip every check.

pub mod archetype;
pub mod entity;
pub mod enumeration;
pub mod error;
pub mod field;
pub mod function;
pub mod hash;
pub mod invoke;
pub mod layout;
pub mod namespace;
pub mod property;
pub mod registry;
pub mod structure;
pub mod template;
pub mod types;
pub mod variable;

#[cfg(feature = "bevy")]
pub mod bevy;

pub use archetype::{AccessSpecifier, Archetype, ArchetypeRef, FundamentalArchetype, fundamental_archetypes};
pub use entity::{Entity, EntityInfo, EntityKind, EntityRef};
pub use enumeration::{Enum, EnumCell, EnumValue};
pub use error::{InvocationError, LookupError, PropertyError, TemplateError};
pub use field::{Field, FieldFlags, StaticField};
pub use function::{Function, FunctionFlags, Method, MethodFlags, StaticMethod};
pub use hash::{entity_id, fnv1a_64, member_id};
pub use invoke::{ArgList, ConstMethodThunk, FreeThunk, FunctionParameter, MethodThunk, Signature};
pub use layout::sub_object_offset;
pub use namespace::{Namespace, NamespaceFragment, NamespaceFragmentRegisterer};
pub use property::{Property, PropertySettings};
pub use registry::{Database, DatabaseSummary, Registerer, database};
pub use structure::{DefaultInstantiator, NestedArchetype, ParentStruct, Struct, StructCell};
pub use template::{TemplateArgument, TemplateParameter};
pub use types::{Object, Reflect, Type};
pub use variable::{VarFlags, Variable};

/// Process-unique handle of a reflected entity.
///
/// Ids are chosen by whoever registers the entity (see [`hash::entity_id`]);
/// the database assumes they are unique and does not check.
pub type EntityId = u64;
