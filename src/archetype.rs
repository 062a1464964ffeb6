//! Archetypes (reflected sized types) and the built-in fundamental ones.

use std::sync::LazyLock;

use parking_lot::RwLock;

use crate::entity::{Entity, EntityInfo, EntityKind};
use crate::enumeration::Enum;
use crate::hash::entity_id;
use crate::structure::Struct;
use crate::types::Reflect;
use crate::EntityId;

/// Access level of a nested archetype or of an inheritance edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessSpecifier {
    /// Not nested, or unknown. Matches any access in nested lookups.
    #[default]
    Undefined,
    Public,
    Protected,
    Private,
}

/// Data shared by structs, classes, enums and fundamental archetypes.
#[derive(Debug)]
pub struct Archetype {
    info: EntityInfo,
    memory_size: usize,
    access: RwLock<AccessSpecifier>,
}

impl Archetype {
    pub fn new(name: impl Into<String>, id: EntityId, memory_size: usize) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            memory_size,
            access: RwLock::new(AccessSpecifier::Undefined),
        }
    }

    #[inline]
    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// Access specifier inside the enclosing struct; `Undefined` when not nested.
    #[inline]
    pub fn access_specifier(&self) -> AccessSpecifier {
        *self.access.read()
    }

    pub(crate) fn set_access_specifier(&self, access: AccessSpecifier) {
        *self.access.write() = access;
    }
}

// =============================================================================
// ArchetypeRef
// =============================================================================

/// Handle to any archetype.
#[derive(Clone, Copy, Debug)]
pub enum ArchetypeRef {
    Struct(&'static Struct),
    Enum(&'static Enum),
    Fundamental(&'static FundamentalArchetype),
}

impl ArchetypeRef {
    pub fn archetype(&self) -> &'static Archetype {
        match *self {
            Self::Struct(archetype) => archetype.archetype(),
            Self::Enum(archetype) => archetype.archetype(),
            Self::Fundamental(archetype) => &archetype.archetype,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match *self {
            Self::Struct(archetype) => archetype.kind(),
            Self::Enum(_) => EntityKind::ENUM,
            Self::Fundamental(_) => EntityKind::FUNDAMENTAL_ARCHETYPE,
        }
    }

    #[inline]
    pub fn info(&self) -> &'static EntityInfo {
        self.archetype().info()
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.info().id()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.info().name()
    }

    #[inline]
    pub fn memory_size(&self) -> usize {
        self.archetype().memory_size()
    }

    #[inline]
    pub fn access_specifier(&self) -> AccessSpecifier {
        self.archetype().access_specifier()
    }

    pub fn as_struct(&self) -> Option<&'static Struct> {
        match *self {
            Self::Struct(archetype) => Some(archetype),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&'static Struct> {
        self.as_struct().filter(|archetype| archetype.kind() == EntityKind::CLASS)
    }

    pub fn as_enum(&self) -> Option<&'static Enum> {
        match *self {
            Self::Enum(archetype) => Some(archetype),
            _ => None,
        }
    }

    pub fn as_fundamental(&self) -> Option<&'static FundamentalArchetype> {
        match *self {
            Self::Fundamental(archetype) => Some(archetype),
            _ => None,
        }
    }
}

impl PartialEq for ArchetypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.kind() == other.kind()
    }
}

impl Eq for ArchetypeRef {}

// =============================================================================
// Fundamental archetypes
// =============================================================================

/// Archetype of a built-in scalar type.
#[derive(Debug)]
pub struct FundamentalArchetype {
    archetype: Archetype,
}

impl FundamentalArchetype {
    fn new(name: &'static str, memory_size: usize) -> Self {
        Self {
            archetype: Archetype::new(name, entity_id(name), memory_size),
        }
    }

    #[inline]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    #[inline]
    pub fn memory_size(&self) -> usize {
        self.archetype.memory_size()
    }
}

impl Entity for FundamentalArchetype {
    #[inline]
    fn info(&self) -> &EntityInfo {
        self.archetype.info()
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::FUNDAMENTAL_ARCHETYPE
    }
}

macro_rules! fundamental_archetypes {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn reflected_archetype() -> ArchetypeRef {
                    static ARCHETYPE: LazyLock<FundamentalArchetype> =
                        LazyLock::new(|| FundamentalArchetype::new($name, size_of::<$ty>()));
                    ArchetypeRef::Fundamental(&ARCHETYPE)
                }
            }
        )*

        /// Every built-in fundamental archetype.
        pub fn fundamental_archetypes() -> Vec<ArchetypeRef> {
            vec![$(<$ty as Reflect>::reflected_archetype()),*]
        }
    };
}

fundamental_archetypes! {
    () => "void",
    bool => "bool",
    char => "char",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
}
