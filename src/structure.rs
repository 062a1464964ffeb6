//! Structs and classes: parents, transitive subclasses, members, nested
//! archetypes and instantiation.
//!
//! A [`Struct`] is assembled by value (parents, fields, methods, nested
//! types), then moved into a [`StructCell`] which hands out the `'static`
//! reference and performs the one-time registration work: binding members to
//! their declaring struct, inheriting parent properties and pushing the new
//! struct into the subclass set of every ancestor.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Once, OnceLock};

use parking_lot::RwLock;
use tracing::trace;

use crate::archetype::{AccessSpecifier, Archetype, ArchetypeRef};
use crate::entity::{Entity, EntityInfo, EntityKind, EntityRef, NameBag};
use crate::enumeration::Enum;
use crate::error::TemplateError;
use crate::field::{Field, FieldFlags, StaticField};
use crate::function::{Method, MethodFlags, StaticMethod};
use crate::invoke::ArgList;
use crate::template::{Generics, TemplateArgument, TemplateParameter, archetypes_of};
use crate::types::Type;
use crate::EntityId;

/// Factory producing a default-constructed instance.
pub type DefaultInstantiator = fn() -> Box<dyn Any + Send>;

/// One inheritance edge.
#[derive(Clone, Copy, Debug)]
pub struct ParentStruct {
    archetype: &'static Struct,
    access: AccessSpecifier,
    offset: usize,
}

impl ParentStruct {
    #[inline]
    pub fn archetype(&self) -> &'static Struct {
        self.archetype
    }

    #[inline]
    pub fn access(&self) -> AccessSpecifier {
        self.access
    }

    /// Byte offset of the parent sub-object inside the child.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// An archetype declared inside a struct.
#[derive(Clone, Copy, Debug)]
pub struct NestedArchetype {
    archetype: ArchetypeRef,
    access: AccessSpecifier,
}

impl NestedArchetype {
    #[inline]
    pub fn archetype(&self) -> ArchetypeRef {
        self.archetype
    }

    #[inline]
    pub fn access(&self) -> AccessSpecifier {
        self.access
    }
}

#[derive(Default)]
struct SubclassSet {
    ids: HashSet<EntityId>,
    list: Vec<&'static Struct>,
}

/// A reflected struct or class.
pub struct Struct {
    archetype: Archetype,
    kind: EntityKind,
    direct_parents: Vec<ParentStruct>,
    subclasses: RwLock<SubclassSet>,
    fields: NameBag<Field>,
    static_fields: NameBag<StaticField>,
    methods: NameBag<Method>,
    static_methods: NameBag<StaticMethod>,
    nested: Vec<NestedArchetype>,
    default_instantiator: Option<DefaultInstantiator>,
    instantiators: Vec<StaticMethod>,
    generics: Generics,
}

impl Struct {
    pub fn new_struct(name: impl Into<String>, id: EntityId, memory_size: usize) -> Self {
        Self::new(name, id, memory_size, EntityKind::STRUCT)
    }

    pub fn new_class(name: impl Into<String>, id: EntityId, memory_size: usize) -> Self {
        Self::new(name, id, memory_size, EntityKind::CLASS)
    }

    fn new(name: impl Into<String>, id: EntityId, memory_size: usize, kind: EntityKind) -> Self {
        Self {
            archetype: Archetype::new(name, id, memory_size),
            kind,
            direct_parents: Vec::new(),
            subclasses: RwLock::new(SubclassSet::default()),
            fields: NameBag::default(),
            static_fields: NameBag::default(),
            methods: NameBag::default(),
            static_methods: NameBag::default(),
            nested: Vec::new(),
            default_instantiator: None,
            instantiators: Vec::new(),
            generics: Generics::None,
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

    // =========================================================================
    // Registration
    // =========================================================================

    /// Append a direct parent whose sub-object starts `offset` bytes into
    /// this struct.
    ///
    /// # Safety
    ///
    /// `offset` must be the real offset of a `parent` value inside every
    /// instance of this struct; invocation and field access rely on it.
    pub unsafe fn add_direct_parent(&mut self, parent: &'static Struct, access: AccessSpecifier, offset: usize) {
        self.direct_parents.push(ParentStruct {
            archetype: parent,
            access,
            offset,
        });
    }

    pub fn add_field(&mut self, field: Field) -> &Field {
        self.fields.push(field)
    }

    pub fn add_static_field(&mut self, field: StaticField) -> &StaticField {
        self.static_fields.push(field)
    }

    pub fn add_method(&mut self, method: Method) -> &Method {
        self.methods.push(method)
    }

    pub fn add_static_method(&mut self, method: StaticMethod) -> &StaticMethod {
        self.static_methods.push(method)
    }

    /// Declare `archetype` as nested in this struct with the given access.
    pub fn add_nested_archetype(&mut self, archetype: ArchetypeRef, access: AccessSpecifier) {
        self.nested.push(NestedArchetype { archetype, access });
    }

    pub fn set_default_instantiator(&mut self, instantiator: DefaultInstantiator) {
        self.default_instantiator = Some(instantiator);
    }

    /// Add a custom factory. It should return `Box<Self>` for
    /// [`make_instance_with`](Self::make_instance_with) to select it.
    pub fn add_instantiator(&mut self, instantiator: StaticMethod) {
        self.instantiators.push(instantiator);
    }

    /// One-time work once this struct has its final address.
    pub(crate) fn on_first_registration(&'static self) {
        let this = EntityRef::Struct(self);

        for field in self.fields.iter() {
            field.bind(self);
        }
        for field in self.static_fields.iter() {
            field.bind(self);
        }
        for method in self.methods.iter() {
            method.bind(self);
        }
        for method in self.static_methods.iter() {
            method.bind(self);
        }
        for instantiator in &self.instantiators {
            instantiator.bind(self);
        }
        for nested in &self.nested {
            nested.archetype.info().set_outer_entity(Some(&this));
            nested.archetype.archetype().set_access_specifier(nested.access);
        }

        for parent in &self.direct_parents {
            self.info().inherit_properties_from(self.kind, parent.archetype.info());
        }
        for method in self.methods.iter() {
            method.inherit_base_method_properties();
        }

        let mut visited = HashSet::new();
        self.notify_ancestors(self, &mut visited);

        if let Some(template) = self.generics.template() {
            if template.generics.add_instantiation(self) {
                trace!(template = %template.name(), instantiation = %self.name(), "instantiation registered");
            }
        }
    }

    fn notify_ancestors(&'static self, subclass: &'static Struct, visited: &mut HashSet<EntityId>) {
        for parent in &self.direct_parents {
            let ancestor = parent.archetype;
            if !visited.insert(ancestor.id()) {
                continue;
            }
            trace!(ancestor = %ancestor.name(), subclass = %subclass.name(), "subclass registered");
            ancestor.add_subclass(subclass);
            ancestor.notify_ancestors(subclass, visited);
        }
    }

    fn add_subclass(&self, subclass: &'static Struct) {
        let mut subclasses = self.subclasses.write();
        if subclasses.ids.insert(subclass.id()) {
            subclasses.list.push(subclass);
        }
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    #[inline]
    pub fn direct_parents(&self) -> &[ParentStruct] {
        &self.direct_parents
    }

    #[inline]
    pub fn get_direct_parent_at(&self, index: usize) -> Option<&ParentStruct> {
        self.direct_parents.get(index)
    }

    /// Every registered descendant, direct or transitive, in registration order.
    pub fn subclasses(&self) -> Vec<&'static Struct> {
        self.subclasses.read().list.clone()
    }

    /// Descendants that list this struct among their own direct parents.
    pub fn get_direct_subclasses(&self) -> Vec<&'static Struct> {
        self.subclasses
            .read()
            .list
            .iter()
            .copied()
            .filter(|subclass| subclass.direct_parents.iter().any(|parent| parent.archetype.id() == self.id()))
            .collect()
    }

    /// `true` when `other` is this struct or one of its descendants.
    pub fn is_base_of(&self, other: &Struct) -> bool {
        self.id() == other.id() || self.subclasses.read().ids.contains(&other.id())
    }

    /// `true` when this struct strictly derives from `other`.
    pub fn is_subclass_of(&self, other: &Struct) -> bool {
        self.id() != other.id() && other.is_base_of(self)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn static_fields(&self) -> impl Iterator<Item = &StaticField> {
        self.static_fields.iter()
    }

    #[inline]
    pub fn fields_count(&self) -> usize {
        self.fields.len()
    }

    /// First field named `name` carrying at least `min_flags`, searching
    /// parents in declaration order when `inspect_inherited`.
    pub fn get_field_by_name(&self, name: &str, min_flags: FieldFlags, inspect_inherited: bool) -> Option<&Field> {
        first_match(self, inspect_inherited, &|archetype| {
            archetype.fields.named(name).find(|field| field.flags().contains(min_flags))
        })
    }

    pub fn get_fields_by_name(&self, name: &str, min_flags: FieldFlags, inspect_inherited: bool) -> Vec<&Field> {
        let mut out = Vec::new();
        all_matches(self, inspect_inherited, &mut out, &|archetype, out| {
            out.extend(archetype.fields.named(name).filter(|field| field.flags().contains(min_flags)));
        });
        out
    }

    pub fn get_static_field_by_name(
        &self,
        name: &str,
        min_flags: FieldFlags,
        inspect_inherited: bool,
    ) -> Option<&StaticField> {
        first_match(self, inspect_inherited, &|archetype| {
            archetype.static_fields.named(name).find(|field| field.flags().contains(min_flags))
        })
    }

    pub fn get_static_fields_by_name(
        &self,
        name: &str,
        min_flags: FieldFlags,
        inspect_inherited: bool,
    ) -> Vec<&StaticField> {
        let mut out = Vec::new();
        all_matches(self, inspect_inherited, &mut out, &|archetype, out| {
            out.extend(archetype.static_fields.named(name).filter(|field| field.flags().contains(min_flags)));
        });
        out
    }

    /// Visit fields in declaration order, then inherited ones when
    /// `inspect_inherited`. Returns `false` if the visitor stopped early.
    pub fn foreach_field(&self, inspect_inherited: bool, mut visitor: impl FnMut(&Field) -> bool) -> bool {
        visit(self, inspect_inherited, &mut |archetype| archetype.fields.iter().all(&mut visitor))
    }

    pub fn foreach_static_field(&self, inspect_inherited: bool, mut visitor: impl FnMut(&StaticField) -> bool) -> bool {
        visit(self, inspect_inherited, &mut |archetype| archetype.static_fields.iter().all(&mut visitor))
    }

    // =========================================================================
    // Methods
    // =========================================================================

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    pub fn static_methods(&self) -> impl Iterator<Item = &StaticMethod> {
        self.static_methods.iter()
    }

    pub fn get_method_by_name(&self, name: &str, min_flags: MethodFlags, inspect_inherited: bool) -> Option<&Method> {
        first_match(self, inspect_inherited, &|archetype| {
            archetype.methods.named(name).find(|method| method.flags().contains(min_flags))
        })
    }

    /// Every overload named `name`, local ones first.
    pub fn get_methods_by_name(&self, name: &str, min_flags: MethodFlags, inspect_inherited: bool) -> Vec<&Method> {
        let mut out = Vec::new();
        all_matches(self, inspect_inherited, &mut out, &|archetype, out| {
            out.extend(archetype.methods.named(name).filter(|method| method.flags().contains(min_flags)));
        });
        out
    }

    pub fn get_static_method_by_name(
        &self,
        name: &str,
        min_flags: MethodFlags,
        inspect_inherited: bool,
    ) -> Option<&StaticMethod> {
        first_match(self, inspect_inherited, &|archetype| {
            archetype.static_methods.named(name).find(|method| method.flags().contains(min_flags))
        })
    }

    pub fn get_static_methods_by_name(
        &self,
        name: &str,
        min_flags: MethodFlags,
        inspect_inherited: bool,
    ) -> Vec<&StaticMethod> {
        let mut out = Vec::new();
        all_matches(self, inspect_inherited, &mut out, &|archetype, out| {
            out.extend(archetype.static_methods.named(name).filter(|method| method.flags().contains(min_flags)));
        });
        out
    }

    pub fn foreach_method(&self, inspect_inherited: bool, mut visitor: impl FnMut(&Method) -> bool) -> bool {
        visit(self, inspect_inherited, &mut |archetype| archetype.methods.iter().all(&mut visitor))
    }

    pub fn foreach_static_method(&self, inspect_inherited: bool, mut visitor: impl FnMut(&StaticMethod) -> bool) -> bool {
        visit(self, inspect_inherited, &mut |archetype| archetype.static_methods.iter().all(&mut visitor))
    }

    // =========================================================================
    // Nested archetypes
    // =========================================================================

    pub fn nested_archetypes(&self) -> impl Iterator<Item = &NestedArchetype> {
        self.nested.iter()
    }

    pub fn foreach_nested_archetype(&self, mut visitor: impl FnMut(&NestedArchetype) -> bool) -> bool {
        self.nested.iter().all(&mut visitor)
    }

    /// Nested archetype named `name`. `AccessSpecifier::Undefined` matches
    /// any access.
    pub fn get_nested_archetype_by_name(&self, name: &str, access: AccessSpecifier) -> Option<ArchetypeRef> {
        self.nested
            .iter()
            .find(|nested| {
                nested.archetype.name() == name && (access == AccessSpecifier::Undefined || nested.access == access)
            })
            .map(|nested| nested.archetype)
    }

    pub fn get_nested_struct_by_name(&self, name: &str, access: AccessSpecifier) -> Option<&'static Struct> {
        self.nested_of_kind(name, access, |archetype| {
            archetype.as_struct().filter(|archetype| archetype.kind == EntityKind::STRUCT)
        })
    }

    pub fn get_nested_class_by_name(&self, name: &str, access: AccessSpecifier) -> Option<&'static Struct> {
        self.nested_of_kind(name, access, |archetype| archetype.as_class())
    }

    pub fn get_nested_enum_by_name(&self, name: &str, access: AccessSpecifier) -> Option<&'static Enum> {
        self.nested_of_kind(name, access, |archetype| archetype.as_enum())
    }

    fn nested_of_kind<T>(
        &self,
        name: &str,
        access: AccessSpecifier,
        cast: impl Fn(ArchetypeRef) -> Option<T>,
    ) -> Option<T> {
        self.nested
            .iter()
            .filter(|nested| access == AccessSpecifier::Undefined || nested.access == access)
            .filter(|nested| nested.archetype.name() == name)
            .find_map(|nested| cast(nested.archetype))
    }

    // =========================================================================
    // Instantiation
    // =========================================================================

    #[inline]
    pub fn default_instantiator(&self) -> Option<DefaultInstantiator> {
        self.default_instantiator
    }

    pub fn instantiators(&self) -> &[StaticMethod] {
        &self.instantiators
    }

    /// Build an instance with no arguments: the default instantiator, else a
    /// custom one taking no arguments. `None` if neither produces a `T`.
    pub fn make_instance<T: 'static>(&self) -> Option<Box<T>> {
        self.default_instantiator
            .and_then(|instantiate| instantiate().downcast::<T>().ok())
            .or_else(|| self.make_instance_with::<T, ()>(()))
    }

    /// Build an instance through the first custom instantiator taking `A`
    /// and returning `Box<T>`.
    pub fn make_instance_with<T: 'static, A: ArgList>(&self, args: A) -> Option<Box<T>> {
        self.instantiators
            .iter()
            .find(|instantiator| instantiator.signature().matches::<A, Box<T>>())
            .and_then(|instantiator| instantiator.checked_invoke::<A, Box<T>>(args).ok())
    }
}

impl Entity for Struct {
    #[inline]
    fn info(&self) -> &EntityInfo {
        self.archetype.info()
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl fmt::Debug for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Struct")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("kind", &self.kind)
            .field("memory_size", &self.memory_size())
            .field("parents", &self.direct_parents.iter().map(|p| p.archetype.name()).collect::<Vec<_>>())
            .field("template_parameters", &self.generics.parameters().len())
            .field("template_arguments", &self.generics.arguments().len())
            .finish()
    }
}

// =============================================================================
// Generics
// =============================================================================

impl Struct {
    /// Declare the next type parameter, turning this struct into a generic.
    pub fn add_template_parameter(&mut self, name: impl Into<String>) -> Result<(), TemplateError> {
        if self.generics.push_parameter(name.into()) {
            Ok(())
        } else {
            Err(TemplateError::AlreadyInstantiated(self.name().to_owned()))
        }
    }

    /// Mark this struct as the instantiation of `template` with one archetype
    /// per parameter, `None` for unreflected arguments.
    pub fn set_template_arguments(
        &mut self,
        template: &'static Struct,
        arguments: impl IntoIterator<Item = Option<ArchetypeRef>>,
    ) -> Result<(), TemplateError> {
        let parameters = template.template_parameters();
        if parameters.is_empty() {
            return Err(TemplateError::NotATemplate(template.name().to_owned()));
        }
        if self.is_template() {
            return Err(TemplateError::AlreadyTemplate(self.name().to_owned()));
        }

        let arguments: Vec<_> = arguments.into_iter().collect();
        if arguments.len() != parameters.len() {
            return Err(TemplateError::ArityMismatch {
                template: template.name().to_owned(),
                expected: parameters.len(),
                found: arguments.len(),
            });
        }
        self.generics = Generics::bind(template, parameters, arguments);
        Ok(())
    }

    #[inline]
    pub fn is_template(&self) -> bool {
        !self.generics.parameters().is_empty()
    }

    #[inline]
    pub fn template_parameters(&self) -> &[TemplateParameter] {
        self.generics.parameters()
    }

    pub fn get_template_parameter(&self, name: &str) -> Option<&TemplateParameter> {
        self.template_parameters().iter().find(|parameter| parameter.name() == name)
    }

    /// Registered instantiations of this generic, in registration order.
    pub fn template_instantiations(&self) -> Vec<&'static Struct> {
        self.generics.instantiations()
    }

    /// The registered instantiation binding exactly `arguments`.
    pub fn get_template_instantiation(&self, arguments: &[Option<ArchetypeRef>]) -> Option<&'static Struct> {
        self.generics.find_instantiation(arguments)
    }

    /// Same as [`Struct::get_template_instantiation`], keyed by Rust types.
    pub fn get_template_instantiation_by_types(&self, types: &[Type]) -> Option<&'static Struct> {
        self.generics.find_instantiation(&archetypes_of(types))
    }

    /// The generic this struct instantiates.
    #[inline]
    pub fn instantiated_template(&self) -> Option<&'static Struct> {
        self.generics.template()
    }

    #[inline]
    pub fn template_arguments(&self) -> &[TemplateArgument] {
        self.generics.arguments()
    }

    #[inline]
    pub fn get_template_argument_at(&self, index: usize) -> Option<&TemplateArgument> {
        self.template_arguments().get(index)
    }
}

// =============================================================================
// Lookup helpers
// =============================================================================

fn first_match<'a, T: ?Sized>(
    archetype: &'a Struct,
    inspect_inherited: bool,
    local: &dyn Fn(&'a Struct) -> Option<&'a T>,
) -> Option<&'a T> {
    local(archetype).or_else(|| {
        if !inspect_inherited {
            return None;
        }
        archetype
            .direct_parents
            .iter()
            .find_map(|parent| first_match(parent.archetype, true, local))
    })
}

fn all_matches<'a, T: ?Sized>(
    archetype: &'a Struct,
    inspect_inherited: bool,
    out: &mut Vec<&'a T>,
    local: &dyn Fn(&'a Struct, &mut Vec<&'a T>),
) {
    local(archetype, out);
    if inspect_inherited {
        for parent in &archetype.direct_parents {
            all_matches(parent.archetype, true, out, local);
        }
    }
}

fn visit<'a>(archetype: &'a Struct, inspect_inherited: bool, visitor: &mut dyn FnMut(&'a Struct) -> bool) -> bool {
    if !visitor(archetype) {
        return false;
    }
    !inspect_inherited
        || archetype
            .direct_parents
            .iter()
            .all(|parent| visit(parent.archetype, true, visitor))
}

// =============================================================================
// StructCell
// =============================================================================

/// Lazily built, process-lifetime storage for one struct archetype.
///
/// ```ignore
/// static PLAYER: StructCell = StructCell::new();
///
/// impl Reflect for Player {
///     fn reflected_archetype() -> ArchetypeRef {
///         ArchetypeRef::Struct(PLAYER.get_or_init(build_player))
///     }
/// }
/// ```
pub struct StructCell {
    cell: OnceLock<Struct>,
    registered: Once,
}

impl StructCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            registered: Once::new(),
        }
    }

    /// The archetype, built by `init` on first access.
    ///
    /// `init` must not access this same cell again.
    pub fn get_or_init(&'static self, init: impl FnOnce() -> Struct) -> &'static Struct {
        let archetype = self.cell.get_or_init(init);
        self.registered.call_once(|| archetype.on_first_registration());
        archetype
    }

    pub fn get(&'static self) -> Option<&'static Struct> {
        self.cell.get().filter(|_| self.registered.is_completed())
    }
}

impl Default for StructCell {
    fn default() -> Self {
        Self::new()
    }
}
