//! Generic structs and their instantiations.
//!
//! A generic struct declares its type parameters but has no layout of its
//! own. Every concrete instantiation is a separate [`Struct`] that records
//! the generic it instantiates and the archetype bound to each parameter:
//!
//! ```text
//! Buffer<T>               (generic: parameters [T])
//!   ├── Buffer<u32>       (arguments [T = u32])
//!   └── Buffer<Opaque>    (arguments [T = <unreflected>])
//! ```
//!
//! Instantiations announce themselves to their generic on first
//! registration, after which the generic can be asked for the instantiation
//! matching an argument list.

use parking_lot::RwLock;

use crate::archetype::ArchetypeRef;
use crate::structure::Struct;
use crate::types::Type;

/// A type parameter of a generic struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateParameter {
    name: String,
    index: usize,
}

impl TemplateParameter {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the generic's parameter list.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The archetype bound to one parameter of an instantiation.
#[derive(Clone, Debug)]
pub struct TemplateArgument {
    parameter: TemplateParameter,
    archetype: Option<ArchetypeRef>,
}

impl TemplateArgument {
    #[inline]
    pub fn parameter(&self) -> &TemplateParameter {
        &self.parameter
    }

    /// `None` when the bound type is not reflected.
    #[inline]
    pub fn archetype(&self) -> Option<ArchetypeRef> {
        self.archetype
    }

    fn binds(&self, archetype: Option<ArchetypeRef>) -> bool {
        self.archetype.map(|bound| bound.id()) == archetype.map(|wanted| wanted.id())
    }
}

pub(crate) enum Generics {
    None,
    Template {
        parameters: Vec<TemplateParameter>,
        instantiations: RwLock<Vec<&'static Struct>>,
    },
    Instantiation {
        template: &'static Struct,
        arguments: Vec<TemplateArgument>,
    },
}

impl Generics {
    pub(crate) fn push_parameter(&mut self, name: String) -> bool {
        match self {
            Self::None => {
                *self = Self::Template {
                    parameters: vec![TemplateParameter { name, index: 0 }],
                    instantiations: RwLock::new(Vec::new()),
                };
                true
            }
            Self::Template { parameters, .. } => {
                let index = parameters.len();
                parameters.push(TemplateParameter { name, index });
                true
            }
            Self::Instantiation { .. } => false,
        }
    }

    pub(crate) fn bind(
        template: &'static Struct,
        parameters: &[TemplateParameter],
        archetypes: Vec<Option<ArchetypeRef>>,
    ) -> Self {
        let arguments = parameters
            .iter()
            .cloned()
            .zip(archetypes)
            .map(|(parameter, archetype)| TemplateArgument { parameter, archetype })
            .collect();
        Self::Instantiation { template, arguments }
    }

    pub(crate) fn parameters(&self) -> &[TemplateParameter] {
        match self {
            Self::Template { parameters, .. } => parameters,
            _ => &[],
        }
    }

    pub(crate) fn arguments(&self) -> &[TemplateArgument] {
        match self {
            Self::Instantiation { arguments, .. } => arguments,
            _ => &[],
        }
    }

    pub(crate) fn template(&self) -> Option<&'static Struct> {
        match self {
            Self::Instantiation { template, .. } => Some(*template),
            _ => None,
        }
    }

    pub(crate) fn instantiations(&self) -> Vec<&'static Struct> {
        match self {
            Self::Template { instantiations, .. } => instantiations.read().clone(),
            _ => Vec::new(),
        }
    }

    /// Returns `false` when `instantiation` was already known.
    pub(crate) fn add_instantiation(&self, instantiation: &'static Struct) -> bool {
        let Self::Template { instantiations, .. } = self else {
            return false;
        };
        let mut instantiations = instantiations.write();
        if instantiations.iter().any(|known| std::ptr::eq(*known, instantiation)) {
            return false;
        }
        instantiations.push(instantiation);
        true
    }

    pub(crate) fn find_instantiation(&self, archetypes: &[Option<ArchetypeRef>]) -> Option<&'static Struct> {
        let Self::Template { instantiations, .. } = self else {
            return None;
        };
        instantiations.read().iter().copied().find(|instantiation| {
            let arguments = instantiation.template_arguments();
            arguments.len() == archetypes.len()
                && arguments.iter().zip(archetypes).all(|(argument, wanted)| argument.binds(*wanted))
        })
    }
}

/// Archetypes of `types`, in order, for instantiation lookups.
pub(crate) fn archetypes_of(types: &[Type]) -> Vec<Option<ArchetypeRef>> {
    types.iter().map(Type::archetype).collect()
}
