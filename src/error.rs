//! Error types surfaced by lookups, property attachment and checked invocation.

use thiserror::Error;

use crate::entity::EntityKind;

/// Failure of a checked call or a checked member access.
///
/// Unchecked invocation never produces these; it is an `unsafe` fast path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The number of supplied arguments differs from the declared parameter count.
    #[error("`{member}` expects {expected} argument(s), got {found}")]
    ArgCountMismatch {
        member: String,
        expected: usize,
        found: usize,
    },

    /// An argument type is not strictly the declared parameter type.
    #[error("argument {index} of `{member}` must be `{expected}`, got `{found}`")]
    ArgTypeMismatch {
        member: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// The requested return type is not strictly the declared return type.
    #[error("`{member}` returns `{expected}`, requested `{found}`")]
    ReturnTypeMismatch {
        member: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The caller's dynamic archetype does not derive from the declaring struct.
    #[error("`{caller}` cannot reach `{member}` declared by `{declaring}`")]
    InvalidCaller {
        member: String,
        caller: String,
        declaring: String,
    },

    /// Constness of the call path does not match the constness of the method.
    #[error("`{member}` (const: {method_is_const}) invoked through a call path of the opposite constness")]
    ConstViolation { member: String, method_is_const: bool },

    /// A typed field, static field or variable access used the wrong type.
    #[error("`{member}` holds `{expected}`, accessed as `{found}`")]
    ValueTypeMismatch {
        member: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure of a qualified name lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The qualified name has a stray `:` or a segment left empty by `::`.
    #[error("ill-formed namespace name '{0}'")]
    BadNamespaceFormat(String),
}

/// Rejection of a property attachment.
///
/// The `Display` output is the human-readable description handed back to the
/// registering code, which decides whether it is fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The property's settings do not allow this kind of target.
    #[error("property '{property}' cannot be attached to {kind:?} '{entity}'")]
    InvalidTarget {
        property: String,
        entity: String,
        kind: EntityKind,
    },

    /// A single-instance property of the same type is already attached.
    #[error("property '{property}' is already attached to '{entity}' and does not allow multiple instances")]
    DuplicateProperty { property: String, entity: String },
}

/// Misuse of the generic struct registration calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Arguments were bound against a struct that declares no parameters.
    #[error("'{0}' declares no generic parameters")]
    NotATemplate(String),

    /// The argument list length differs from the generic's parameter count.
    #[error("'{template}' takes {expected} generic argument(s), got {found}")]
    ArityMismatch {
        template: String,
        expected: usize,
        found: usize,
    },

    /// A generic cannot itself be bound as an instantiation.
    #[error("'{0}' is generic and cannot be an instantiation")]
    AlreadyTemplate(String),

    /// An instantiation cannot declare parameters.
    #[error("'{0}' is an instantiation and cannot declare generic parameters")]
    AlreadyInstantiated(String),
}
