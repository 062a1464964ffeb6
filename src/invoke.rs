//! Call signatures, argument lists and type-erased call thunks.
//!
//! Arguments travel as a tuple implementing [`ArgList`]. A callable is stored
//! as an erased function pointer next to its [`Signature`]; checked calls
//! compare the signature against the caller's static types before restoring
//! the typed pointer.

use std::mem;

use crate::error::InvocationError;
use crate::types::Type;

mod sealed {
    pub trait Sealed {}
}

/// A tuple of call arguments.
///
/// Implemented for tuples of up to eight `'static` elements.
pub trait ArgList: sealed::Sealed + 'static {
    const LEN: usize;

    fn types() -> Vec<Type>;
}

macro_rules! arg_lists {
    ($( ($($arg:ident),*) ),* $(,)?) => {
        $(
            impl<$($arg: 'static),*> sealed::Sealed for ($($arg,)*) {}

            impl<$($arg: 'static),*> ArgList for ($($arg,)*) {
                const LEN: usize = <[&str]>::len(&[$(stringify!($arg)),*]);

                fn types() -> Vec<Type> {
                    vec![$(Type::of::<$arg>()),*]
                }
            }
        )*
    };
}

arg_lists! {
    (),
    (A0),
    (A0, A1),
    (A0, A1, A2),
    (A0, A1, A2, A3),
    (A0, A1, A2, A3, A4),
    (A0, A1, A2, A3, A4, A5),
    (A0, A1, A2, A3, A4, A5, A6),
    (A0, A1, A2, A3, A4, A5, A6, A7),
}

// =============================================================================
// Signatures
// =============================================================================

/// One declared parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionParameter {
    name: String,
    ty: Type,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }

    /// Parameter name; empty when the declaration left it unnamed.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }
}

/// Declared parameter and return types of a callable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    parameters: Vec<FunctionParameter>,
    return_type: Type,
}

impl Signature {
    pub fn of<A: ArgList, R: 'static>() -> Self {
        Self {
            parameters: A::types().into_iter().map(|ty| FunctionParameter::new("", ty)).collect(),
            return_type: Type::of::<R>(),
        }
    }

    #[inline]
    pub fn parameters(&self) -> &[FunctionParameter] {
        &self.parameters
    }

    #[inline]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn return_type(&self) -> Type {
        self.return_type
    }

    /// Name parameters in declaration order. Extra names are ignored.
    pub(crate) fn set_parameter_names(&mut self, names: &[&str]) {
        for (parameter, name) in self.parameters.iter_mut().zip(names) {
            parameter.name = (*name).to_owned();
        }
    }

    /// Same parameter and return types, ignoring parameter names.
    pub fn same_types(&self, other: &Signature) -> bool {
        self.return_type == other.return_type
            && self.parameters.len() == other.parameters.len()
            && self.parameters.iter().zip(&other.parameters).all(|(a, b)| a.ty == b.ty)
    }

    /// Whether a call with arguments `A` returning `R` matches exactly.
    pub fn matches<A: ArgList, R: 'static>(&self) -> bool {
        self.check::<A, R>("").is_ok()
    }

    /// Validate argument count, then argument types, then return type.
    pub fn check<A: ArgList, R: 'static>(&self, member: &str) -> Result<(), InvocationError> {
        if A::LEN != self.parameters.len() {
            return Err(InvocationError::ArgCountMismatch {
                member: member.to_owned(),
                expected: self.parameters.len(),
                found: A::LEN,
            });
        }

        for (index, (parameter, found)) in self.parameters.iter().zip(A::types()).enumerate() {
            if parameter.ty != found {
                return Err(InvocationError::ArgTypeMismatch {
                    member: member.to_owned(),
                    index,
                    expected: parameter.ty.name(),
                    found: found.name(),
                });
            }
        }

        let requested = Type::of::<R>();
        if self.return_type != requested {
            return Err(InvocationError::ReturnTypeMismatch {
                member: member.to_owned(),
                expected: self.return_type.name(),
                found: requested.name(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Erased thunks
// =============================================================================

/// Thunk of an instance method taking a mutable receiver.
pub type MethodThunk<A, R> = unsafe fn(*mut u8, A) -> R;

/// Thunk of an instance method taking a shared receiver.
pub type ConstMethodThunk<A, R> = unsafe fn(*const u8, A) -> R;

/// Thunk of a static method or free function.
pub type FreeThunk<A, R> = fn(A) -> R;

/// A function pointer with its type forgotten.
///
/// Every `restore_*` is `unsafe`: the caller guarantees `A` and `R` are the
/// exact types the pointer was erased from.
#[derive(Clone, Copy)]
pub(crate) struct ErasedFn(unsafe fn());

impl ErasedFn {
    pub(crate) fn from_method<A: ArgList, R>(thunk: MethodThunk<A, R>) -> Self {
        // SAFETY: function pointers share one size and representation.
        Self(unsafe { mem::transmute::<MethodThunk<A, R>, unsafe fn()>(thunk) })
    }

    pub(crate) fn from_const_method<A: ArgList, R>(thunk: ConstMethodThunk<A, R>) -> Self {
        // SAFETY: as above.
        Self(unsafe { mem::transmute::<ConstMethodThunk<A, R>, unsafe fn()>(thunk) })
    }

    pub(crate) fn from_free<A: ArgList, R>(thunk: FreeThunk<A, R>) -> Self {
        // SAFETY: as above.
        Self(unsafe { mem::transmute::<FreeThunk<A, R>, unsafe fn()>(thunk) })
    }

    pub(crate) unsafe fn restore_method<A: ArgList, R>(self) -> MethodThunk<A, R> {
        unsafe { mem::transmute::<unsafe fn(), MethodThunk<A, R>>(self.0) }
    }

    pub(crate) unsafe fn restore_const_method<A: ArgList, R>(self) -> ConstMethodThunk<A, R> {
        unsafe { mem::transmute::<unsafe fn(), ConstMethodThunk<A, R>>(self.0) }
    }

    pub(crate) unsafe fn restore_free<A: ArgList, R>(self) -> FreeThunk<A, R> {
        unsafe { mem::transmute::<unsafe fn(), FreeThunk<A, R>>(self.0) }
    }
}
