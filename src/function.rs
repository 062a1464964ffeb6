//! Methods, static methods and free functions, with unchecked and checked
//! dynamic invocation.
//!
//! A method is bound to the struct that declares it. Callers may hold an
//! object whose dynamic archetype is any subclass of that struct, so the
//! receiver address is moved to the declaring sub-object before the call
//! (see [`crate::layout`]).

use std::sync::OnceLock;

use bitflags::bitflags;
use tracing::trace;

use crate::entity::{Entity, EntityInfo, EntityKind};
use crate::error::InvocationError;
use crate::invoke::{ArgList, ConstMethodThunk, ErasedFn, FreeThunk, MethodThunk, Signature};
use crate::layout::sub_object_offset;
use crate::structure::Struct;
use crate::types::Object;
use crate::EntityId;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u16 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        const INLINE = 1 << 4;
        const VIRTUAL = 1 << 5;
        const PURE_VIRTUAL = 1 << 6;
        const OVERRIDE = 1 << 7;
        const FINAL = 1 << 8;
        const CONST = 1 << 9;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u8 {
        const STATIC = 1 << 0;
        const INLINE = 1 << 1;
    }
}

/// Signature plus erased thunk.
#[derive(Clone)]
struct Callable {
    signature: Signature,
    thunk: ErasedFn,
}

impl Callable {
    fn name_parameters(mut self, names: &[&str]) -> Self {
        self.signature.set_parameter_names(names);
        self
    }
}

// =============================================================================
// Method
// =============================================================================

pub struct Method {
    info: EntityInfo,
    flags: MethodFlags,
    callable: Callable,
    declaring: OnceLock<&'static Struct>,
}

impl Method {
    /// Method taking a mutable receiver.
    ///
    /// The thunk receives the address of the declaring-struct sub-object.
    pub fn new<A: ArgList, R: 'static>(
        name: impl Into<String>,
        id: EntityId,
        flags: MethodFlags,
        thunk: MethodThunk<A, R>,
    ) -> Self {
        Self::with_callable(
            name,
            id,
            flags - MethodFlags::CONST - MethodFlags::STATIC,
            Callable {
                signature: Signature::of::<A, R>(),
                thunk: ErasedFn::from_method(thunk),
            },
        )
    }

    /// Method taking a shared receiver.
    pub fn new_const<A: ArgList, R: 'static>(
        name: impl Into<String>,
        id: EntityId,
        flags: MethodFlags,
        thunk: ConstMethodThunk<A, R>,
    ) -> Self {
        Self::with_callable(
            name,
            id,
            (flags | MethodFlags::CONST) - MethodFlags::STATIC,
            Callable {
                signature: Signature::of::<A, R>(),
                thunk: ErasedFn::from_const_method(thunk),
            },
        )
    }

    fn with_callable(name: impl Into<String>, id: EntityId, flags: MethodFlags, callable: Callable) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            flags,
            callable,
            declaring: OnceLock::new(),
        }
    }

    pub fn with_parameter_names(mut self, names: &[&str]) -> Self {
        self.callable = self.callable.name_parameters(names);
        self
    }

    #[inline]
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.callable.signature
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.flags.contains(MethodFlags::CONST)
    }

    #[inline]
    pub fn declaring_struct(&self) -> Option<&'static Struct> {
        self.declaring.get().copied()
    }

    pub(crate) fn bind(&'static self, owner: &'static Struct) {
        let _ = self.declaring.set(owner);
        self.info.set_outer_entity(Some(&owner.into()));
    }

    /// Copy inheritable properties of the overridden parent method.
    ///
    /// No-op unless this method is flagged `OVERRIDE` and is bound to a struct.
    pub fn inherit_base_method_properties(&self) {
        if !self.flags.contains(MethodFlags::OVERRIDE) {
            return;
        }
        let Some(declaring) = self.declaring_struct() else {
            return;
        };

        let overridden = declaring.direct_parents().iter().find_map(|parent| {
            parent
                .archetype()
                .get_methods_by_name(self.name(), MethodFlags::empty(), true)
                .into_iter()
                .find(|base| base.signature().same_types(self.signature()))
        });

        if let Some(base) = overridden {
            self.info.inherit_properties_from(EntityKind::METHOD, base.info());
        }
    }

    // -------------------------------------------------------------------------
    // Unchecked invocation
    // -------------------------------------------------------------------------

    /// Call through an object that reports its dynamic archetype.
    ///
    /// The receiver is moved to the declaring sub-object when a path exists
    /// and used as-is otherwise.
    ///
    /// # Safety
    ///
    /// `A` and `R` must be exactly the declared parameter and return types,
    /// and `caller` must actually contain the declaring struct.
    pub unsafe fn invoke<A: ArgList, R: 'static, C: Object + ?Sized>(&self, caller: &mut C, args: A) -> R {
        let offset = self.receiver_offset(caller.dynamic_archetype()).unwrap_or(0);
        let receiver = (caller as *mut C).cast::<u8>();
        unsafe { self.invoke_raw(receiver.add(offset), args) }
    }

    /// Call through a shared reference.
    ///
    /// # Safety
    ///
    /// As [`invoke`](Self::invoke); in addition the method must not mutate
    /// its receiver unless `C` allows interior mutation there.
    pub unsafe fn invoke_const<A: ArgList, R: 'static, C: Object + ?Sized>(&self, caller: &C, args: A) -> R {
        let offset = self.receiver_offset(caller.dynamic_archetype()).unwrap_or(0);
        let receiver = (caller as *const C).cast::<u8>();
        unsafe { self.invoke_raw(receiver.add(offset).cast_mut(), args) }
    }

    /// Call with a receiver address used as-is.
    ///
    /// # Safety
    ///
    /// `receiver` must point to a live instance of the declaring struct, and
    /// `A`/`R` must be exactly the declared types.
    pub unsafe fn invoke_raw<A: ArgList, R: 'static>(&self, receiver: *mut u8, args: A) -> R {
        let thunk = self.callable.thunk;
        if self.is_const() {
            unsafe { thunk.restore_const_method::<A, R>()(receiver.cast_const(), args) }
        } else {
            unsafe { thunk.restore_method::<A, R>()(receiver, args) }
        }
    }

    // -------------------------------------------------------------------------
    // Checked invocation
    // -------------------------------------------------------------------------

    /// Call a non-const method after validating arguments, return type,
    /// constness and caller.
    pub fn checked_invoke<A: ArgList, R: 'static, C: Object + ?Sized>(
        &self,
        caller: &mut C,
        args: A,
    ) -> Result<R, InvocationError> {
        self.check_call::<A, R>(false)?;
        let offset = self.checked_receiver_offset(caller.dynamic_archetype())?;
        let receiver = (caller as *mut C).cast::<u8>();
        // SAFETY: signature, constness and caller were validated; `Object`
        // guarantees the offsets match the caller's layout.
        Ok(unsafe { self.callable.thunk.restore_method::<A, R>()(receiver.add(offset), args) })
    }

    /// Call a const method after validating arguments, return type,
    /// constness and caller.
    pub fn checked_invoke_const<A: ArgList, R: 'static, C: Object + ?Sized>(
        &self,
        caller: &C,
        args: A,
    ) -> Result<R, InvocationError> {
        self.check_call::<A, R>(true)?;
        let offset = self.checked_receiver_offset(caller.dynamic_archetype())?;
        let receiver = (caller as *const C).cast::<u8>();
        // SAFETY: as above.
        Ok(unsafe { self.callable.thunk.restore_const_method::<A, R>()(receiver.add(offset), args) })
    }

    fn check_call<A: ArgList, R: 'static>(&self, const_path: bool) -> Result<(), InvocationError> {
        self.callable.signature.check::<A, R>(self.name())?;
        if self.is_const() != const_path {
            return Err(InvocationError::ConstViolation {
                member: self.name().to_owned(),
                method_is_const: self.is_const(),
            });
        }
        Ok(())
    }

    fn receiver_offset(&self, dynamic: &Struct) -> Option<usize> {
        sub_object_offset(dynamic, self.declaring_struct()?)
    }

    fn checked_receiver_offset(&self, dynamic: &Struct) -> Result<usize, InvocationError> {
        let declaring = self.declaring_struct();
        let offset = declaring
            .filter(|declaring| declaring.is_base_of(dynamic))
            .and_then(|declaring| sub_object_offset(dynamic, declaring));

        match offset {
            Some(offset) => {
                if offset != 0 {
                    trace!(method = %self.name(), caller = %dynamic.name(), offset, "receiver adjusted");
                }
                Ok(offset)
            }
            None => Err(InvocationError::InvalidCaller {
                member: self.name().to_owned(),
                caller: dynamic.name().to_owned(),
                declaring: declaring.map_or("<unregistered>", |declaring| declaring.name()).to_owned(),
            }),
        }
    }
}

impl Entity for Method {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::METHOD
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name())
            .field("flags", &self.flags)
            .field("signature", self.signature())
            .finish()
    }
}

// =============================================================================
// StaticMethod
// =============================================================================

/// A method without receiver.
pub struct StaticMethod {
    info: EntityInfo,
    flags: MethodFlags,
    callable: Callable,
    declaring: OnceLock<&'static Struct>,
}

impl StaticMethod {
    pub fn new<A: ArgList, R: 'static>(
        name: impl Into<String>,
        id: EntityId,
        flags: MethodFlags,
        thunk: FreeThunk<A, R>,
    ) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            flags: (flags | MethodFlags::STATIC) - MethodFlags::CONST,
            callable: Callable {
                signature: Signature::of::<A, R>(),
                thunk: ErasedFn::from_free(thunk),
            },
            declaring: OnceLock::new(),
        }
    }

    pub fn with_parameter_names(mut self, names: &[&str]) -> Self {
        self.callable = self.callable.name_parameters(names);
        self
    }

    #[inline]
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.callable.signature
    }

    #[inline]
    pub fn declaring_struct(&self) -> Option<&'static Struct> {
        self.declaring.get().copied()
    }

    pub(crate) fn bind(&'static self, owner: &'static Struct) {
        let _ = self.declaring.set(owner);
        self.info.set_outer_entity(Some(&owner.into()));
    }

    /// # Safety
    ///
    /// `A` and `R` must be exactly the declared parameter and return types.
    pub unsafe fn invoke<A: ArgList, R: 'static>(&self, args: A) -> R {
        unsafe { self.callable.thunk.restore_free::<A, R>()(args) }
    }

    pub fn checked_invoke<A: ArgList, R: 'static>(&self, args: A) -> Result<R, InvocationError> {
        self.callable.signature.check::<A, R>(self.name())?;
        // SAFETY: signature validated.
        Ok(unsafe { self.invoke(args) })
    }
}

impl Entity for StaticMethod {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::METHOD
    }
}

impl std::fmt::Debug for StaticMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticMethod")
            .field("name", &self.name())
            .field("flags", &self.flags)
            .field("signature", self.signature())
            .finish()
    }
}

// =============================================================================
// Function
// =============================================================================

/// A free function, registered at namespace or file level.
pub struct Function {
    info: EntityInfo,
    flags: FunctionFlags,
    callable: Callable,
}

impl Function {
    pub fn new<A: ArgList, R: 'static>(
        name: impl Into<String>,
        id: EntityId,
        flags: FunctionFlags,
        thunk: FreeThunk<A, R>,
    ) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            flags,
            callable: Callable {
                signature: Signature::of::<A, R>(),
                thunk: ErasedFn::from_free(thunk),
            },
        }
    }

    pub fn with_parameter_names(mut self, names: &[&str]) -> Self {
        self.callable = self.callable.name_parameters(names);
        self
    }

    #[inline]
    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.callable.signature
    }

    /// # Safety
    ///
    /// `A` and `R` must be exactly the declared parameter and return types.
    pub unsafe fn invoke<A: ArgList, R: 'static>(&self, args: A) -> R {
        unsafe { self.callable.thunk.restore_free::<A, R>()(args) }
    }

    pub fn checked_invoke<A: ArgList, R: 'static>(&self, args: A) -> Result<R, InvocationError> {
        self.callable.signature.check::<A, R>(self.name())?;
        // SAFETY: signature validated.
        Ok(unsafe { self.invoke(args) })
    }
}

impl Entity for Function {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::FUNCTION
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("flags", &self.flags)
            .field("signature", self.signature())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::hash::{entity_id, member_id};

    fn double((x,): (i32,)) -> i32 {
        x * 2
    }

    #[test]
    fn function_checked_invoke() {
        let function = Function::new("double", entity_id("double"), FunctionFlags::empty(), double)
            .with_parameter_names(&["x"]);

        assert_eq!(function.checked_invoke::<(i32,), i32>((21,)), Ok(42));
        assert_eq!(function.signature().parameters()[0].name(), "x");
        assert!(matches!(
            function.checked_invoke::<(i64,), i32>((21,)),
            Err(InvocationError::ArgTypeMismatch { index: 0, .. })
        ));
        assert_eq!(unsafe { function.invoke::<(i32,), i32>((4,)) }, 8);
    }

    #[test]
    fn mismatched_call_has_no_side_effect() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn bump((by,): (usize,)) {
            CALLS.fetch_add(by, Ordering::SeqCst);
        }

        let function = Function::new("bump", entity_id("bump"), FunctionFlags::empty(), bump);
        assert!(matches!(
            function.checked_invoke::<(), ()>(()),
            Err(InvocationError::ArgCountMismatch { expected: 1, found: 0, .. })
        ));
        assert!(function.checked_invoke::<(usize,), u8>((1,)).is_err());
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        function.checked_invoke::<(usize,), ()>((2,)).expect("call");
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn static_method_flags() {
        fn zero((): ()) -> u8 {
            0
        }

        let method = StaticMethod::new("zero", member_id(1, "zero", 0), MethodFlags::CONST, zero);
        assert!(method.flags().contains(MethodFlags::STATIC));
        assert!(!method.flags().contains(MethodFlags::CONST));
        assert_eq!(method.checked_invoke::<(), u8>(()), Ok(0));
        assert!(method.declaring_struct().is_none());
    }

    #[test]
    fn method_constness_flags() {
        unsafe fn get(this: *const u8, (): ()) -> u8 {
            unsafe { *this }
        }
        unsafe fn set(this: *mut u8, (value,): (u8,)) {
            unsafe { *this = value }
        }

        let getter = Method::new_const("get", 1, MethodFlags::PUBLIC, get as ConstMethodThunk<(), u8>);
        let setter = Method::new("set", 2, MethodFlags::PUBLIC | MethodFlags::CONST, set as MethodThunk<(u8,), ()>);
        assert!(getter.is_const());
        assert!(!setter.is_const());

        let mut byte = 5u8;
        unsafe {
            setter.invoke_raw::<(u8,), ()>(&mut byte, (9,));
            assert_eq!(getter.invoke_raw::<(), u8>(&mut byte, ()), 9);
        }
    }
}
