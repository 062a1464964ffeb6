//! Global variables registered at namespace or file level.

use std::any::Any;

use bitflags::bitflags;

use crate::entity::{Entity, EntityInfo, EntityKind};
use crate::error::InvocationError;
use crate::types::Type;
use crate::EntityId;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VarFlags: u8 {
        const STATIC = 1 << 0;
    }
}

/// A reflected global backed by `'static` storage.
#[derive(Debug)]
pub struct Variable {
    info: EntityInfo,
    ty: Type,
    flags: VarFlags,
    value: &'static (dyn Any + Send + Sync),
}

impl Variable {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, id: EntityId, flags: VarFlags, value: &'static T) -> Self {
        Self {
            info: EntityInfo::new(name, id),
            ty: Type::of::<T>(),
            flags,
            value,
        }
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    #[inline]
    pub fn flags(&self) -> VarFlags {
        self.flags
    }

    pub fn get<T: 'static>(&self) -> Result<&'static T, InvocationError> {
        let value: &'static (dyn Any + Send + Sync) = self.value;
        value.downcast_ref::<T>().ok_or_else(|| InvocationError::ValueTypeMismatch {
            member: self.info.name().to_owned(),
            expected: self.ty.name(),
            found: std::any::type_name::<T>(),
        })
    }
}

impl Entity for Variable {
    #[inline]
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    #[inline]
    fn kind(&self) -> EntityKind {
        EntityKind::VARIABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::entity_id;

    static GRAVITY: f32 = 9.81;

    #[test]
    fn typed_read() {
        let variable = Variable::new("gravity", entity_id("physics::gravity"), VarFlags::STATIC, &GRAVITY);
        assert_eq!(variable.get::<f32>(), Ok(&9.81));
        assert_eq!(variable.ty(), Type::of::<f32>());
        assert!(matches!(variable.get::<f64>(), Err(InvocationError::ValueTypeMismatch { .. })));
        assert_eq!(variable.kind(), EntityKind::VARIABLE);
    }
}
