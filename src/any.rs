use std::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::errors::ResolveErrorKind;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }
}

/// Shared instance with its key type erased.
///
/// The inner value is an `Arc<T>` of the key type `T`, which lets unsized keys
/// such as `dyn Trait` live in the same storage as sized ones.
#[derive(Clone)]
pub struct AnyInstance {
    type_info: TypeInfo,
    value: Arc<dyn Any + Send + Sync>,
}

impl AnyInstance {
    #[inline]
    #[must_use]
    pub(crate) fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<T>(),
            value: Arc::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the instance wasn't stored under `T`
    pub fn downcast<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.value.downcast_ref::<Arc<T>>() {
            Some(value) => Ok(value.clone()),
            None => Err(ResolveErrorKind::IncorrectType {
                expected: TypeInfo::of::<T>(),
                actual: self.type_info,
            }),
        }
    }
}

pub(crate) type Map = BTreeMap<TypeInfo, AnyInstance>;
