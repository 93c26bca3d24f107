use crate::any::{self, AnyInstance, TypeInfo};

/// Scoped instances of one scope.
#[derive(Default)]
pub(crate) struct Cache {
    map: Option<Box<any::Map>>,
}

impl Cache {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { map: None }
    }

    #[must_use]
    pub(crate) fn get(&self, type_info: &TypeInfo) -> Option<AnyInstance> {
        self.map.as_ref().and_then(|map| map.get(type_info)).cloned()
    }

    /// Inserts the instance unless another one is already cached, returning the cached one.
    pub(crate) fn insert(&mut self, type_info: TypeInfo, instance: AnyInstance) -> AnyInstance {
        self.map
            .get_or_insert_with(Box::default)
            .entry(type_info)
            .or_insert(instance)
            .clone()
    }

    #[inline]
    #[must_use]
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }
}
