use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{
    any::{AnyInstance, TypeInfo},
    cache::Cache,
};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// Handle of one scope, shared by every clone of a scoped container.
#[derive(Clone)]
pub(crate) struct ScopeContext {
    id: u64,
    cache: Arc<Mutex<Cache>>,
}

impl ScopeContext {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            cache: Arc::new(Mutex::new(Cache::new())),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub(crate) fn get(&self, type_info: &TypeInfo) -> Option<AnyInstance> {
        self.cache.lock().get(type_info)
    }

    pub(crate) fn insert(&self, type_info: TypeInfo, instance: AnyInstance) -> AnyInstance {
        self.cache.lock().insert(type_info, instance)
    }
}
