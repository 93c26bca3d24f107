use std::{any::type_name, ops::Deref, sync::Arc};

use crate::{
    errors::LifecycleErrorKind,
    lifecycle::{Lifecycle, LifecycleState},
    utils::future::BoxFuture,
};

/// Long-lived component started and stopped together with the container.
///
/// ```rust
/// use warden::{utils::future::BoxFuture, Service};
///
/// struct Worker;
///
/// impl Service for Worker {
///     fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
///         Box::pin(async { Ok(()) })
///     }
///
///     fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
///         Box::pin(async { Ok(()) })
///     }
/// }
/// ```
pub trait Service: Send + Sync + 'static {
    fn start(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Service composed with its own lifecycle.
///
/// Guarded [`Managed::start`] and [`Managed::stop`] are the only way the container drives a service,
/// so the service body never runs twice concurrently.
pub struct Managed<S: ?Sized> {
    lifecycle: Lifecycle,
    inner: Arc<S>,
}

impl<S: ?Sized + Service> Managed<S> {
    #[must_use]
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            lifecycle: Lifecycle::new(type_name::<S>()),
            inner,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.lifecycle.name()
    }

    #[inline]
    #[must_use]
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// # Errors
    /// - Returns [`LifecycleErrorKind::InvalidTransition`] if the service isn't stopped
    /// - Returns [`LifecycleErrorKind::Service`] if the service fails to start
    pub async fn start(&self) -> Result<(), LifecycleErrorKind> {
        self.lifecycle
            .start(async {
                self.inner.start().await.map_err(|source| LifecycleErrorKind::Service {
                    service: self.name(),
                    source,
                })
            })
            .await
    }

    /// The service is stopped even if its stop fails.
    ///
    /// # Errors
    /// - Returns [`LifecycleErrorKind::InvalidTransition`] if the service isn't started
    /// - Returns [`LifecycleErrorKind::Service`] if the service fails to stop
    pub async fn stop(&self) -> Result<(), LifecycleErrorKind> {
        self.lifecycle
            .stop(self.inner.stop())
            .await?
            .map_err(|source| LifecycleErrorKind::Service {
                service: self.name(),
                source,
            })
    }

    pub async fn starting(&self) {
        self.lifecycle.starting().await;
    }

    pub async fn started(&self) {
        self.lifecycle.started().await;
    }

    pub async fn stopping(&self) {
        self.lifecycle.stopping().await;
    }

    pub async fn stopped(&self) {
        self.lifecycle.stopped().await;
    }
}

impl<S: ?Sized> Deref for Managed<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Object-safe view over [`Managed`] used for the fan-out.
pub(crate) trait ManagedService: Send + Sync {
    fn name(&self) -> &'static str;
    fn state(&self) -> LifecycleState;
    fn start(&self) -> BoxFuture<'_, Result<(), LifecycleErrorKind>>;
    fn stop(&self) -> BoxFuture<'_, Result<(), LifecycleErrorKind>>;
}

impl<S: ?Sized + Service> ManagedService for Managed<S> {
    fn name(&self) -> &'static str {
        Managed::name(self)
    }

    fn state(&self) -> LifecycleState {
        Managed::state(self)
    }

    fn start(&self) -> BoxFuture<'_, Result<(), LifecycleErrorKind>> {
        Box::pin(Managed::start(self))
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), LifecycleErrorKind>> {
        Box::pin(Managed::stop(self))
    }
}
