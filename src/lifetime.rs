use std::sync::Weak;
use tracing::error;

use crate::{
    container::{Shared, StopReport},
    errors::LifecycleErrorKind,
    lifecycle::LifecycleState,
};

/// Handle to the lifecycle of the container, registered as a singleton in every container.
///
/// Services can inject it to wait for the container boundaries or to request a shutdown.
/// It doesn't keep the container alive.
pub struct ApplicationLifetime {
    shared: Weak<Shared>,
}

impl ApplicationLifetime {
    pub(crate) const fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// [`LifecycleState::Unknown`] if the container was dropped
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.shared
            .upgrade()
            .map_or(LifecycleState::Unknown, |shared| shared.lifecycle.state())
    }

    pub async fn started(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lifecycle.started().await;
        }
    }

    pub async fn stopping(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lifecycle.stopping().await;
        }
    }

    pub async fn stopped(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lifecycle.stopped().await;
        }
    }

    /// Stops the container the same way [`crate::Container::stop`] does.
    ///
    /// # Errors
    /// - Returns [`LifecycleErrorKind::Detached`] if the container was dropped
    /// - Returns [`LifecycleErrorKind::InvalidTransition`] if the container isn't started
    pub async fn stop_application(&self) -> Result<StopReport, LifecycleErrorKind> {
        let Some(shared) = self.shared.upgrade() else {
            let err = LifecycleErrorKind::Detached;
            error!("{}", err);
            return Err(err);
        };

        shared.stop().await
    }
}
