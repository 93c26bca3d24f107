use std::time::Duration;

use crate::lifecycle::{LifecycleState, Transition};

#[derive(thiserror::Error, Debug)]
pub enum LifecycleErrorKind {
    #[error("Invalid lifecycle transition of {name}: can't {attempted} while {current}")]
    InvalidTransition {
        name: &'static str,
        current: LifecycleState,
        attempted: Transition,
    },
    #[error("Startup timed out after {timeout:?}")]
    StartTimeout { timeout: Duration },
    #[error("Service {service} failed")]
    Service {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("Container was dropped")]
    Detached,
}
