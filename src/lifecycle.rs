use parking_lot::Mutex;
use std::{
    fmt::{self, Display, Formatter},
    future::Future,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::errors::LifecycleErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unknown,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
        })
    }
}

#[derive(Clone, Copy)]
struct Flag {
    set: bool,
    generation: u64,
}

/// Boundary flag that can be awaited.
///
/// Every [`Signal::set`] starts a new generation, so a waiter subscribed before it wakes up
/// even if the flag is cleared again before the waiter is polled.
pub(crate) struct Signal {
    sender: watch::Sender<Flag>,
}

impl Signal {
    fn new(set: bool) -> Self {
        let (sender, _) = watch::channel(Flag { set, generation: 0 });
        Self { sender }
    }

    fn set(&self) {
        self.sender.send_modify(|flag| {
            flag.set = true;
            flag.generation = flag.generation.wrapping_add(1);
        });
    }

    fn clear(&self) {
        self.sender.send_if_modified(|flag| std::mem::replace(&mut flag.set, false));
    }

    fn is_set(&self) -> bool {
        self.sender.borrow().set
    }

    /// Returns immediately if the signal is already set
    async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        let generation = receiver.borrow_and_update().generation;
        // The sender lives as long as `self`, so the wait can't fail
        let _ = receiver
            .wait_for(|flag| flag.set || flag.generation != generation)
            .await;
    }
}

/// Start/stop state machine with awaitable boundaries.
///
/// `Stopped` is the initial state. Guards are checked and flags are updated under a lock
/// that is never held while the transition work runs.
pub struct Lifecycle {
    name: &'static str,
    guard: Mutex<()>,
    starting: Signal,
    started: Signal,
    stopping: Signal,
    stopped: Signal,
}

impl Lifecycle {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            guard: Mutex::new(()),
            starting: Signal::new(false),
            started: Signal::new(false),
            stopping: Signal::new(false),
            stopped: Signal::new(true),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        let _guard = self.guard.lock();
        self.current()
    }

    fn current(&self) -> LifecycleState {
        if self.starting.is_set() {
            LifecycleState::Starting
        } else if self.stopping.is_set() {
            LifecycleState::Stopping
        } else if self.started.is_set() {
            LifecycleState::Started
        } else if self.stopped.is_set() {
            LifecycleState::Stopped
        } else {
            LifecycleState::Unknown
        }
    }

    fn invalid(&self, current: LifecycleState, attempted: Transition) -> LifecycleErrorKind {
        let err = LifecycleErrorKind::InvalidTransition {
            name: self.name,
            current,
            attempted,
        };
        error!("{}", err);
        err
    }

    /// Runs `work` as the start transition.
    ///
    /// # Errors
    /// - Returns [`LifecycleErrorKind::InvalidTransition`] if already starting, started or stopping
    /// - Returns the error of `work`, the state goes back to `Stopped` in this case
    pub async fn start<F>(&self, work: F) -> Result<(), LifecycleErrorKind>
    where
        F: Future<Output = Result<(), LifecycleErrorKind>>,
    {
        {
            let _guard = self.guard.lock();
            let current = self.current();
            if matches!(
                current,
                LifecycleState::Starting | LifecycleState::Started | LifecycleState::Stopping
            ) {
                return Err(self.invalid(current, Transition::Start));
            }
            self.starting.set();
        }
        info!(name = self.name, "Starting");

        let interrupted = Interrupted {
            lifecycle: self,
            transition: Transition::Start,
        };
        let result = work.await;
        interrupted.disarm();

        let _guard = self.guard.lock();
        self.starting.clear();
        match result {
            Ok(()) => {
                self.stopped.clear();
                self.started.set();
                info!(name = self.name, "Started");
                Ok(())
            }
            Err(err) => {
                self.stopped.set();
                error!(name = self.name, "Start failed: {}", err);
                Err(err)
            }
        }
    }

    /// Runs `work` as the stop transition. The state is `Stopped` afterwards whatever `work` returns.
    ///
    /// # Errors
    /// Returns [`LifecycleErrorKind::InvalidTransition`] if not started or already stopping
    pub async fn stop<F>(&self, work: F) -> Result<F::Output, LifecycleErrorKind>
    where
        F: Future,
    {
        {
            let _guard = self.guard.lock();
            let current = self.current();
            if current != LifecycleState::Started {
                return Err(self.invalid(current, Transition::Stop));
            }
            self.stopping.set();
        }
        info!(name = self.name, "Stopping");

        let interrupted = Interrupted {
            lifecycle: self,
            transition: Transition::Stop,
        };
        let output = work.await;
        interrupted.disarm();

        let _guard = self.guard.lock();
        self.stopping.clear();
        self.started.clear();
        self.stopped.set();
        info!(name = self.name, "Stopped");

        Ok(output)
    }

    pub async fn starting(&self) {
        self.starting.wait().await;
    }

    pub async fn started(&self) {
        self.started.wait().await;
    }

    pub async fn stopping(&self) {
        self.stopping.wait().await;
    }

    pub async fn stopped(&self) {
        self.stopped.wait().await;
    }
}

/// Restores a consistent state if a transition future is dropped before completion.
struct Interrupted<'a> {
    lifecycle: &'a Lifecycle,
    transition: Transition,
}

impl Interrupted<'_> {
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for Interrupted<'_> {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle;
        let _guard = lifecycle.guard.lock();

        lifecycle.starting.clear();
        lifecycle.stopping.clear();
        lifecycle.started.clear();
        lifecycle.stopped.set();

        warn!(name = lifecycle.name, transition = %self.transition, "Transition interrupted");
    }
}
