use std::time::Duration;

/// Config of a container
/// ## Fields
/// - `start_timeout`:
///   Timeout of [`crate::Container::start`] applied when the call doesn't pass one.
///   `None` means no timeout.
///
/// - `rollback_partial_start`:
///   If `true`, services that already started are stopped again when startup fails or times out,
///   so the container can be started once more.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub start_timeout: Option<Duration>,
    pub rollback_partial_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_timeout: None,
            rollback_partial_start: true,
        }
    }
}
