//! Registry configuration.

use std::time::Duration;

/// Default capacity of a hub's command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Default capacity of an engine's action queue.
pub const DEFAULT_ACTION_CAPACITY: usize = 256;

/// Per-session channel sizes and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Bound on queued register/unregister commands.
    pub command_capacity: usize,

    /// Bound on actions queued for the engine.
    pub action_capacity: usize,

    /// How long a session may have no members before it shuts down.
    pub empty_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            action_capacity: DEFAULT_ACTION_CAPACITY,
            empty_grace: Duration::from_secs(60),
        }
    }
}
