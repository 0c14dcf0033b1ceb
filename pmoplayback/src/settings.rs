use std::time::Duration;

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(2500);
pub const DEFAULT_POSITION_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SEEK_STEP_SECS: u64 = 5;

/// Tunables of a playback session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Bound on confirmation waits; also subtracted from the expected track end
    /// and used as the pause watchdog delay.
    pub response_timeout: Duration,
    pub position_poll_interval: Duration,
    pub seek_step_secs: u64,
    pub instance_id: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            position_poll_interval: DEFAULT_POSITION_POLL_INTERVAL,
            seek_step_secs: DEFAULT_SEEK_STEP_SECS,
            instance_id: 0,
        }
    }
}
