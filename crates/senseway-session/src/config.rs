use std::time::Duration;

use senseway_frame::{FrameConfig, DEFAULT_HOST_ID};

/// How the correlator pairs a request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationMode {
    /// Skip queued frames that do not carry the expected message id (and
    /// sender, for unicast requests).
    #[default]
    Filtered,
    /// Take the next frame off the inbox, whatever it is. Callers verify it.
    Fifo,
}

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bus address used as transmitter id of every request.
    pub host_id: u8,
    /// Default response deadline for commands.
    pub command_timeout: Duration,
    /// Response matching strategy.
    pub correlation: CorrelationMode,
    /// Listener sleep after a read that returned immediately with no data.
    pub idle_backoff: Duration,
    /// Codec and read-buffer limits.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_id: DEFAULT_HOST_ID,
            command_timeout: Duration::from_secs(1),
            correlation: CorrelationMode::Filtered,
            idle_backoff: Duration::from_millis(10),
            frame: FrameConfig::default(),
        }
    }
}
