use std::time::Duration;

use crate::address::Interfaces;

/// Reply timeout used by the reference D-Bus implementation
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(25);

/// Settings fixed for the lifetime of an [`MprisClient`](crate::MprisClient)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub interfaces: Interfaces,
    /// Maximum time to wait for each reply. `None` waits forever.
    pub call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interfaces: Interfaces::default(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}
