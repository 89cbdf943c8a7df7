use std::time::Duration;

/// Default lobby server endpoint; overridable per instance.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Connection tuning for a [`crate::LobbyConnection`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint the client connects to. Identity query parameters
    /// are appended at connect time.
    pub endpoint: String,
    /// Automatic reconnection gives up after this many failed attempts.
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles per attempt.
    pub base_backoff_ms: u64,
    /// Ceiling for the exponential backoff.
    pub max_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_reconnect_attempts: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt number `attempt` (zero-based):
    /// `min(base * 2^attempt, max)`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .base_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}
