use std::{fmt, time::Duration};

use url::Url;

use crate::api::ValidationError;

pub const DEFAULT_BASE_URL: &str = "https://api.parcha.ai";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// What the polling driver does when a poll gets no HTTP response at all.
///
/// HTTP errors (any non-2xx) always propagate regardless of this setting.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TransportRetry {
    /// Surface the first transport failure, wrapped with the job id.
    #[default]
    Propagate,
    /// Count the failed poll as a non-terminal attempt and keep backing off.
    Backoff,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub transport_retry: TransportRetry,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            transport_retry: TransportRetry::default(),
        }
    }
}

impl PollPolicy {
    /// # Errors
    ///
    /// Fails if `max_attempts` is zero.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, ValidationError> {
        let policy = Self {
            max_attempts,
            base_delay,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    #[must_use]
    pub const fn with_transport_retry(mut self, transport_retry: TransportRetry) -> Self {
        self.transport_retry = transport_retry;
        self
    }

    /// # Errors
    ///
    /// Fails if `max_attempts` is zero, a driver with no attempts could
    /// never produce a definite answer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::ZeroAttempts);
        }
        Ok(())
    }

    /// Upper bound on time spent waiting between polls,
    /// `base_delay * (2^max_attempts - 1)`.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        let factor = 2u32
            .checked_pow(self.max_attempts)
            .map_or(u32::MAX, |p| p - 1);
        self.base_delay.saturating_mul(factor)
    }
}

/// Everything the transport needs, built once by the caller.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub token: String,
    pub agent_key: String,
    pub request_timeout: Option<Duration>,
    pub poll: PollPolicy,
}

impl ClientConfig {
    pub fn new(base_url: Url, token: impl Into<String>, agent_key: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            agent_key: agent_key.into(),
            request_timeout: None,
            poll: PollPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("agent_key", &self.agent_key)
            .field("request_timeout", &self.request_timeout)
            .field("poll", &self.poll)
            .finish()
    }
}
