use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for [`SessionConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionConfigBuilder {
    agent_id: String,
    poll_interval: Option<Duration>,
    upload_timeout: Option<Duration>,
    classify_api_debug: bool,
}

impl SessionConfigBuilder {
    /// Creates a builder for sessions with the given voice agent.
    #[inline]
    pub fn with_agent_id<S: Into<String>>(agent_id: S) -> Self {
        Self {
            agent_id: agent_id.into(),
            poll_interval: None,
            upload_timeout: None,
            classify_api_debug: false,
        }
    }

    /// Sets how often trip data is polled. Zero is replaced by the default.
    #[inline]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets how long the final transcript upload may take before it is
    /// abandoned.
    #[inline]
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    /// Files payloads carrying `apiResponse`/`rawResponse` under the
    /// api-debug role instead of the assistant.
    #[inline]
    pub fn classify_api_debug(mut self, enabled: bool) -> Self {
        self.classify_api_debug = enabled;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            agent_id: self.agent_id,
            poll_interval: self
                .poll_interval
                .filter(|interval| !interval.is_zero())
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            upload_timeout: self.upload_timeout.unwrap_or(DEFAULT_UPLOAD_TIMEOUT),
            classify_api_debug: self.classify_api_debug,
        }
    }
}

/// Configuration of a session orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionConfig {
    pub(crate) agent_id: String,
    pub(crate) poll_interval: Duration,
    pub(crate) upload_timeout: Duration,
    pub(crate) classify_api_debug: bool,
}

impl SessionConfig {
    /// The voice agent to connect to.
    #[inline]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The trip data polling interval.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The final transcript upload timeout.
    #[inline]
    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }
}
