use std::fmt::Debug;
use std::time::Duration;

use reqwest::Url;

use crate::{Error, ErrorKind};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`HttpBackendConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpBackendConfigBuilder {
    base_url: String,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
}

impl HttpBackendConfigBuilder {
    /// Creates a builder pointing at the given backend.
    #[inline]
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout: None,
        }
    }

    /// Sends the key as a bearer token with every request.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the transport level timeout applied to every request.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the configuration, validating the base URL.
    pub fn build(self) -> Result<HttpBackendConfig, Error> {
        let trimmed = self.base_url.trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|err| {
            Error::new(
                format!("invalid base URL {:?}: {err}", self.base_url),
                ErrorKind::Other,
            )
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::new(
                format!("base URL {:?} cannot be a base", self.base_url),
                ErrorKind::Other,
            ));
        }
        Ok(HttpBackendConfig {
            base_url: trimmed.to_owned(),
            api_key: self.api_key,
            request_timeout: self
                .request_timeout
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

impl Default for HttpBackendConfigBuilder {
    #[inline]
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl Debug for HttpBackendConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackendConfigBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Configuration for [`crate::HttpBackend`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpBackendConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) request_timeout: Duration,
}

impl HttpBackendConfig {
    /// Returns the base URL without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Debug for HttpBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
