use std::time::Duration;

use thiserror::Error;
use voyagr_core::{SessionConfig, SessionConfigBuilder};
use voyagr_http_backend::{HttpBackendConfig, HttpBackendConfigBuilder};

/// Base URL of the trip backend.
pub const BACKEND_URL_VAR: &str = "VOYAGR_BACKEND_URL";
/// Voice agent to connect to. Required.
pub const AGENT_ID_VAR: &str = "VOYAGR_AGENT_ID";
/// Bearer token sent to the backend.
pub const API_KEY_VAR: &str = "VOYAGR_API_KEY";
/// Trip data polling interval in whole seconds.
pub const POLL_INTERVAL_VAR: &str = "VOYAGR_POLL_INTERVAL_SECS";

/// The configuration could not be assembled from the environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable is set to something unusable.
    #[error("{name} has an invalid value {value:?}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
    /// The backend configuration was rejected.
    #[error(transparent)]
    Backend(#[from] voyagr_http_backend::Error),
}

/// Reads the session and backend configuration through `lookup`, which
/// maps a variable name to its value.
pub(crate) fn load<F>(lookup: F) -> Result<(SessionConfig, HttpBackendConfig), EnvError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let agent_id = lookup(AGENT_ID_VAR).ok_or(EnvError::Missing(AGENT_ID_VAR))?;
    let mut session = SessionConfigBuilder::with_agent_id(agent_id.trim());
    if let Some(value) = lookup(POLL_INTERVAL_VAR) {
        let secs = value.trim().parse::<u64>().ok().filter(|secs| *secs > 0).ok_or(
            EnvError::Invalid {
                name: POLL_INTERVAL_VAR,
                value,
            },
        )?;
        session = session.with_poll_interval(Duration::from_secs(secs));
    }

    let mut backend = match lookup(BACKEND_URL_VAR) {
        Some(url) => HttpBackendConfigBuilder::with_base_url(url.trim()),
        None => HttpBackendConfigBuilder::default(),
    };
    if let Some(api_key) = lookup(API_KEY_VAR) {
        backend = backend.with_api_key(api_key.trim());
    }

    Ok((session.build(), backend.build()?))
}
