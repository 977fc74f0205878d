// Remote commands
pub mod deploy;
pub mod state;

// Local commands
pub mod config;
pub mod validate;

use anyhow::Result;
use dashkit::backend::rest::RestBackend;
use dashkit::Settings;

use crate::config::SqldashConfig;

/// Build the HTTP backend and run settings from resolved config
pub fn connect(config: &SqldashConfig) -> Result<(RestBackend, Settings)> {
    let settings = config.settings()?;
    let backend = RestBackend::new(settings.host.clone(), &config.token()?);
    log::debug!("Connecting to {} as {}", backend.host(), config.token_env());
    Ok((backend, settings))
}
