//! Command dispatch: resolves settings, builds the backend client, and hands
//! off to the per-command handlers.

pub mod config_cmd;
pub mod data_points;
pub mod ping;
pub mod servers;

use uabridge_api::BackendClient;
use uabridge_config::{ConfigError, Settings};
use uabridge_core::CoreError;
use url::Url;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// A connected backend plus the URL used for diagnostics.
pub struct BackendCtx {
    pub client: BackendClient,
    pub url: Url,
}

impl BackendCtx {
    pub fn connect(settings: &Settings) -> Result<Self, CliError> {
        let url = settings.api_url()?;
        let transport = settings.transport_config()?;
        let client = BackendClient::new(url.clone(), &transport).map_err(CoreError::from)?;
        Ok(Self { client, url })
    }

    /// Translate a core error, naming this backend in connection failures.
    pub fn error(&self, err: CoreError) -> CliError {
        CliError::from(err).with_url(&self.url)
    }
}

/// Load settings from file and environment, then apply the global flags.
pub fn resolve_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let mut settings: Settings = uabridge_config::figment(global.config.as_deref())
        .extract()
        .map_err(ConfigError::from)?;

    if let Some(ref api_url) = global.api_url {
        settings.api_url.clone_from(api_url);
    }
    if let Some(ref token) = global.access_token {
        settings.access_token = Some(token.clone());
    }
    if let Some(timeout) = global.timeout {
        settings.timeout = timeout;
    }
    if global.insecure {
        settings.insecure = true;
    }

    settings.validate()?;
    Ok(settings)
}

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = resolve_settings(global)?;
    tracing::debug!(?settings, "resolved settings");

    match cmd {
        // Config commands don't need a backend connection
        Command::Config(args) => config_cmd::handle(&args, &settings, global),

        Command::Ping => ping::handle(&BackendCtx::connect(&settings)?, global).await,
        Command::Servers(args) => {
            let ctx = BackendCtx::connect(&settings)?;
            servers::handle(&ctx, &args, &settings.bridge_config(), global).await
        }
        Command::DataPoints(args) => {
            data_points::tracked(&BackendCtx::connect(&settings)?, &args, global).await
        }
        Command::Pending(args) => {
            data_points::pending(&BackendCtx::connect(&settings)?, &args, global).await
        }
    }
}
