//! Config subcommand handlers.

use serde::Serialize;

use uabridge_config::Settings;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Settings as shown to the operator: the token only as set / unset.
#[derive(Serialize)]
struct ConfigView<'a> {
    #[serde(flatten)]
    settings: &'a Settings,
    access_token: &'static str,
}

pub fn handle(args: &ConfigArgs, settings: &Settings, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let view = ConfigView {
                settings,
                access_token: if settings.has_access_token() {
                    "[set]"
                } else {
                    "[unset]"
                },
            };
            let toml = settings.to_toml()?;
            let out = output::render_single(&global.output, &view, |v| {
                format!("{toml}\n# access_token: {}", v.access_token)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(uabridge_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
    }
}
