//! `uabridge ping`

use serde::Serialize;
use uabridge_core::Backend;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::BackendCtx;

#[derive(Serialize)]
struct PingResult {
    url: String,
    healthy: bool,
}

pub async fn handle(ctx: &BackendCtx, global: &GlobalOpts) -> Result<(), CliError> {
    let healthy = ctx
        .client
        .health_check()
        .await
        .map_err(|e| ctx.error(e))?;

    if !healthy {
        return Err(CliError::Unhealthy {
            url: ctx.url.to_string(),
        });
    }

    let result = PingResult {
        url: ctx.url.to_string(),
        healthy,
    };
    let out = output::render_single(&global.output, &result, |r| {
        format!("Backend at {} is healthy", r.url)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
