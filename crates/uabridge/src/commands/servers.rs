//! `uabridge servers`: the server snapshot with the staleness-gate verdict.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use uabridge_core::{Backend, BridgeConfig, Server};

use crate::cli::{GlobalOpts, ServersArgs};
use crate::error::CliError;
use crate::output;

use super::BackendCtx;

// ── View ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ServerView {
    #[serde(flatten)]
    server: Server,
    /// Whether the bridge would keep a session open right now.
    due: bool,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Checked")]
    checked: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&ServerView> for ServerRow {
    fn from(v: &ServerView) -> Self {
        let s = &v.server;
        let error = if s.has_connection_error {
            s.connection_error.clone().unwrap_or_else(|| "unknown".into())
        } else {
            String::new()
        };
        Self {
            id: s.id.to_string(),
            name: s.name.clone().unwrap_or_default(),
            address: s.address.clone(),
            due: output::yes_no(v.due),
            checked: output::timestamp_cell(s.checked_at),
            updated: output::timestamp_cell(s.updated_at),
            error,
        }
    }
}

fn views(
    servers: Vec<Server>,
    now: DateTime<Utc>,
    config: &BridgeConfig,
    only_due: bool,
) -> Vec<ServerView> {
    let mut views: Vec<ServerView> = servers
        .into_iter()
        .map(|server| ServerView {
            due: server.is_due(now, config.staleness_window),
            server,
        })
        .filter(|v| v.due || !only_due)
        .collect();
    views.sort_by_key(|v| v.server.id);
    views
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    ctx: &BackendCtx,
    args: &ServersArgs,
    config: &BridgeConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let servers = ctx
        .client
        .fetch_servers()
        .await
        .map_err(|e| ctx.error(e))?;

    let views = views(servers, Utc::now(), config, args.due);
    let out = output::render_list(&global.output, &views, |v| ServerRow::from(v))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
