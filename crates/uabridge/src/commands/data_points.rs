//! `uabridge data-points` and `uabridge pending`.

use serde::Serialize;
use tabled::Tabled;

use uabridge_core::{Backend, DataPoint, ServerId};

use crate::cli::{DataPointsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::BackendCtx;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DataPointRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Pending")]
    pending: String,
    #[tabled(rename = "Write Error")]
    write_error: String,
}

impl From<&DataPoint> for DataPointRow {
    fn from(p: &DataPoint) -> Self {
        Self {
            id: p.id.to_string(),
            server: p.server_id.to_string(),
            path: p.path.clone(),
            name: p.display_name.clone().unwrap_or_default(),
            pending: p
                .pending_value
                .as_ref()
                .filter(|v| !v.is_null())
                .map_or_else(|| "-".into(), ToString::to_string),
            write_error: match (&p.write_error, p.write_error_at) {
                (Some(e), at) => format!("{e} ({})", output::timestamp_cell(at)),
                (None, _) => String::new(),
            },
        }
    }
}

fn select(mut points: Vec<DataPoint>, server: Option<i64>) -> Vec<DataPoint> {
    if let Some(id) = server.map(ServerId::new) {
        points.retain(|p| p.server_id == id);
    }
    points.sort_by_key(|p| p.id);
    points
}

fn render(points: &[DataPoint], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(&global.output, points, |p| DataPointRow::from(p))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn tracked(
    ctx: &BackendCtx,
    args: &DataPointsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let points = ctx
        .client
        .fetch_tracked_data_points()
        .await
        .map_err(|e| ctx.error(e))?;
    render(&select(points, args.server), global)
}

/// Writes the next write-back tick would push.
pub async fn pending(
    ctx: &BackendCtx,
    args: &DataPointsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let points = ctx
        .client
        .fetch_pending_writes()
        .await
        .map_err(|e| ctx.error(e))?;
    let points: Vec<DataPoint> = points
        .into_iter()
        .filter(|p| p.pending_write().is_some())
        .collect();
    render(&select(points, args.server), global)
}
