// Server endpoints
//
// The server index is the desired connection set; updates report the
// outcome of each connection attempt back onto the record.

use tracing::debug;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{ServerRecord, ServerUpdate};

impl BackendClient {
    /// List every server record.
    ///
    /// `GET /api/server_manager/server/index`
    ///
    /// The staleness gate is applied by the caller; the backend has no
    /// filter for it.
    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>, Error> {
        let url = self.api_url("server_manager/server/index")?;
        debug!("listing servers");
        self.get(url).await
    }

    /// Report a connection attempt on a server.
    ///
    /// `PATCH /api/server_manager/server/update?id={id}`
    pub async fn update_server(&self, id: i64, update: &ServerUpdate) -> Result<(), Error> {
        let id = id.to_string();
        let url = self.api_url_with_query("server_manager/server/update", &[("id", &id)])?;
        debug!(server_id = %id, has_error = update.has_connection_error, "updating server");
        self.patch(url, update).await
    }
}
