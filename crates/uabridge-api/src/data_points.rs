// Data point endpoints
//
// The backend calls data points "nodes". Both index queries are filtered
// server side; `pageSize=-1` disables pagination.

use tracing::debug;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::{DataPointPatch, DataPointRecord};

const INDEX_PATH: &str = "server_manager/node/index";

/// Filters shared by both index queries: tracked, non-virtual, unpaginated.
const TRACKED_FILTER: [(&str, &str); 3] = [
    ("filter[tracked]", "1"),
    ("filter[virtual]", "0"),
    ("pageSize", "-1"),
];

impl BackendClient {
    /// List data points that should carry a live subscription.
    ///
    /// `GET /api/server_manager/node/index?filter[tracked]=1&filter[virtual]=0&pageSize=-1`
    pub async fn list_tracked_data_points(&self) -> Result<Vec<DataPointRecord>, Error> {
        let url = self.api_url_with_query(INDEX_PATH, &TRACKED_FILTER)?;
        debug!("listing tracked data points");
        self.get(url).await
    }

    /// List data points with a pending write and no unresolved write error.
    ///
    /// The backend maps `eq` to `=` rather than `IS`, so "error is null" is
    /// expressed as `filter[change_error][in][]=NULL`. "Value is not null"
    /// uses the quoted literal `"NULL"` with `neq`.
    pub async fn list_pending_writes(&self) -> Result<Vec<DataPointRecord>, Error> {
        let url = self.api_url_with_query(
            INDEX_PATH,
            &[
                ("filter[tracked]", "1"),
                ("filter[virtual]", "0"),
                ("filter[change_value][neq]", "\"NULL\""),
                ("filter[change_error][in][]", "NULL"),
                ("pageSize", "-1"),
            ],
        )?;
        debug!("listing pending writes");
        self.get(url).await
    }

    /// Apply a partial update to a data point.
    ///
    /// `PATCH /api/server_manager/node/update?id={id}`
    pub async fn update_data_point(&self, id: i64, patch: &DataPointPatch) -> Result<(), Error> {
        let id = id.to_string();
        let url = self.api_url_with_query("server_manager/node/update", &[("id", &id)])?;
        debug!(data_point_id = %id, "updating data point");
        self.patch(url, patch).await
    }
}
