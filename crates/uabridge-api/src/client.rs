// Backend HTTP client
//
// Wraps `reqwest::Client` with URL construction under the backend's `/api`
// root and uniform status/body handling. Endpoint operations live in
// separate files (servers, data_points, ingest) as inherent methods to keep
// this module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP client for the management backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root (e.g. `http://api/`); routes are
    /// appended as `/api/...` beneath it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for any default headers (credentials).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`, tolerating a trailing slash on the base.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    /// Build an API URL with the given query pairs appended.
    pub(crate) fn api_url_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Url, Error> {
        let mut url = self.api_url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode a JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        Self::parse_json(resp).await
    }

    /// Send a PATCH request with a JSON body, discarding the response body.
    pub(crate) async fn patch(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("PATCH {}", url);

        let resp = self
            .http
            .patch(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::ensure_success(resp).await.map(|_| ())
    }

    /// Send a POST request with a JSON body, returning the response body.
    pub(crate) async fn post(&self, url: Url, body: &impl Serialize) -> Result<String, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::ensure_success(resp).await
    }

    /// Send a bare GET and report only the status code.
    pub(crate) async fn get_status(&self, url: Url) -> Result<reqwest::StatusCode, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        Ok(resp.status())
    }

    /// Map non-success statuses to errors; return the body otherwise.
    async fn ensure_success(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let body = Self::ensure_success(resp).await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
