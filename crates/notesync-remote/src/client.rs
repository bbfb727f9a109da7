//! Record store HTTP client
//!
//! Provides a typed HTTP client for the record store web API. Handles
//! authentication headers, endpoint construction, JSON bodies and mapping of
//! non-success responses into [`RemoteError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use notesync_core::config::RemoteConfig;
//! use notesync_remote::client::RecordStoreClient;
//!
//! # fn example() -> anyhow::Result<()> {
//! let client = RecordStoreClient::new(&RemoteConfig::default())?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Context;
use notesync_core::config::RemoteConfig;
use notesync_core::domain::RecordId;
use notesync_core::ports::RemoteError;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{map_server_error, map_transport_error, ServerErrorBody};

/// HTTP client for record store API calls
///
/// All paths are relative to `{base_url}/{container}`.
#[derive(Debug, Clone)]
pub struct RecordStoreClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, container included
    base_url: String,
    /// Bearer token, if the deployment requires one
    api_token: Option<String>,
}

impl RecordStoreClient {
    /// Creates a client from configuration
    ///
    /// The API token is taken from `NOTESYNC_API_TOKEN` when set.
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.container
        );
        Ok(Self {
            client,
            base_url,
            api_token: config.resolved_api_token(),
        })
    }

    /// Creates a client with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `api_token` - Optional bearer token
    /// * `base_url` - Base URL, used verbatim
    pub fn with_base_url(api_token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_token,
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for the given method and path
    ///
    /// Prepends the base URL and adds the Authorization header when a token
    /// is configured.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, &url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and maps any failure into a [`RemoteError`]
    ///
    /// # Arguments
    /// * `request` - The prepared request
    /// * `record_id` - Record addressed by the request, used for `RecordNotFound`
    pub async fn execute(
        &self,
        request: RequestBuilder,
        record_id: Option<&RecordId>,
    ) -> Result<Response, RemoteError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Error bodies are best effort; an unparseable one falls back to the status.
        let body = response.json::<ServerErrorBody>().await.ok();
        debug!(
            status = status.as_u16(),
            code = body.as_ref().map(|b| b.server_error_code.as_str()),
            "Record store request failed"
        );
        Err(map_server_error(Some(status), body, record_id))
    }

    /// Sends a request and parses a JSON response body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        record_id: Option<&RecordId>,
    ) -> Result<T, RemoteError> {
        let response = self.execute(request, record_id).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Unknown(anyhow::Error::new(e).context("Invalid response body")))
    }

    /// Uploads raw asset bytes
    ///
    /// # Arguments
    /// * `asset_id` - Identifier of the asset
    /// * `bytes` - Encoded bytes
    /// * `content_type` / `content_encoding` - Passed through as headers
    /// * `owner` - Record the asset belongs to
    pub async fn upload_asset(
        &self,
        asset_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
        content_encoding: &str,
        owner: &RecordId,
    ) -> Result<(), RemoteError> {
        let size = bytes.len();
        let request = self
            .request(Method::PUT, &format!("/assets/{asset_id}"))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_ENCODING, content_encoding)
            .body(bytes);
        self.execute(request, Some(owner)).await?;
        debug!(asset_id, size, "Uploaded asset");
        Ok(())
    }

    /// Downloads raw asset bytes, undecoded
    pub async fn download_asset(
        &self,
        asset_id: &str,
        owner: &RecordId,
    ) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .execute(
                self.request(Method::GET, &format!("/assets/{asset_id}")),
                Some(owner),
            )
            .await?;
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        debug!(asset_id, size = bytes.len(), "Downloaded asset");
        Ok(bytes.to_vec())
    }
}
