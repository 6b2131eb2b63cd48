//! HTTP client for the remote track store
//!
//! Track files live at `GET <base_url>/<file name>`. Only `200 OK` counts as
//! success; `429 Too Many Requests` is reported separately from every other
//! status so callers can back off.

use crate::domain::{IngestError, RemoteStoreError, Result};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Remote track store client
///
/// # Example
///
/// ```no_run
/// use gpxload::adapters::remote::RemoteStoreClient;
/// use std::time::Duration;
///
/// # async fn example() -> gpxload::domain::Result<()> {
/// let client = RemoteStoreClient::new("https://tracks.example.com/files", Duration::from_secs(60))?;
/// let response = client.fetch("a.gpx").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RemoteStoreClient {
    client: Client,
    base_url: Url,
}

impl RemoteStoreClient {
    /// Create a client for `base_url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparseable base URL or when the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            IngestError::Configuration(format!("Invalid download.base_url '{base_url}': {e}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(IngestError::Configuration(format!(
                "download.base_url '{base_url}' cannot be used as a base URL"
            )));
        }

        let client = ClientBuilder::new()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("gpxload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                IngestError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, base_url })
    }

    /// URL of a track file; the name becomes one percent-encoded path segment
    pub fn file_url(&self, file_name: &str) -> std::result::Result<Url, RemoteStoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteStoreError::InvalidUrl {
                file_name: file_name.to_string(),
                message: "base URL cannot have path segments".to_string(),
            })?
            .pop_if_empty()
            .push(file_name);
        Ok(url)
    }

    /// Issue the GET for `file_name` and check the status
    ///
    /// The returned response has status 200 and an unread body.
    pub async fn fetch(&self, file_name: &str) -> std::result::Result<Response, RemoteStoreError> {
        let url = self.file_url(file_name)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteStoreError::Request {
                file_name: file_name.to_string(),
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::TOO_MANY_REQUESTS => Err(RemoteStoreError::RateLimited {
                file_name: file_name.to_string(),
            }),
            status => Err(RemoteStoreError::UnexpectedStatus {
                file_name: file_name.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Base URL the client was created with
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RemoteStoreClient {
        RemoteStoreClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_file_url_appends_segment() {
        assert_eq!(
            client("https://tracks.example.com/api").file_url("a.gpx").unwrap().as_str(),
            "https://tracks.example.com/api/a.gpx"
        );
        assert_eq!(
            client("https://tracks.example.com/api/").file_url("a.gpx").unwrap().as_str(),
            "https://tracks.example.com/api/a.gpx"
        );
    }

    #[test]
    fn test_file_url_encodes_name() {
        let url = client("https://tracks.example.com").file_url("my track/1.gpx").unwrap();
        assert_eq!(url.as_str(), "https://tracks.example.com/my%20track%2F1.gpx");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RemoteStoreClient::new("not a url", Duration::from_secs(5)).is_err());
        assert!(RemoteStoreClient::new("mailto:ops@example.com", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_maps_statuses() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/a.gpx")
            .with_status(200)
            .with_body("<gpx/>")
            .create_async()
            .await;
        let limited = server
            .mock("GET", "/c.gpx")
            .with_status(429)
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/d.gpx")
            .with_status(404)
            .create_async()
            .await;

        let client = client(&server.url());

        let response = client.fetch("a.gpx").await.unwrap();
        assert_eq!(response.text().await.unwrap(), "<gpx/>");

        let err = client.fetch("c.gpx").await.unwrap_err();
        assert!(err.is_rate_limited());

        let err = client.fetch("d.gpx").await.unwrap_err();
        assert!(matches!(
            err,
            RemoteStoreError::UnexpectedStatus { status: 404, .. }
        ));

        ok.assert_async().await;
        limited.assert_async().await;
        missing.assert_async().await;
    }
}
