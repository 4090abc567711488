//! Backup to a plain HTTP endpoint.
//!
//! `GET` downloads, `PUT` uploads and the `Last-Modified` header of a `HEAD`
//! request dates the backup. Requests carry the token as a bearer credential.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use crate::{SyncError, SyncProvider};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_NAME: &str = "http";

/// Provider backed by a single URL.
pub struct HttpSyncProvider {
    http: reqwest::Client,
    name: String,
    url: String,
    token: Option<String>,
}

impl fmt::Debug for HttpSyncProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSyncProvider")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpSyncProvider {
    /// Creates a provider for `url`. Without a non-blank token the provider
    /// reports itself as not signed in.
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(SyncError::ClientBuild)?;
        Ok(Self {
            http,
            name: DEFAULT_NAME.to_string(),
            url: url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn request(&self, method: Method) -> Result<RequestBuilder, SyncError> {
        let token = self.token.as_deref().ok_or_else(|| SyncError::NotAuthenticated {
            provider: self.name.clone(),
        })?;
        Ok(self.http.request(method, &self.url).bearer_auth(token))
    }

    /// Sends the request. `Ok(None)` on 404, an error on any other failure.
    async fn send(
        &self,
        method: &'static str,
        builder: RequestBuilder,
    ) -> Result<Option<Response>, SyncError> {
        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::Status {
                method,
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(Some(response))
    }
}

fn parse_http_date(value: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| SyncError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

#[async_trait]
impl SyncProvider for HttpSyncProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn download(&self) -> Result<Option<String>, SyncError> {
        let builder = self.request(Method::GET)?;
        let Some(response) = self.send("GET", builder).await? else {
            return Ok(None);
        };
        let body = response.text().await?;
        Ok(Some(body).filter(|b| !b.trim().is_empty()))
    }

    async fn upload(&self, json: &str) -> Result<(), SyncError> {
        let builder = self
            .request(Method::PUT)?
            .header(CONTENT_TYPE, "application/json")
            .body(json.to_string());
        match self.send("PUT", builder).await? {
            Some(_) => Ok(()),
            None => Err(SyncError::Status {
                method: "PUT",
                url: self.url.clone(),
                status: StatusCode::NOT_FOUND.as_u16(),
            }),
        }
    }

    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let builder = self.request(Method::HEAD)?;
        let Some(response) = self.send("HEAD", builder).await? else {
            return Ok(None);
        };
        let Some(header) = response.headers().get(LAST_MODIFIED) else {
            return Ok(None);
        };
        let value = header.to_str().unwrap_or_default();
        parse_http_date(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mockito::Matcher;

    use super::*;

    fn provider(server: &mockito::Server) -> HttpSyncProvider {
        HttpSyncProvider::new(
            format!("{}/backup.json", server.url()),
            Some("s3cret".to_string()),
        )
        .expect("client builds")
    }

    #[tokio::test]
    async fn download_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/backup.json")
            .match_header("authorization", "Bearer s3cret")
            .with_status(200)
            .with_body(r#"{"meters":[]}"#)
            .create_async()
            .await;

        let body = provider(&server).download().await.unwrap();
        assert_eq!(body.as_deref(), Some(r#"{"meters":[]}"#));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_backup_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/backup.json")
            .with_status(404)
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/backup.json")
            .with_status(404)
            .create_async()
            .await;

        let provider = provider(&server);
        assert_eq!(provider.download().await.unwrap(), None);
        assert_eq!(provider.last_modified().await.unwrap(), None);
    }

    #[tokio::test]
    async fn upload_puts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/backup.json")
            .match_header("content-type", "application/json")
            .match_body(Matcher::JsonString(r#"{"events":[]}"#.to_string()))
            .with_status(204)
            .create_async()
            .await;

        provider(&server).upload(r#"{"events":[]}"#).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_surface_status() {
        let mut server = mockito::Server::new_async().await;
        let _put = server
            .mock("PUT", "/backup.json")
            .with_status(500)
            .create_async()
            .await;

        let err = provider(&server).upload("{}").await.unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 500, method: "PUT", .. }));
    }

    #[tokio::test]
    async fn last_modified_reads_header() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("HEAD", "/backup.json")
            .with_status(200)
            .with_header("last-modified", "Wed, 02 Apr 2025 08:30:00 GMT")
            .create_async()
            .await;

        let modified = provider(&server).last_modified().await.unwrap();
        assert_eq!(modified, Some(Utc.with_ymd_and_hms(2025, 4, 2, 8, 30, 0).unwrap()));
    }

    #[tokio::test]
    async fn missing_token_is_not_authenticated() {
        let provider =
            HttpSyncProvider::new("http://127.0.0.1:9/backup.json", Some("  ".into())).unwrap();
        assert!(!provider.is_authenticated().await);
        let err = provider.download().await.unwrap_err();
        assert!(matches!(err, SyncError::NotAuthenticated { .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let provider = HttpSyncProvider::new("http://example.test", Some("s3cret".into())).unwrap();
        let debug = format!("{provider:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
