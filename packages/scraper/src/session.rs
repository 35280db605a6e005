//! Cookie-bearing HTTP session.
//!
//! One [`SessionClient`] owns one cookie jar for the whole run. Server-side
//! view-state is tied to the sequence of pages a session visited, so a
//! client must never be shared between runs.

use std::time::Duration;

use archery_scores_models::SiteConfig;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};

use crate::ScrapeError;
use crate::form::FormFields;

/// Maximum length of the body preview included in debug logs.
const BODY_PREVIEW_LEN: usize = 300;

/// A fully read 2xx response.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `Content-Disposition` header, if any.
    pub content_disposition: Option<String>,
    /// Response body decoded as text.
    pub body: String,
}

/// HTTP client with a persistent cookie store.
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
}

impl SessionClient {
    /// Builds a client with cookies enabled and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Client`] if the TLS backend cannot be set up.
    pub fn new(config: &SiteConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http })
    }

    /// GETs `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connection`] on transport failure or a
    /// non-2xx status.
    pub async fn get(&self, url: &str) -> Result<PageResponse, ScrapeError> {
        log::debug!("GET {url}");
        Self::read(url, self.http.get(url).send().await).await
    }

    /// POSTs `fields` form-encoded to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connection`] on transport failure or a
    /// non-2xx status.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &FormFields,
    ) -> Result<PageResponse, ScrapeError> {
        log::debug!("POST {url} ({} fields)", fields.len());
        Self::read(url, self.http.post(url).form(fields.as_map()).send().await).await
    }

    async fn read(
        url: &str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<PageResponse, ScrapeError> {
        let response = result.map_err(|e| ScrapeError::Connection {
            url: url.to_owned(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = header_text(response.headers(), &CONTENT_TYPE);
        let content_disposition = header_text(response.headers(), &CONTENT_DISPOSITION);

        let body = response.text().await.map_err(|e| ScrapeError::Connection {
            url: url.to_owned(),
            status: Some(status.as_u16()),
            message: format!("failed to read body: {e}"),
        })?;

        if !status.is_success() {
            let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
            log::debug!("HTTP {status} from {final_url}, body preview: {preview}");
            return Err(ScrapeError::Connection {
                url: url.to_owned(),
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_owned(),
            });
        }

        log::debug!(
            "HTTP {status} from {final_url}: {} bytes, content-type: {content_type:?}",
            body.len()
        );

        Ok(PageResponse {
            url: final_url,
            status: status.as_u16(),
            content_type,
            content_disposition,
            body,
        })
    }
}

fn header_text(headers: &HeaderMap, name: &reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{TestResponse, TestServer};

    #[tokio::test]
    async fn cookies_persist_across_requests() {
        let server = TestServer::spawn(|req| {
            if req.path == "/set" {
                TestResponse::html("<p>ok</p>").with_header("Set-Cookie", "ASP.NET_SessionId=abc123; Path=/")
            } else {
                TestResponse::html("<p>second</p>")
            }
        })
        .await;

        let session = SessionClient::new(&SiteConfig::default()).unwrap();
        session.get(&server.url("/set")).await.unwrap();

        let mut fields = FormFields::new();
        fields.set("a", "1 2");
        let page = session.post_form(&server.url("/next"), &fields).await.unwrap();
        assert_eq!(page.body, "<p>second</p>");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, "POST");
        assert_eq!(
            requests[1].header("cookie").as_deref(),
            Some("ASP.NET_SessionId=abc123")
        );
        assert_eq!(requests[1].form().get("a").map(String::as_str), Some("1 2"));
    }

    #[tokio::test]
    async fn separate_sessions_do_not_share_cookies() {
        let server = TestServer::spawn(|_| {
            TestResponse::html("ok").with_header("Set-Cookie", "sid=one; Path=/")
        })
        .await;

        let first = SessionClient::new(&SiteConfig::default()).unwrap();
        first.get(&server.url("/")).await.unwrap();

        let second = SessionClient::new(&SiteConfig::default()).unwrap();
        second.get(&server.url("/")).await.unwrap();

        assert!(server.requests()[1].header("cookie").is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_connection_error() {
        let server = TestServer::spawn(|_| TestResponse::html("down").with_status(503)).await;
        let session = SessionClient::new(&SiteConfig::default()).unwrap();

        let err = session.get(&server.url("/x")).await.unwrap_err();
        match err {
            ScrapeError::Connection { status, url, .. } => {
                assert_eq!(status, Some(503));
                assert!(url.ends_with("/x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn exposes_content_headers() {
        let server = TestServer::spawn(|_| {
            TestResponse::new(200, "text/csv", "a,b\n1,2\n")
                .with_header("Content-Disposition", "attachment; filename=x.csv")
        })
        .await;
        let session = SessionClient::new(&SiteConfig::default()).unwrap();

        let page = session.get(&server.url("/export")).await.unwrap();
        assert_eq!(page.content_type.as_deref(), Some("text/csv"));
        assert_eq!(
            page.content_disposition.as_deref(),
            Some("attachment; filename=x.csv")
        );
    }
}
