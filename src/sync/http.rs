use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use tracing::trace;

use super::request::{ACCEPT_JSON, FORM_CONTENT_TYPE, Method, REQUESTED_WITH, SyncRequest};
use super::{RawResponse, SyncError, Transport};

/// [`Transport`] over HTTP against the task board backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `timeout` of `None` leaves request lifetime to the underlying transport.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &SyncRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &SyncRequest) -> Result<RawResponse, SyncError> {
        let url = self.url_for(request);
        let builder = match request.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(request.form_body()),
        };

        let response = builder
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .header(ACCEPT_JSON.0, ACCEPT_JSON.1)
            .send()
            .await
            .map_err(|err| SyncError::Transport(format!("{} {url}: {err}", request.method().as_str())))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| SyncError::Transport(format!("failed to read body from {url}: {err}")))?;
        trace!(status, url = %url, bytes = body.len(), "backend responded");

        Ok(RawResponse { status, body })
    }
}
