//! HTTP exchanges behind the node client and the reference oracle.
//!
//! Both only need "POST JSON, read the body" and "GET, read the body", each
//! failing unless the reply is a 200. [`HttpTransport`] does this over
//! `reqwest`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;

use crate::error::{MonitorError, TransportError};

/// Request/response exchange returning the body of a 200 reply.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// POSTs `body` as `application/json`.
    async fn post_json(&self, url: &str, body: &Value) -> Result<String, TransportError>;

    async fn get(&self, url: &str) -> Result<String, TransportError>;
}

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client whose requests fail with [`TransportError::Timeout`]
    /// after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, MonitorError> {
        Ok(Self::new(build_http_client(timeout)?))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<String, TransportError> {
        let resp = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        read_ok_body(url, resp).await
    }

    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        read_ok_body(url, resp).await
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, MonitorError> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        TransportError::Request {
            url: String::new(),
            reason: format!("failed to build HTTP client: {e}"),
        }
        .into()
    })
}

/// Reads the body of `resp`, failing with [`TransportError::Status`] on any
/// status other than 200.
pub(crate) async fn read_ok_body(
    url: &str,
    resp: reqwest::Response,
) -> Result<String, TransportError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| TransportError::from_reqwest(url, e))?;

    if status != StatusCode::OK {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn post_sends_json_and_returns_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({ "method": "net_peerCount" })))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let transport = HttpTransport::new(Client::new());
        let body = transport
            .post_json(&server.url(), &json!({ "method": "net_peerCount" }))
            .await
            .unwrap();

        assert_eq!(body, "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_rejects_non_200_with_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let transport = HttpTransport::new(Client::new());
        let err = transport
            .get(&format!("{}/api", server.url()))
            .await
            .unwrap_err();

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
