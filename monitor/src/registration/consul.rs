//! Consul agent as a [`ServiceDirectory`].
//!
//! Registration is a single `PUT /v1/agent/service/register` with the
//! service record as JSON.

use std::time::Duration;

use reqwest::Client;

use super::{ServiceDirectory, ServiceRegistration};
use crate::config::RegistrationConfig;
use crate::error::{MonitorError, TransportError};
use crate::rpc::transport::{build_http_client, read_ok_body};

/// Client for a local Consul agent.
#[derive(Clone, Debug)]
pub struct ConsulDirectory {
    base_url: String,
    client: Client,
}

impl ConsulDirectory {
    /// `base_url` is the agent root, e.g. `"http://127.0.0.1:8500"`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Builds a directory client for the agent in `config`.
    pub fn from_config(
        config: &RegistrationConfig,
        timeout: Duration,
    ) -> Result<Self, MonitorError> {
        Ok(Self::new(build_http_client(timeout)?, config.consul_address.clone()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl ServiceDirectory for ConsulDirectory {
    async fn register(&self, service: &ServiceRegistration) -> Result<(), MonitorError> {
        let url = self.endpoint("/v1/agent/service/register");

        let resp = self
            .client
            .put(&url)
            .json(service)
            .send()
            .await
            .map_err(|e| registration_error(TransportError::from_reqwest(&url, e)))?;

        read_ok_body(&url, resp).await.map_err(registration_error)?;
        Ok(())
    }
}

fn registration_error(err: TransportError) -> MonitorError {
    MonitorError::Registration(err.to_string())
}
