//! Best-effort registration with a service directory.
//!
//! The loop tries a bounded number of times with a fixed delay between
//! attempts. It stops for good after the first success: there is no
//! heartbeat and no re-registration if the directory later drops the entry.
//! After the last failed attempt it gives up and logs it; the rest of the
//! process carries on either way.

pub mod consul;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RegistrationConfig;
use crate::engine::EngineStatus;
use crate::error::MonitorError;

pub use consul::ConsulDirectory;

/// HTTP health check attached to a registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub url: String,
    pub interval: String,
    pub timeout: String,
}

/// Service record announced to the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub port: u16,
    pub address: String,
    pub tags: Vec<String>,
    pub check: HealthCheck,
}

/// A directory that accepts service registrations.
pub trait ServiceDirectory: Send + Sync {
    fn register(
        &self,
        service: &ServiceRegistration,
    ) -> impl Future<Output = Result<(), MonitorError>> + Send;
}

/// Record of one attempt, used for logging.
#[derive(Debug)]
pub struct RegistrationAttempt {
    pub attempt_number: u32,
    pub outcome: Result<(), MonitorError>,
    /// `None` when no further attempt will be made.
    pub next_retry_delay: Option<Duration>,
}

/// How the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { attempts: u32 },
    Abandoned { attempts: u32 },
    Cancelled { attempts: u32 },
    Disabled,
}

/// Bounded-retry registration driver.
pub struct RegistrationLoop<D> {
    directory: D,
    config: RegistrationConfig,
    listen_addr: SocketAddr,
    status: watch::Receiver<EngineStatus>,
}

impl<D: ServiceDirectory> RegistrationLoop<D> {
    /// `status` supplies the resolved chain name, which is part of the
    /// service id; attempts made before the chain is known fail.
    pub fn new(
        directory: D,
        config: RegistrationConfig,
        listen_addr: SocketAddr,
        status: watch::Receiver<EngineStatus>,
    ) -> Self {
        Self {
            directory,
            config,
            listen_addr,
            status,
        }
    }

    /// Builds the record announced for `chain`.
    pub fn registration_for(&self, chain: &str) -> ServiceRegistration {
        let address = format!("http://{}", self.listen_addr);
        ServiceRegistration {
            id: format!("parity-{chain}-{}", self.config.service_name),
            name: self.config.service_name.clone(),
            port: self.listen_addr.port(),
            tags: vec![
                self.config.service_name.clone(),
                "parity".to_string(),
                chain.to_string(),
            ],
            check: HealthCheck {
                url: format!("{address}/synced"),
                interval: self.config.check_interval.clone(),
                timeout: self.config.check_timeout.clone(),
            },
            address,
        }
    }

    async fn attempt(&self) -> Result<(), MonitorError> {
        let chain = self.status.borrow().chain.clone();
        let chain = chain
            .ok_or_else(|| MonitorError::Registration("chain not resolved yet".to_string()))?;
        self.directory.register(&self.registration_for(&chain)).await
    }

    /// Runs until registered, abandoned or cancelled.
    pub async fn run(self, cancel: CancellationToken) -> RegistrationOutcome {
        if !self.config.enabled {
            info!("service registration disabled");
            return RegistrationOutcome::Disabled;
        }

        let max_attempts = self.config.max_attempts.max(1);

        for attempt_number in 1..=max_attempts {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return RegistrationOutcome::Cancelled { attempts: attempt_number - 1 };
                }
                outcome = self.attempt() => outcome,
            };

            let registered = outcome.is_ok();
            let attempt = RegistrationAttempt {
                attempt_number,
                outcome,
                next_retry_delay: (!registered && attempt_number < max_attempts)
                    .then_some(self.config.retry_delay),
            };
            log_attempt(&attempt);

            if registered {
                return RegistrationOutcome::Registered { attempts: attempt_number };
            }

            if let Some(delay) = attempt.next_retry_delay {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return RegistrationOutcome::Cancelled { attempts: attempt_number };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        warn!(attempts = max_attempts, "stop trying to register service");
        RegistrationOutcome::Abandoned { attempts: max_attempts }
    }
}

fn log_attempt(attempt: &RegistrationAttempt) {
    match &attempt.outcome {
        Ok(()) => info!(attempt = attempt.attempt_number, "service registered"),
        Err(e) => warn!(
            attempt = attempt.attempt_number,
            retry_in = ?attempt.next_retry_delay,
            error = %e,
            "failed to register service"
        ),
    }
}
