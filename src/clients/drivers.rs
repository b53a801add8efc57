use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::error::ClientError;
use crate::clients::http::ServiceEndpoint;

const SERVICE: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSummary {
    pub id: String,
    pub name: String,
    pub is_available: bool,
}

/// Driver lookup and availability toggling.
///
/// Lookup failure is fatal to ride creation; availability failures are
/// reported separately so callers can treat them as best-effort.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn find_available_driver(&self) -> Result<String, ClientError>;

    async fn set_availability(&self, driver_id: &str, available: bool) -> Result<(), ClientError>;
}

#[derive(Serialize)]
struct AvailabilityUpdate {
    is_available: bool,
}

#[derive(Debug, Clone)]
pub struct HttpDriverDirectory {
    endpoint: ServiceEndpoint,
}

impl HttpDriverDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(SERVICE, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl DriverDirectory for HttpDriverDirectory {
    async fn find_available_driver(&self) -> Result<String, ClientError> {
        let mut url = self.endpoint.url(&["drivers"])?;
        url.query_pairs_mut().append_pair("available", "true");

        debug!(%url, "querying available drivers");

        let response = self
            .endpoint
            .client()
            .get(url)
            .send()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        let response = self.endpoint.expect_status(response, StatusCode::OK).await?;
        let drivers: Vec<DriverSummary> = response
            .json()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        drivers
            .into_iter()
            .next()
            .map(|driver| driver.id)
            .ok_or_else(|| ClientError::NotFound {
                service: SERVICE,
                reason: "no available drivers found".to_string(),
            })
    }

    async fn set_availability(&self, driver_id: &str, available: bool) -> Result<(), ClientError> {
        let url = self.endpoint.url(&["drivers", driver_id, "status"])?;

        let response = self
            .endpoint
            .client()
            .patch(url)
            .json(&AvailabilityUpdate {
                is_available: available,
            })
            .send()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        self.endpoint.expect_status(response, StatusCode::OK).await?;

        info!(driver_id, available, "driver availability updated");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DirectoryFaults {
    fail_on_lookup: AtomicBool,
    fail_on_update: AtomicBool,
}

/// In-memory driver directory, used by tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDriverDirectory {
    drivers: Arc<DashMap<String, DriverSummary>>,
    faults: Arc<DirectoryFaults>,
}

impl InMemoryDriverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drivers<I, S>(drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let directory = Self::new();
        for id in drivers {
            directory.register(id, true);
        }
        directory
    }

    pub fn register(&self, id: impl Into<String>, available: bool) {
        let id = id.into();
        self.drivers.insert(
            id.clone(),
            DriverSummary {
                name: format!("driver {id}"),
                id,
                is_available: available,
            },
        );
    }

    pub fn is_available(&self, id: &str) -> Option<bool> {
        self.drivers.get(id).map(|driver| driver.is_available)
    }

    pub fn available_drivers(&self) -> Vec<DriverSummary> {
        let mut drivers: Vec<DriverSummary> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().is_available)
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.id.cmp(&b.id));
        drivers
    }

    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.faults.fail_on_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_update(&self, fail: bool) {
        self.faults.fail_on_update.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDriverDirectory {
    async fn find_available_driver(&self) -> Result<String, ClientError> {
        if self.faults.fail_on_lookup.load(Ordering::SeqCst) {
            return Err(ClientError::Transport {
                service: SERVICE,
                reason: "directory unreachable".to_string(),
            });
        }

        self.available_drivers()
            .into_iter()
            .next()
            .map(|driver| driver.id)
            .ok_or_else(|| ClientError::NotFound {
                service: SERVICE,
                reason: "no available drivers found".to_string(),
            })
    }

    async fn set_availability(&self, driver_id: &str, available: bool) -> Result<(), ClientError> {
        if self.faults.fail_on_update.load(Ordering::SeqCst) {
            return Err(ClientError::Transport {
                service: SERVICE,
                reason: "directory unreachable".to_string(),
            });
        }

        let mut driver = self
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| ClientError::NotFound {
                service: SERVICE,
                reason: format!("driver {driver_id} not found"),
            })?;
        driver.is_available = available;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn picks_first_available_driver() {
        let directory = InMemoryDriverDirectory::with_drivers(["D2", "D1"]);
        directory.register("D0", false);

        assert_eq!(directory.find_available_driver().await.unwrap(), "D1");
    }

    #[tokio::test]
    async fn empty_directory_reports_not_found() {
        let directory = InMemoryDriverDirectory::new();
        let err = directory.find_available_driver().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn toggles_availability() {
        let directory = InMemoryDriverDirectory::with_drivers(["D1"]);

        directory.set_availability("D1", false).await.unwrap();
        assert_eq!(directory.is_available("D1"), Some(false));
        assert!(directory.find_available_driver().await.is_err());

        directory.set_availability("D1", true).await.unwrap();
        assert_eq!(directory.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn unknown_driver_update_fails() {
        let directory = InMemoryDriverDirectory::new();
        assert!(directory.set_availability("ghost", true).await.is_err());
    }

    #[tokio::test]
    async fn injected_update_failure() {
        let directory = InMemoryDriverDirectory::with_drivers(["D1"]);
        directory.set_fail_on_update(true);

        assert!(directory.set_availability("D1", false).await.is_err());
        assert_eq!(directory.is_available("D1"), Some(true));
    }
}
