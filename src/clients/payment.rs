use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::clients::error::ClientError;
use crate::clients::http::ServiceEndpoint;
use crate::models::ride::RideId;

const SERVICE: &str = "payment";

/// Two-phase payment: hold funds for a ride, then capture the hold.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Returns the payment id of the new hold.
    async fn authorize(&self, ride_id: RideId, amount: f64) -> Result<String, ClientError>;

    async fn capture(&self, payment_id: &str) -> Result<(), ClientError>;
}

#[derive(Serialize)]
struct AuthorizeRequest {
    ride_id: String,
    amount: f64,
}

#[derive(Serialize)]
struct CaptureRequest<'a> {
    payment_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    payment_id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Clone)]
pub struct HttpPaymentClient {
    endpoint: ServiceEndpoint,
}

impl HttpPaymentClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(SERVICE, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    async fn authorize(&self, ride_id: RideId, amount: f64) -> Result<String, ClientError> {
        let url = self.endpoint.url(&["payments", "authorize"])?;

        let response = self
            .endpoint
            .client()
            .post(url)
            .json(&AuthorizeRequest {
                ride_id: ride_id.to_string(),
                amount,
            })
            .send()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        let response = self
            .endpoint
            .expect_status(response, StatusCode::CREATED)
            .await?;
        let body: PaymentResponse = response
            .json()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        if body.payment_id.trim().is_empty() {
            return Err(ClientError::Decode {
                service: SERVICE,
                reason: "authorization returned an empty payment_id".to_string(),
            });
        }

        info!(
            ride_id = %ride_id,
            payment_id = %body.payment_id,
            status = %body.status,
            "payment authorized"
        );
        Ok(body.payment_id)
    }

    async fn capture(&self, payment_id: &str) -> Result<(), ClientError> {
        let url = self.endpoint.url(&["payments", "capture"])?;

        let response = self
            .endpoint
            .client()
            .post(url)
            .json(&CaptureRequest { payment_id })
            .send()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        let response = self.endpoint.expect_status(response, StatusCode::OK).await?;
        let body: PaymentResponse = response
            .json()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        info!(payment_id = %body.payment_id, status = %body.status, "payment captured");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Authorized,
    Captured,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentHold {
    pub ride_id: RideId,
    pub amount: f64,
    pub state: HoldState,
}

#[derive(Debug, Default)]
struct GatewayFaults {
    fail_on_authorize: AtomicBool,
    fail_on_capture: AtomicBool,
}

/// In-memory payment ledger, used by tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    holds: Arc<DashMap<String, PaymentHold>>,
    faults: Arc<GatewayFaults>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_authorize(&self, fail: bool) {
        self.faults.fail_on_authorize.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_capture(&self, fail: bool) {
        self.faults.fail_on_capture.store(fail, Ordering::SeqCst);
    }

    pub fn authorization_count(&self) -> usize {
        self.holds.len()
    }

    pub fn hold(&self, payment_id: &str) -> Option<PaymentHold> {
        self.holds.get(payment_id).map(|hold| hold.value().clone())
    }
}

#[async_trait]
impl PaymentClient for InMemoryPaymentGateway {
    async fn authorize(&self, ride_id: RideId, amount: f64) -> Result<String, ClientError> {
        if self.faults.fail_on_authorize.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected {
                service: SERVICE,
                reason: "authorization declined".to_string(),
            });
        }

        if !amount.is_finite() || amount <= 0.0 {
            return Err(ClientError::Status {
                service: SERVICE,
                status: 400,
                body: "invalid ride_id or amount".to_string(),
            });
        }

        let payment_id = format!("P-{}", Uuid::new_v4());
        self.holds.insert(
            payment_id.clone(),
            PaymentHold {
                ride_id,
                amount,
                state: HoldState::Authorized,
            },
        );

        Ok(payment_id)
    }

    async fn capture(&self, payment_id: &str) -> Result<(), ClientError> {
        if self.faults.fail_on_capture.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected {
                service: SERVICE,
                reason: "capture declined".to_string(),
            });
        }

        match self.holds.entry(payment_id.to_string()) {
            Entry::Vacant(_) => Err(ClientError::NotFound {
                service: SERVICE,
                reason: format!("payment {payment_id} not found"),
            }),
            Entry::Occupied(mut hold) if hold.get().state == HoldState::Authorized => {
                hold.get_mut().state = HoldState::Captured;
                Ok(())
            }
            Entry::Occupied(_) => Err(ClientError::Status {
                service: SERVICE,
                status: 409,
                body: format!("payment {payment_id} already captured"),
            }),
        }
    }
}
