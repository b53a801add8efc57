//! Authoritative persistence for ride records.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ride::{PaymentStatus, Ride, RideId, RideStatus};

pub use memory::InMemoryRideStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ride {0} not found")]
    NotFound(RideId),

    #[error("ride {0} already exists")]
    Duplicate(RideId),

    #[error("ride status cannot move from {from} to {to}")]
    StatusConflict { from: RideStatus, to: RideStatus },

    #[error("payment status cannot move from {from} to {to}")]
    PaymentConflict {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("store call timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Ride persistence. Each update touches a single field of a single record
/// and applies atomically or not at all.
#[async_trait]
pub trait RideStore: Send + Sync {
    async fn create(&self, ride: &Ride) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: RideId) -> Result<Ride, StoreError>;

    /// Rejects moves the ride status table does not allow.
    async fn update_status(&self, id: RideId, status: RideStatus) -> Result<(), StoreError>;

    async fn update_payment_status(
        &self,
        id: RideId,
        status: PaymentStatus,
    ) -> Result<(), StoreError>;
}
