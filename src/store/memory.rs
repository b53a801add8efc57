use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::ride::{PaymentStatus, Ride, RideId, RideStatus};
use crate::store::{RideStore, StoreError};

#[derive(Debug, Default)]
struct StoreFaults {
    fail_on_create: AtomicBool,
    fail_on_read: AtomicBool,
    fail_on_update: AtomicBool,
    fail_on_payment_update: AtomicBool,
}

/// DashMap-backed store. Updates run under the shard lock of the record, so
/// the transition check and the write are a single step.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRideStore {
    rides: Arc<DashMap<RideId, Ride>>,
    faults: Arc<StoreFaults>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.faults.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_read(&self, fail: bool) {
        self.faults.fail_on_read.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_update(&self, fail: bool) {
        self.faults.fail_on_update.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_payment_update(&self, fail: bool) {
        self.faults.fail_on_payment_update.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Backend(format!("{op} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn create(&self, ride: &Ride) -> Result<(), StoreError> {
        Self::check(&self.faults.fail_on_create, "insert")?;

        match self.rides.entry(ride.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(ride.id)),
            Entry::Vacant(slot) => {
                slot.insert(ride.clone());
                Ok(())
            }
        }
    }

    async fn get_by_id(&self, id: RideId) -> Result<Ride, StoreError> {
        Self::check(&self.faults.fail_on_read, "read")?;

        self.rides
            .get(&id)
            .map(|ride| ride.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_status(&self, id: RideId, status: RideStatus) -> Result<(), StoreError> {
        Self::check(&self.faults.fail_on_update, "status update")?;

        let mut ride = self.rides.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !ride.status.can_transition_to(status) {
            return Err(StoreError::StatusConflict {
                from: ride.status,
                to: status,
            });
        }

        ride.status = status;
        ride.updated_at = Utc::now();
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: RideId,
        status: PaymentStatus,
    ) -> Result<(), StoreError> {
        Self::check(&self.faults.fail_on_payment_update, "payment status update")?;

        let mut ride = self.rides.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !ride.payment_status.can_transition_to(status) {
            return Err(StoreError::PaymentConflict {
                from: ride.payment_status,
                to: status,
            });
        }

        ride.payment_status = status;
        ride.updated_at = Utc::now();
        Ok(())
    }
}
