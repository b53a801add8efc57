//! Ride lifecycle sequencing across pricing, driver directory, payment and the
//! ride store.
//!
//! Prerequisite steps (fare, driver, payment hold, initial insert) abort the
//! request. Follow-up steps (driver availability flips, payment capture) are
//! logged and counted but never fail the request; a failed follow-up leaves
//! the ride observable in a degraded state, e.g. `paymentStatus` stuck at
//! `PENDING`.
//!
//! Driver lookup and the later availability flip are separate directory
//! calls, so two concurrent creates can both be handed the same driver. The
//! directory offers no reservation primitive; the overlap is accepted.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::clients::{ClientError, DriverDirectory, PaymentClient, PricingClient};
use crate::error::AppError;
use crate::models::ride::{NewRide, PaymentStatus, Ride, RideId, RideStatus};
use crate::observability::metrics::Metrics;
use crate::store::{RideStore, StoreError};

/// Upper bound on each outbound call, per collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    pub pricing: Duration,
    pub drivers: Duration,
    pub payment: Duration,
    pub store: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            pricing: Duration::from_secs(5),
            drivers: Duration::from_secs(5),
            payment: Duration::from_secs(10),
            store: Duration::from_secs(5),
        }
    }
}

pub struct Collaborators {
    pub pricing: Arc<dyn PricingClient>,
    pub drivers: Arc<dyn DriverDirectory>,
    pub payments: Arc<dyn PaymentClient>,
    pub store: Arc<dyn RideStore>,
}

#[derive(Debug, Clone)]
pub struct CreateRide {
    pub passenger_id: String,
    pub from_zone: String,
    pub to_zone: String,
}

impl CreateRide {
    fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("passengerId", &self.passenger_id),
            ("from_zone", &self.from_zone),
            ("to_zone", &self.to_zone),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// Holds no per-ride state; every request runs independently against the
/// collaborators.
pub struct RideOrchestrator {
    pricing: Arc<dyn PricingClient>,
    drivers: Arc<dyn DriverDirectory>,
    payments: Arc<dyn PaymentClient>,
    store: Arc<dyn RideStore>,
    timeouts: CallTimeouts,
    metrics: Metrics,
}

async fn client_call<T, F>(service: &'static str, limit: Duration, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout {
            service,
            after: limit,
        }),
    }
}

async fn store_call<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout))
}

impl RideOrchestrator {
    pub fn new(collaborators: Collaborators, timeouts: CallTimeouts, metrics: Metrics) -> Self {
        Self {
            pricing: collaborators.pricing,
            drivers: collaborators.drivers,
            payments: collaborators.payments,
            store: collaborators.store,
            timeouts,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn create_ride(&self, request: CreateRide) -> Result<Ride, AppError> {
        let start = Instant::now();
        let result = self.run_create(request).await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .ride_creation_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .rides_created_total
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn run_create(&self, request: CreateRide) -> Result<Ride, AppError> {
        request.validate()?;

        let price = client_call(
            "pricing",
            self.timeouts.pricing,
            self.pricing
                .resolve_price(&request.from_zone, &request.to_zone),
        )
        .await
        .map_err(|err| {
            warn!(
                from_zone = %request.from_zone,
                to_zone = %request.to_zone,
                error = %err,
                "failed to resolve fare"
            );
            AppError::PricingUnavailable(err.to_string())
        })?;

        let driver_id = client_call(
            "users",
            self.timeouts.drivers,
            self.drivers.find_available_driver(),
        )
        .await
        .map_err(|err| {
            error!(error = %err, "failed to find an available driver");
            AppError::NoDriverAvailable(err.to_string())
        })?;

        let ride_id = RideId::new();

        let payment_id = client_call(
            "payment",
            self.timeouts.payment,
            self.payments.authorize(ride_id, price),
        )
        .await
        .map_err(|err| {
            error!(ride_id = %ride_id, price, error = %err, "payment authorization failed");
            AppError::PaymentAuthorization(err.to_string())
        })?;

        let ride = Ride::assigned(NewRide {
            id: ride_id,
            passenger_id: request.passenger_id,
            driver_id: driver_id.clone(),
            payment_id: payment_id.clone(),
            from_zone: request.from_zone,
            to_zone: request.to_zone,
            price,
        });

        if let Err(err) = store_call(self.timeouts.store, self.store.create(&ride)).await {
            // Nothing reverses the hold; it stays authorized until reconciled
            // outside this service.
            error!(
                ride_id = %ride_id,
                payment_id = %payment_id,
                driver_id = %driver_id,
                error = %err,
                "failed to persist ride; payment hold orphaned"
            );
            return Err(AppError::Persistence(err.to_string()));
        }

        if let Err(err) = client_call(
            "users",
            self.timeouts.drivers,
            self.drivers.set_availability(&driver_id, false),
        )
        .await
        {
            warn!(ride_id = %ride_id, driver_id = %driver_id, error = %err, "failed to mark driver unavailable");
            self.metrics.best_effort_failure("reserve_driver");
        }

        info!(
            ride_id = %ride.id,
            passenger_id = %ride.passenger_id,
            driver_id = %ride.driver_id,
            price = ride.price,
            "ride created"
        );

        Ok(ride)
    }

    pub async fn get_ride(&self, id: RideId) -> Result<Ride, AppError> {
        let ride = store_call(self.timeouts.store, self.store.get_by_id(id))
            .await
            .map_err(|err| match err {
                StoreError::NotFound(id) => AppError::NotFound(format!("ride {id} not found")),
                other => {
                    error!(ride_id = %id, error = %other, "failed to read ride");
                    AppError::Retrieval(other.to_string())
                }
            })?;

        info!(ride_id = %id, "ride read");
        Ok(ride)
    }

    pub async fn update_status(&self, id: RideId, status: RideStatus) -> Result<Ride, AppError> {
        store_call(self.timeouts.store, self.store.update_status(id, status))
            .await
            .map_err(|err| match err {
                StoreError::NotFound(id) => AppError::NotFound(format!("ride {id} not found")),
                StoreError::StatusConflict { from, to } => AppError::InvalidTransition { from, to },
                other => {
                    error!(ride_id = %id, status = %status, error = %other, "failed to update ride status");
                    AppError::Update(other.to_string())
                }
            })?;

        self.metrics
            .ride_status_updates_total
            .with_label_values(&[status.as_str()])
            .inc();

        if status.releases_driver() {
            self.settle(id, status).await;
        }

        let ride = store_call(self.timeouts.store, self.store.get_by_id(id))
            .await
            .map_err(|err| {
                error!(ride_id = %id, error = %err, "failed to read updated ride");
                AppError::Retrieval(err.to_string())
            })?;

        info!(ride_id = %id, status = %status, payment_status = %ride.payment_status, "ride status updated");
        Ok(ride)
    }

    /// Follow-up for a ride that just entered a terminal status. Every failure
    /// here is logged and counted, never returned.
    async fn settle(&self, id: RideId, status: RideStatus) {
        let ride = match store_call(self.timeouts.store, self.store.get_by_id(id)).await {
            Ok(ride) => ride,
            Err(err) => {
                // Without the record neither the payment id nor the driver id
                // is known, so both follow-ups are skipped.
                warn!(ride_id = %id, error = %err, "failed to re-read ride; capture and driver release skipped");
                self.metrics.best_effort_failure("reread_ride");
                return;
            }
        };

        if status.captures_payment() {
            self.capture_payment(&ride).await;
        }

        if let Err(err) = client_call(
            "users",
            self.timeouts.drivers,
            self.drivers.set_availability(&ride.driver_id, true),
        )
        .await
        {
            warn!(ride_id = %id, driver_id = %ride.driver_id, error = %err, "failed to release driver");
            self.metrics.best_effort_failure("release_driver");
        }
    }

    async fn capture_payment(&self, ride: &Ride) {
        if !ride.has_payment() {
            warn!(ride_id = %ride.id, "ride has no payment id; nothing to capture");
            return;
        }

        if let Err(err) = client_call(
            "payment",
            self.timeouts.payment,
            self.payments.capture(&ride.payment_id),
        )
        .await
        {
            warn!(
                ride_id = %ride.id,
                payment_id = %ride.payment_id,
                error = %err,
                "failed to capture payment; payment status left pending"
            );
            self.metrics.best_effort_failure("capture_payment");
            return;
        }

        if let Err(err) = store_call(
            self.timeouts.store,
            self.store
                .update_payment_status(ride.id, PaymentStatus::Captured),
        )
        .await
        {
            warn!(
                ride_id = %ride.id,
                payment_id = %ride.payment_id,
                error = %err,
                "payment captured but payment status not recorded"
            );
            self.metrics.best_effort_failure("record_capture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryDriverDirectory, InMemoryPaymentGateway, StaticPriceTable};
    use crate::store::InMemoryRideStore;
    use async_trait::async_trait;

    struct Harness {
        orchestrator: RideOrchestrator,
        drivers: InMemoryDriverDirectory,
        payments: InMemoryPaymentGateway,
        store: InMemoryRideStore,
    }

    fn harness_with(pricing: Arc<dyn PricingClient>, timeouts: CallTimeouts) -> Harness {
        let drivers = InMemoryDriverDirectory::with_drivers(["D1"]);
        let payments = InMemoryPaymentGateway::new();
        let store = InMemoryRideStore::new();

        let orchestrator = RideOrchestrator::new(
            Collaborators {
                pricing,
                drivers: Arc::new(drivers.clone()),
                payments: Arc::new(payments.clone()),
                store: Arc::new(store.clone()),
            },
            timeouts,
            Metrics::new(),
        );

        Harness {
            orchestrator,
            drivers,
            payments,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(StaticPriceTable::standard()), CallTimeouts::default())
    }

    fn airport_trip() -> CreateRide {
        CreateRide {
            passenger_id: "passenger-1".to_string(),
            from_zone: "Centre-ville".to_string(),
            to_zone: "Aéroport".to_string(),
        }
    }

    struct StalledPricing;

    #[async_trait]
    impl PricingClient for StalledPricing {
        async fn resolve_price(&self, _from: &str, _to: &str) -> Result<f64, ClientError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1.0)
        }
    }

    #[tokio::test]
    async fn creates_assigned_ride_with_pending_payment() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();

        assert_eq!(ride.price, 25.5);
        assert_eq!(ride.driver_id, "D1");
        assert_eq!(ride.status, RideStatus::Assigned);
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        assert!(ride.has_payment());
        assert_eq!(h.drivers.is_available("D1"), Some(false));
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn unknown_zone_pair_creates_nothing() {
        let h = harness();
        let err = h
            .orchestrator
            .create_ride(CreateRide {
                to_zone: "Nowhere".to_string(),
                ..airport_trip()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PricingUnavailable(_)));
        assert!(h.store.is_empty());
        assert_eq!(h.payments.authorization_count(), 0);
        assert_eq!(h.drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn no_driver_stops_before_payment() {
        let h = harness();
        h.drivers.set_availability("D1", false).await.unwrap();

        let err = h.orchestrator.create_ride(airport_trip()).await.unwrap_err();

        assert!(matches!(err, AppError::NoDriverAvailable(_)));
        assert_eq!(h.payments.authorization_count(), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn declined_authorization_aborts_creation() {
        let h = harness();
        h.payments.set_fail_on_authorize(true);

        let err = h.orchestrator.create_ride(airport_trip()).await.unwrap_err();

        assert!(matches!(err, AppError::PaymentAuthorization(_)));
        assert!(h.store.is_empty());
        assert_eq!(h.drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn persistence_failure_leaves_hold_orphaned() {
        let h = harness();
        h.store.set_fail_on_create(true);

        let err = h.orchestrator.create_ride(airport_trip()).await.unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(h.payments.authorization_count(), 1);
        assert_eq!(h.drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn driver_reservation_failure_is_not_fatal() {
        let h = harness();
        h.drivers.set_fail_on_update(true);

        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();

        assert_eq!(ride.driver_id, "D1");
        assert_eq!(h.drivers.is_available("D1"), Some(true));
        assert_eq!(
            h.orchestrator
                .metrics()
                .best_effort_failures_total
                .with_label_values(&["reserve_driver"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_before_any_call() {
        let h = harness();
        let err = h
            .orchestrator
            .create_ride(CreateRide {
                passenger_id: "  ".to_string(),
                ..airport_trip()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.payments.authorization_count(), 0);
    }

    #[tokio::test]
    async fn stalled_pricing_times_out() {
        let timeouts = CallTimeouts {
            pricing: Duration::from_millis(50),
            ..CallTimeouts::default()
        };
        let h = harness_with(Arc::new(StalledPricing), timeouts);

        let err = h.orchestrator.create_ride(airport_trip()).await.unwrap_err();

        match err {
            AppError::PricingUnavailable(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn completion_captures_payment_and_releases_driver() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();

        let updated = h
            .orchestrator
            .update_status(ride.id, RideStatus::Completed)
            .await
            .unwrap();

        assert_eq!(updated.status, RideStatus::Completed);
        assert_eq!(updated.payment_status, PaymentStatus::Captured);
        assert_eq!(updated.price, ride.price);
        assert!(updated.updated_at >= ride.updated_at);
        assert_eq!(h.drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn capture_failure_keeps_payment_pending() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();
        h.payments.set_fail_on_capture(true);

        let updated = h
            .orchestrator
            .update_status(ride.id, RideStatus::Completed)
            .await
            .unwrap();

        assert_eq!(updated.status, RideStatus::Completed);
        assert_eq!(updated.payment_status, PaymentStatus::Pending);
        assert_eq!(h.drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn cancellation_releases_driver_without_capture() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();

        let updated = h
            .orchestrator
            .update_status(ride.id, RideStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(updated.status, RideStatus::Cancelled);
        assert_eq!(updated.payment_status, PaymentStatus::Pending);
        assert_eq!(h.drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn in_progress_has_no_side_effects() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();

        let updated = h
            .orchestrator
            .update_status(ride.id, RideStatus::InProgress)
            .await
            .unwrap();

        assert_eq!(updated.status, RideStatus::InProgress);
        assert_eq!(updated.payment_status, PaymentStatus::Pending);
        assert_eq!(h.drivers.is_available("D1"), Some(false));
    }

    #[tokio::test]
    async fn completed_ride_cannot_be_reassigned() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();
        h.orchestrator
            .update_status(ride.id, RideStatus::Completed)
            .await
            .unwrap();

        let err = h
            .orchestrator
            .update_status(ride.id, RideStatus::Assigned)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: RideStatus::Completed,
                to: RideStatus::Assigned
            }
        ));
    }

    #[tokio::test]
    async fn update_failure_stops_before_side_effects() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();
        h.store.set_fail_on_update(true);

        let err = h
            .orchestrator
            .update_status(ride.id, RideStatus::Completed)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Update(_)));
        assert_eq!(h.drivers.is_available("D1"), Some(false));
        let hold = h.payments.hold(&ride.payment_id).unwrap();
        assert_eq!(hold.state, crate::clients::payment::HoldState::Authorized);
    }

    #[tokio::test]
    async fn reread_failure_skips_follow_ups_and_fails_final_read() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();
        h.store.set_fail_on_read(true);

        let err = h
            .orchestrator
            .update_status(ride.id, RideStatus::Completed)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Retrieval(_)));
        assert_eq!(h.drivers.is_available("D1"), Some(false));

        h.store.set_fail_on_read(false);
        let stored = h.orchestrator.get_ride(ride.id).await.unwrap();
        assert_eq!(stored.status, RideStatus::Completed);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn get_missing_ride_is_not_found() {
        let h = harness();
        let err = h.orchestrator.get_ride(RideId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn read_after_create_matches() {
        let h = harness();
        let created = h.orchestrator.create_ride(airport_trip()).await.unwrap();
        let read = h.orchestrator.get_ride(created.id).await.unwrap();
        assert_eq!(read, created);
    }

    struct StalledStore;

    #[async_trait]
    impl RideStore for StalledStore {
        async fn create(&self, _ride: &Ride) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn get_by_id(&self, id: RideId) -> Result<Ride, StoreError> {
            Err(StoreError::NotFound(id))
        }

        async fn update_status(&self, id: RideId, _status: RideStatus) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }

        async fn update_payment_status(
            &self,
            id: RideId,
            _status: PaymentStatus,
        ) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }
    }

    struct StalledPayments;

    #[async_trait]
    impl PaymentClient for StalledPayments {
        async fn authorize(&self, _ride_id: RideId, _amount: f64) -> Result<String, ClientError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("P-late".to_string())
        }

        async fn capture(&self, _payment_id: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_driver_lookup_stops_before_payment() {
        let h = harness();
        h.drivers.set_fail_on_lookup(true);

        let err = h.orchestrator.create_ride(airport_trip()).await.unwrap_err();

        assert!(matches!(err, AppError::NoDriverAvailable(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(h.payments.authorization_count(), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn stalled_store_insert_times_out() {
        let drivers = InMemoryDriverDirectory::with_drivers(["D1"]);
        let payments = InMemoryPaymentGateway::new();
        let orchestrator = RideOrchestrator::new(
            Collaborators {
                pricing: Arc::new(StaticPriceTable::standard()),
                drivers: Arc::new(drivers.clone()),
                payments: Arc::new(payments.clone()),
                store: Arc::new(StalledStore),
            },
            CallTimeouts {
                store: Duration::from_millis(50),
                ..CallTimeouts::default()
            },
            Metrics::new(),
        );

        let err = orchestrator.create_ride(airport_trip()).await.unwrap_err();

        match err {
            AppError::Persistence(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(payments.authorization_count(), 1);
        assert_eq!(drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn stalled_authorization_times_out_and_persists_nothing() {
        let drivers = InMemoryDriverDirectory::with_drivers(["D1"]);
        let store = InMemoryRideStore::new();
        let orchestrator = RideOrchestrator::new(
            Collaborators {
                pricing: Arc::new(StaticPriceTable::standard()),
                drivers: Arc::new(drivers.clone()),
                payments: Arc::new(StalledPayments),
                store: Arc::new(store.clone()),
            },
            CallTimeouts {
                payment: Duration::from_millis(50),
                ..CallTimeouts::default()
            },
            Metrics::new(),
        );

        let err = orchestrator.create_ride(airport_trip()).await.unwrap_err();

        match err {
            AppError::PaymentAuthorization(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.is_empty());
        assert_eq!(drivers.is_available("D1"), Some(true));
    }

    #[tokio::test]
    async fn unrecorded_capture_keeps_payment_pending() {
        let h = harness();
        let ride = h.orchestrator.create_ride(airport_trip()).await.unwrap();
        h.store.set_fail_on_payment_update(true);

        let updated = h
            .orchestrator
            .update_status(ride.id, RideStatus::Completed)
            .await
            .unwrap();

        assert_eq!(updated.status, RideStatus::Completed);
        assert_eq!(updated.payment_status, PaymentStatus::Pending);
        assert_eq!(h.drivers.is_available("D1"), Some(true));
        assert_eq!(
            h.payments.hold(&ride.payment_id).unwrap().state,
            crate::clients::payment::HoldState::Captured
        );
        assert_eq!(
            h.orchestrator
                .metrics()
                .best_effort_failures_total
                .with_label_values(&["record_capture"])
                .get(),
            1
        );
    }
}
