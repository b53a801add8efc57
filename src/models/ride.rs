use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(Uuid);

impl RideId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RideId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RideId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Transitions a stored ride may take. Terminal states accept none.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;

        matches!(
            (self, next),
            (Assigned, InProgress)
                | (Assigned, Completed)
                | (Assigned, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Entering this state finalizes the payment hold.
    pub fn captures_payment(self) -> bool {
        self == RideStatus::Completed
    }

    /// Entering this state hands the driver back to the directory.
    pub fn releases_driver(self) -> bool {
        self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Assigned => "ASSIGNED",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Captured,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!((self, next), (PaymentStatus::Pending, PaymentStatus::Captured))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Captured => "CAPTURED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: RideId,
    pub passenger_id: String,
    pub payment_id: String,
    pub driver_id: String,
    #[serde(alias = "from_zone")]
    pub from_zone: String,
    #[serde(alias = "to_zone")]
    pub to_zone: String,
    pub price: f64,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything resolved before a ride record can be written.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub id: RideId,
    pub passenger_id: String,
    pub driver_id: String,
    pub payment_id: String,
    pub from_zone: String,
    pub to_zone: String,
    pub price: f64,
}

impl Ride {
    pub fn assigned(new_ride: NewRide) -> Self {
        let now = Utc::now();

        Self {
            id: new_ride.id,
            passenger_id: new_ride.passenger_id,
            payment_id: new_ride.payment_id,
            driver_id: new_ride.driver_id,
            from_zone: new_ride.from_zone,
            to_zone: new_ride.to_zone,
            price: new_ride.price,
            status: RideStatus::Assigned,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_payment(&self) -> bool {
        !self.payment_id.trim().is_empty()
    }
}
