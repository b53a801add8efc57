//! Contracts for the services a ride depends on, each with an HTTP client and
//! an in-memory implementation.

pub mod drivers;
pub mod error;
pub mod http;
pub mod payment;
pub mod pricing;

pub use drivers::{DriverDirectory, DriverSummary, HttpDriverDirectory, InMemoryDriverDirectory};
pub use error::ClientError;
pub use payment::{HttpPaymentClient, InMemoryPaymentGateway, PaymentClient};
pub use pricing::{HttpPricingClient, PricingClient, StaticPriceTable};
