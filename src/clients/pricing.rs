use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::clients::error::ClientError;
use crate::clients::http::ServiceEndpoint;

const SERVICE: &str = "pricing";

/// Resolves the fare for a zone pair.
#[async_trait]
pub trait PricingClient: Send + Sync {
    async fn resolve_price(&self, from_zone: &str, to_zone: &str) -> Result<f64, ClientError>;
}

fn checked_fare(price: f64) -> Result<f64, ClientError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(ClientError::Decode {
            service: SERVICE,
            reason: format!("fare {price} is not a non-negative amount"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(alias = "amount")]
    price: f64,
}

#[derive(Debug, Clone)]
pub struct HttpPricingClient {
    endpoint: ServiceEndpoint,
}

impl HttpPricingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: ServiceEndpoint::new(SERVICE, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PricingClient for HttpPricingClient {
    async fn resolve_price(&self, from_zone: &str, to_zone: &str) -> Result<f64, ClientError> {
        let mut url = self.endpoint.url(&["price"])?;
        url.query_pairs_mut()
            .append_pair("from", from_zone)
            .append_pair("to", to_zone);

        debug!(%url, "requesting fare");

        let response = self
            .endpoint
            .client()
            .get(url)
            .send()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        let response = self.endpoint.expect_status(response, StatusCode::OK).await?;
        let body: PriceResponse = response
            .json()
            .await
            .map_err(|err| self.endpoint.transport_error(err))?;

        checked_fare(body.price)
    }
}

/// Immutable zone-pair fare grid.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceTable {
    fares: HashMap<(String, String), f64>,
}

impl StaticPriceTable {
    pub fn new<I, S>(fares: I) -> Self
    where
        I: IntoIterator<Item = (S, S, f64)>,
        S: Into<String>,
    {
        Self {
            fares: fares
                .into_iter()
                .map(|(from, to, price)| ((from.into(), to.into()), price))
                .collect(),
        }
    }

    /// The fare grid the platform launched with.
    pub fn standard() -> Self {
        Self::new([
            ("Centre-ville", "Aéroport", 25.5),
            ("Aéroport", "Centre-ville", 25.5),
            ("Plateau", "McGill", 12.0),
            ("McGill", "Plateau", 12.0),
        ])
    }

    pub fn lookup(&self, from_zone: &str, to_zone: &str) -> Option<f64> {
        self.fares
            .get(&(from_zone.to_string(), to_zone.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.fares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fares.is_empty()
    }
}

#[async_trait]
impl PricingClient for StaticPriceTable {
    async fn resolve_price(&self, from_zone: &str, to_zone: &str) -> Result<f64, ClientError> {
        let price = self
            .lookup(from_zone, to_zone)
            .ok_or_else(|| ClientError::NotFound {
                service: SERVICE,
                reason: format!("no fare for {from_zone} -> {to_zone}"),
            })?;

        checked_fare(price)
    }
}
