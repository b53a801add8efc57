use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::CreateRide;
use crate::error::AppError;
use crate::models::ride::{Ride, RideId, RideStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/status", patch(update_ride_status))
}

#[derive(Deserialize)]
pub struct CreateRideRequest {
    #[serde(rename = "passengerId", alias = "passenger_id")]
    pub passenger_id: String,
    #[serde(alias = "fromZone")]
    pub from_zone: String,
    #[serde(alias = "toZone")]
    pub to_zone: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: RideStatus,
}

fn parse_ride_id(raw: &str) -> Result<RideId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid ride id '{raw}'")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(format!("invalid request body: {rejection}")))
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRideRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let payload = body(payload)?;

    let ride = state
        .orchestrator
        .create_ride(CreateRide {
            passenger_id: payload.passenger_id,
            from_zone: payload.from_zone,
            to_zone: payload.to_zone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ride)))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ride>, AppError> {
    let id = parse_ride_id(&id)?;
    let ride = state.orchestrator.get_ride(id).await?;

    Ok(Json(ride))
}

async fn update_ride_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Ride>, AppError> {
    let id = parse_ride_id(&id)?;
    let payload = body(payload)?;

    let ride = state.orchestrator.update_status(id, payload.status).await?;

    Ok(Json(ride))
}
