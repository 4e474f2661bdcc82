//! HTTP handlers for health events and vaccination programs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::permissions::Capability;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{HealthEvent, UpcomingVaccination, VaccinationSchedule},
    services::health::{
        ApplyProgramInput, CreateHealthEventInput, HealthEventFilter, HealthEventOutcome,
        UpcomingQuery, VaccinationInput,
    },
    services::HealthService,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ClearedSchedules {
    pub lot_id: Uuid,
    pub removed: u64,
}

pub async fn list_health_events(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Query(filter): Query<HealthEventFilter>,
) -> AppResult<Json<Vec<HealthEvent>>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = HealthService::new(state.db);
    let events = service
        .list_events(current_user.0.organization_id, lot_id, filter)
        .await?;
    Ok(Json(events))
}

/// Record a health event; a cost also books a veterinary expense
pub async fn create_health_event(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<CreateHealthEventInput>,
) -> AppResult<(StatusCode, Json<HealthEventOutcome>)> {
    current_user.0.require(Capability::RecordHealth)?;
    let service = HealthService::new(state.db);
    let outcome = service
        .create_event(current_user.0.organization_id, lot_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_vaccination_schedules(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<Vec<VaccinationSchedule>>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = HealthService::new(state.db);
    let schedules = service
        .list_schedules(current_user.0.organization_id, lot_id)
        .await?;
    Ok(Json(schedules))
}

pub async fn create_vaccination_schedule(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<VaccinationInput>,
) -> AppResult<(StatusCode, Json<VaccinationSchedule>)> {
    current_user.0.require(Capability::PlanVaccinations)?;
    let service = HealthService::new(state.db);
    let schedule = service
        .create_schedule(current_user.0.organization_id, lot_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// Replace a lot's vaccination schedule with a program
pub async fn apply_vaccination_program(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<ApplyProgramInput>,
) -> AppResult<Json<Vec<VaccinationSchedule>>> {
    current_user.0.require(Capability::PlanVaccinations)?;
    let service = HealthService::new(state.db);
    let schedules = service
        .apply_program(current_user.0.organization_id, lot_id, input)
        .await?;
    Ok(Json(schedules))
}

pub async fn clear_vaccination_schedules(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<ClearedSchedules>> {
    current_user.0.require(Capability::PlanVaccinations)?;
    let service = HealthService::new(state.db);
    let removed = service
        .clear_schedules(current_user.0.organization_id, lot_id)
        .await?;
    Ok(Json(ClearedSchedules { lot_id, removed }))
}

/// Vaccinations coming due or missed across the organization's active lots
pub async fn get_upcoming_vaccinations(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<UpcomingQuery>,
) -> AppResult<Json<Vec<UpcomingVaccination>>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = HealthService::new(state.db);
    let upcoming = service
        .upcoming(current_user.0.organization_id, query)
        .await?;
    Ok(Json(upcoming))
}
