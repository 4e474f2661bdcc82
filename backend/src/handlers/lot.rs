//! HTTP handlers for the lot registry, splits and lot statistics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::permissions::Capability;
use shared::split::{SplitOutcome, SplitRequest};
use shared::stats::LotStats;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::SplitHistory,
    services::lot::{
        CloseLotInput, CreateLotInput, DeleteLotOutcome, LotDetail, LotFilter, LotSummary,
        UpdateLotInput,
    },
    services::{LotService, SplitService, StatsService},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct DeleteLotQuery {
    #[serde(default)]
    pub force: bool,
}

/// List the organization's lots
pub async fn list_lots(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<LotFilter>,
) -> AppResult<Json<Vec<LotSummary>>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = LotService::new(state.db);
    let lots = service.list_lots(current_user.0.organization_id, filter).await?;
    Ok(Json(lots))
}

/// Place a new lot
pub async fn create_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateLotInput>,
) -> AppResult<(StatusCode, Json<LotDetail>)> {
    current_user.0.require(Capability::CreateLot)?;
    let service = LotService::new(state.db);
    let lot = service.create_lot(current_user.0.organization_id, input).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

pub async fn get_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<LotDetail>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = LotService::new(state.db);
    let lot = service.get_lot(current_user.0.organization_id, lot_id).await?;
    Ok(Json(lot))
}

pub async fn update_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<UpdateLotInput>,
) -> AppResult<Json<LotDetail>> {
    current_user.0.require(Capability::EditLot)?;
    let service = LotService::new(state.db);
    let lot = service.update_lot(current_user.0.organization_id, lot_id, input).await?;
    Ok(Json(lot))
}

/// Mark a lot as completed
pub async fn close_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<CloseLotInput>,
) -> AppResult<Json<LotDetail>> {
    current_user.0.require(Capability::EditLot)?;
    let service = LotService::new(state.db);
    let lot = service.close_lot(current_user.0.organization_id, lot_id, input).await?;
    Ok(Json(lot))
}

/// Soft delete a lot; `?force=true` lifts the recorded-data block
pub async fn delete_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Query(query): Query<DeleteLotQuery>,
) -> AppResult<Json<DeleteLotOutcome>> {
    current_user.0.require(Capability::DeleteLot)?;
    let service = LotService::new(state.db);
    let outcome = service
        .delete_lot(current_user.0.organization_id, lot_id, query.force)
        .await?;
    Ok(Json(outcome))
}

/// Move part of a lot's birds and costs into a new lot
pub async fn split_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(request): Json<SplitRequest>,
) -> AppResult<(StatusCode, Json<SplitOutcome>)> {
    current_user.0.require(Capability::SplitLot)?;
    let service = SplitService::new(state.db);
    let outcome = service
        .split_lot(current_user.0.organization_id, lot_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_split_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<SplitHistory>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = LotService::new(state.db);
    let history = service.split_history(current_user.0.organization_id, lot_id).await?;
    Ok(Json(history))
}

pub async fn get_lot_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<LotStats>> {
    current_user.0.require(Capability::ViewLots)?;
    let service = StatsService::new(state.db);
    let stats = service.get_stats(current_user.0.organization_id, lot_id).await?;
    Ok(Json(stats))
}

/// Rebuild a lot's statistics from its records
pub async fn recompute_lot_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<LotStats>> {
    current_user.0.require(Capability::EditLot)?;
    let service = StatsService::new(state.db);
    let stats = service.recompute_lot(current_user.0.organization_id, lot_id).await?;
    Ok(Json(stats))
}
