//! HTTP handlers for daily entries, sales and expenses

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::permissions::Capability;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{Expense, Sale},
    services::records::{
        CreateExpenseInput, CreateSaleInput, DailyEntryInput, DailyEntryOutcome,
        RecordPaymentInput,
    },
    services::RecordsService,
    AppState,
};

/// Record one day of observations for a lot
pub async fn record_daily_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<DailyEntryInput>,
) -> AppResult<(StatusCode, Json<DailyEntryOutcome>)> {
    current_user.0.require(Capability::RecordProduction)?;
    let service = RecordsService::new(state.db);
    let outcome = service
        .daily_entry(current_user.0.organization_id, lot_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    current_user.0.require(Capability::CreateSale)?;
    let service = RecordsService::new(state.db);
    let sale = service.create_sale(current_user.0.organization_id, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Add a payment to a sale
pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<Sale>> {
    current_user.0.require(Capability::RecordPayment)?;
    let service = RecordsService::new(state.db);
    let sale = service
        .record_payment(current_user.0.organization_id, sale_id, input)
        .await?;
    Ok(Json(sale))
}

pub async fn create_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExpenseInput>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    current_user.0.require(Capability::CreateExpense)?;
    let service = RecordsService::new(state.db);
    let expense = service.create_expense(current_user.0.organization_id, input).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Capability::DeleteExpense)?;
    let service = RecordsService::new(state.db);
    service
        .delete_expense(current_user.0.organization_id, expense_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
