//! HTTP handlers for financial summaries and exports

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use shared::permissions::Capability;
use shared::rollup::{FinancialSummary, LotFinancialSummary};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::finance::{MonthlyQuery, SeriesFormat, SummaryQuery},
    services::FinanceService,
    AppState,
};

fn finance_service(state: AppState) -> FinanceService {
    FinanceService::new(state.db, state.config.finance.clone())
}

/// Sales, expenses and margin over sites and an optional date range
pub async fn get_financial_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<FinancialSummary>> {
    current_user.0.require(Capability::ViewReports)?;
    let summary = finance_service(state)
        .summary(current_user.0.organization_id, &query)
        .await?;
    Ok(Json(summary))
}

/// Monthly series as JSON, or CSV with `format=csv`
pub async fn get_monthly_series(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MonthlyQuery>,
) -> AppResult<Response> {
    current_user.0.require(Capability::ViewReports)?;
    if query.format == SeriesFormat::Csv {
        current_user.0.require(Capability::ExportData)?;
    }

    let series = finance_service(state)
        .monthly(current_user.0.organization_id, &query)
        .await?;

    match query.format {
        SeriesFormat::Json => Ok(Json(series).into_response()),
        SeriesFormat::Csv => {
            let csv = FinanceService::export_to_csv(&series.months)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"monthly-finance.csv\"",
                    ),
                ],
                csv,
            )
                .into_response())
        }
    }
}

pub async fn get_lot_financial_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<LotFinancialSummary>> {
    current_user.0.require(Capability::ViewReports)?;
    let summary = finance_service(state)
        .lot_financial_summary(current_user.0.organization_id, lot_id)
        .await?;
    Ok(Json(summary))
}
