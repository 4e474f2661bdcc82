//! Route definitions for the Poultry Lot Management Platform

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - lot registry, splits, daily entries
        .nest("/lots", lot_routes(state.clone()))
        // Protected routes - ledger
        .nest("/sales", sale_routes(state.clone()))
        .nest("/expenses", expense_routes(state.clone()))
        // Protected routes - vaccination planning across lots
        .nest("/vaccinations", vaccination_routes(state.clone()))
        // Protected routes - financial rollups
        .nest("/finance", finance_routes(state))
}

/// Lot routes (protected)
fn lot_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_lots).post(handlers::create_lot))
        .route(
            "/:lot_id",
            get(handlers::get_lot)
                .patch(handlers::update_lot)
                .delete(handlers::delete_lot),
        )
        .route("/:lot_id/close", post(handlers::close_lot))
        .route("/:lot_id/split", post(handlers::split_lot))
        .route("/:lot_id/split-history", get(handlers::get_split_history))
        .route("/:lot_id/daily-entry", post(handlers::record_daily_entry))
        .route(
            "/:lot_id/health-events",
            get(handlers::list_health_events).post(handlers::create_health_event),
        )
        .route(
            "/:lot_id/vaccination-schedules",
            get(handlers::list_vaccination_schedules)
                .post(handlers::create_vaccination_schedule)
                .put(handlers::apply_vaccination_program)
                .delete(handlers::clear_vaccination_schedules),
        )
        .route("/:lot_id/stats", get(handlers::get_lot_stats))
        .route("/:lot_id/stats/recompute", post(handlers::recompute_lot_stats))
        .route(
            "/:lot_id/financial-summary",
            get(handlers::get_lot_financial_summary),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_sale))
        .route("/:sale_id/payment", post(handlers::record_payment))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Expense routes (protected)
fn expense_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_expense))
        .route("/:expense_id", delete(handlers::delete_expense))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Vaccination routes (protected)
fn vaccination_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/upcoming", get(handlers::get_upcoming_vaccinations))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Financial rollup routes (protected)
fn finance_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::get_financial_summary))
        .route("/monthly", get(handlers::get_monthly_series))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
