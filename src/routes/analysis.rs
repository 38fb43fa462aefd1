use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/analysis/upload",
            post(commands::dataset::upload_workbook_axum),
        )
        .route(
            "/api/analysis/momentum",
            get(commands::analysis::momentum_analysis_axum),
        )
        .route(
            "/api/analysis/momentum/export",
            get(commands::export::momentum_report_axum),
        )
        .route(
            "/api/analysis/report",
            post(commands::export::upload_report_axum),
        )
        .route(
            "/api/analysis/cycle",
            get(commands::analysis::cycle_analysis_axum),
        )
        .route(
            "/api/analysis/cycle/export",
            get(commands::export::cycle_report_axum),
        )
}
