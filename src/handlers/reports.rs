use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

use crate::database::Database;
use crate::handlers::handle_ledger_error;
use crate::models::ReportSummary;
use crate::services::WarehouseService;

/// Create reporting routes
pub fn create_report_routes() -> Router<Database> {
    Router::new().route("/summary", get(get_summary))
}

/// KPI summary: pending, processed and cancelled totals plus last action
/// GET /api/report/summary
async fn get_summary(
    State(database): State<Database>,
) -> Result<Json<ReportSummary>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.report_summary().await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => handle_ledger_error(e),
    }
}
