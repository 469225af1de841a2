use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::collections::HashMap;

use crate::database::Database;
use crate::handlers::handle_ledger_error;
use crate::models::{Movement, MovementFilter};
use crate::services::WarehouseService;

/// Create movement-log routes
pub fn create_movement_routes() -> Router<Database> {
    Router::new().route("/", get(query_movements))
}

/// Create administrative routes
pub fn create_admin_routes() -> Router<Database> {
    Router::new().route("/purge", post(purge_all))
}

/// Query the movement log, newest first
/// GET /api/movements?date_from={YYYY-MM-DD}&date_to={YYYY-MM-DD}
async fn query_movements(
    State(database): State<Database>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Movement>>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);

    let filter = match MovementFilter::from_params(
        params.get("date_from").map(|s| s.as_str()),
        params.get("date_to").map(|s| s.as_str()),
    ) {
        Ok(filter) => filter,
        Err(e) => return handle_ledger_error(e),
    };

    match service.query_movements(filter).await {
        Ok(movements) => Ok(Json(movements)),
        Err(e) => handle_ledger_error(e),
    }
}

/// Administrative bulk clear of all ledger state
/// POST /api/admin/purge
async fn purge_all(
    State(database): State<Database>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.purge_all().await {
        Ok((movements, discounts, tasks, pallets)) => Ok(Json(json!({
            "success": true,
            "deleted": {
                "movements": movements,
                "discounts": discounts,
                "tasks": tasks,
                "pallets": pallets
            }
        }))),
        Err(e) => handle_ledger_error(e),
    }
}
