use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::collections::HashMap;

use crate::constants;
use crate::database::Database;
use crate::handlers::handle_ledger_error;
use crate::models::{
    AvailabilityResponse, DirectDiscountRequest, Discount, DiscountResult, IntakeRequest,
    IntakeResult,
};
use crate::services::WarehouseService;

/// Create pallet routes
pub fn create_pallet_routes() -> Router<Database> {
    Router::new()
        .route("/", post(record_intake).get(list_pallets))
        .route("/{pallet_id}/availability", get(get_availability))
        .route(
            "/{pallet_id}/discounts",
            post(apply_direct_discount).get(list_pallet_discounts),
        )
}

/// Record a pallet intake
/// POST /api/pallets
async fn record_intake(
    State(database): State<Database>,
    Json(request): Json<IntakeRequest>,
) -> Result<(StatusCode, Json<IntakeResult>), (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.record_intake(request).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(result))),
        Err(e) => handle_ledger_error(e),
    }
}

/// List pallets with derived availability
/// GET /api/pallets?page={page}&limit={limit}
async fn list_pallets(
    State(database): State<Database>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);

    let page = params
        .get("page")
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(1)
        .max(1);
    let limit = params
        .get("limit")
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(constants::DEFAULT_PAGE_SIZE)
        .clamp(1, constants::MAX_PAGE_SIZE);

    match service.list_pallets(page, limit).await {
        Ok((pallets, total)) => {
            let total_pages = ((total as f64) / (limit as f64)).ceil() as i32;
            Ok(Json(json!({
                "items": pallets,
                "total": total,
                "page": page,
                "pages": total_pages,
                "limit": limit
            })))
        }
        Err(e) => handle_ledger_error(e),
    }
}

/// Current availability of a pallet
/// GET /api/pallets/{pallet_id}/availability
async fn get_availability(
    State(database): State<Database>,
    Path(pallet_id): Path<i64>,
) -> Result<Json<AvailabilityResponse>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.availability(pallet_id).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => handle_ledger_error(e),
    }
}

/// List all discounts recorded against a pallet
/// GET /api/pallets/{pallet_id}/discounts
async fn list_pallet_discounts(
    State(database): State<Database>,
    Path(pallet_id): Path<i64>,
) -> Result<Json<Vec<Discount>>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.list_pallet_discounts(pallet_id).await {
        Ok(discounts) => Ok(Json(discounts)),
        Err(e) => handle_ledger_error(e),
    }
}

/// Apply a discount directly against a pallet
/// POST /api/pallets/{pallet_id}/discounts
async fn apply_direct_discount(
    State(database): State<Database>,
    Path(pallet_id): Path<i64>,
    Json(request): Json<DirectDiscountRequest>,
) -> Result<(StatusCode, Json<DiscountResult>), (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.apply_direct_discount(pallet_id, request).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(result))),
        Err(e) => handle_ledger_error(e),
    }
}
