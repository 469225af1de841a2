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
    CreateTaskRequest, DiscountResult, DiscountTask, TaskActionRequest, TaskDiscountRequest,
    TaskResult,
};
use crate::services::WarehouseService;

/// Create task routes
pub fn create_task_routes() -> Router<Database> {
    Router::new()
        .route("/", post(create_task).get(list_tasks))
        .route("/{task_id}", get(get_task))
        .route("/{task_id}/claim", post(claim_task))
        .route("/{task_id}/release", post(release_task))
        .route("/{task_id}/cancel", post(cancel_task))
        .route("/{task_id}/discounts", post(apply_task_discount))
}

/// Create a discount task against a pallet
/// POST /api/tasks
async fn create_task(
    State(database): State<Database>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResult>), (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.create_task(request).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(result))),
        Err(e) => handle_ledger_error(e),
    }
}

/// List tasks with optional status filter
/// GET /api/tasks?status={PENDING|COMPLETED|CANCELLED}&page={page}&limit={limit}
async fn list_tasks(
    State(database): State<Database>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);

    let status = params.get("status").map(|s| s.as_str());
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

    match service.list_tasks(status, page, limit).await {
        Ok((tasks, total)) => {
            let total_pages = ((total as f64) / (limit as f64)).ceil() as i32;
            Ok(Json(json!({
                "items": tasks,
                "total": total,
                "page": page,
                "pages": total_pages,
                "limit": limit
            })))
        }
        Err(e) => handle_ledger_error(e),
    }
}

/// Fetch a task with its derived pending amount
/// GET /api/tasks/{task_id}
async fn get_task(
    State(database): State<Database>,
    Path(task_id): Path<i64>,
) -> Result<Json<DiscountTask>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.find_task(task_id).await {
        Ok(task) => Ok(Json(task)),
        Err(e) => handle_ledger_error(e),
    }
}

/// Claim the task's cooperative lock
/// POST /api/tasks/{task_id}/claim
async fn claim_task(
    State(database): State<Database>,
    Path(task_id): Path<i64>,
    Json(request): Json<TaskActionRequest>,
) -> Result<Json<TaskResult>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.claim_task(task_id, request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => handle_ledger_error(e),
    }
}

/// Release the task's cooperative lock
/// POST /api/tasks/{task_id}/release
async fn release_task(
    State(database): State<Database>,
    Path(task_id): Path<i64>,
    Json(request): Json<TaskActionRequest>,
) -> Result<Json<TaskResult>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.release_task(task_id, request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => handle_ledger_error(e),
    }
}

/// Cancel a pending task
/// POST /api/tasks/{task_id}/cancel
async fn cancel_task(
    State(database): State<Database>,
    Path(task_id): Path<i64>,
    Json(request): Json<TaskActionRequest>,
) -> Result<Json<TaskResult>, (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.cancel_task(task_id, request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => handle_ledger_error(e),
    }
}

/// Apply a discount against a claimed task
/// POST /api/tasks/{task_id}/discounts
async fn apply_task_discount(
    State(database): State<Database>,
    Path(task_id): Path<i64>,
    Json(request): Json<TaskDiscountRequest>,
) -> Result<(StatusCode, Json<DiscountResult>), (StatusCode, Json<serde_json::Value>)> {
    let service = WarehouseService::new(database);
    match service.apply_task_discount(task_id, request).await {
        Ok(result) => Ok((StatusCode::CREATED, Json(result))),
        Err(e) => handle_ledger_error(e),
    }
}
