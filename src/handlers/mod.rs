use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;

use crate::models::LedgerError;

pub mod movements;
pub mod pallets;
pub mod reports;
pub mod tasks;

/// Map a ledger error to its HTTP representation. Business-rule failures
/// carry the computed amounts so clients can show what was actually
/// available; storage failures are logged and returned as opaque 500s.
pub fn handle_ledger_error<T>(
    error: LedgerError,
) -> Result<T, (StatusCode, Json<serde_json::Value>)> {
    Err(error_response(error))
}

pub fn error_response(error: LedgerError) -> (StatusCode, Json<serde_json::Value>) {
    match error {
        LedgerError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Validation error",
                "message": msg
            })),
        ),
        LedgerError::InsufficientAvailability {
            requested,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Insufficient availability",
                "message": format!("Requested {requested} but only {available} available"),
                "requested": requested,
                "available": available
            })),
        ),
        LedgerError::InvalidQuantity {
            requested,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid quantity",
                "message": format!("Requested {requested} but only {available} available"),
                "requested": requested,
                "available": available
            })),
        ),
        LedgerError::PalletNotFound { pallet_id } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Pallet not found",
                "message": format!("Pallet {pallet_id} not found"),
                "pallet_id": pallet_id
            })),
        ),
        LedgerError::TaskNotFound { task_id } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Task not found",
                "message": format!("Task {task_id} not found"),
                "task_id": task_id
            })),
        ),
        LedgerError::Forbidden { holder } => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Forbidden",
                "message": format!("Task lock is held by '{holder}'"),
                "holder": holder
            })),
        ),
        LedgerError::Conflict { holder } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Conflict",
                "message": format!("Task is already claimed by '{holder}'"),
                "holder": holder
            })),
        ),
        LedgerError::InvalidState(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "Invalid state",
                "message": msg
            })),
        ),
        LedgerError::Storage(msg) => {
            tracing::error!("Database error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Database error",
                    "message": "Internal server error occurred"
                })),
            )
        }
        LedgerError::Transaction(msg) => {
            tracing::error!("Transaction error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Transaction error",
                    "message": "Failed to complete transaction"
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_availability_maps_to_400_with_amounts() {
        let (status, Json(body)) = error_response(LedgerError::InsufficientAvailability {
            requested: 101,
            available: 100,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["available"], 100);
        assert_eq!(body["requested"], 101);
    }

    #[test]
    fn claim_contention_maps_to_409() {
        let (status, Json(body)) = error_response(LedgerError::Conflict {
            holder: "worker-a".to_string(),
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["holder"], "worker-a");
    }

    #[test]
    fn missing_entities_map_to_404() {
        let (status, _) = error_response(LedgerError::PalletNotFound { pallet_id: 7 });
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = error_response(LedgerError::TaskNotFound { task_id: 9 });
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn lock_violations_map_to_403() {
        let (status, _) = error_response(LedgerError::Forbidden {
            holder: "worker-a".to_string(),
        });
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_errors_hide_internal_detail() {
        let (status, Json(body)) =
            error_response(LedgerError::Storage("login failed for sa".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("sa"));
    }
}
