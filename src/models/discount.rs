use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::pallet::{validate_actor, validate_quantity};
use crate::models::LedgerError;

/// An applied deduction. `task_id = None` means the quantity was discounted
/// directly against the pallet. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub id: i64,
    pub task_id: Option<i64>,
    pub pallet_id: i64,
    pub client_key: String,
    pub qty: i64,
    pub rec_date: NaiveDateTime,
    pub rec_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskDiscountRequest {
    pub quantity: i64,
    pub user_id: String,
}

impl TaskDiscountRequest {
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_actor(&self.user_id)?;
        validate_quantity(self.quantity)
    }
}

#[derive(Debug, Deserialize)]
pub struct DirectDiscountRequest {
    pub quantity: i64,
    pub user_id: String,
}

impl DirectDiscountRequest {
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_actor(&self.user_id)?;
        validate_quantity(self.quantity)
    }
}

#[derive(Debug, Serialize)]
pub struct DiscountResult {
    pub success: bool,
    pub discount_id: i64,
    /// Remaining pending amount of the task after this discount; zero means
    /// the task was completed. Absent for direct discounts.
    pub qty_pending: Option<i64>,
    pub task_completed: bool,
    pub message: String,
    pub timestamp: String,
}
