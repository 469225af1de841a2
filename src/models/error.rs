use thiserror::Error;

/// Errors surfaced by the ledger core. Business-rule and validation variants
/// are raised before any write; the enclosing transaction is rolled back in
/// every failure path.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient availability: requested {requested}, available {available}")]
    InsufficientAvailability { requested: i64, available: i64 },

    /// `available` is the task's pending amount for task discounts, the
    /// pallet's computed availability for direct discounts.
    #[error("Invalid quantity: requested {requested}, available {available}")]
    InvalidQuantity { requested: i64, available: i64 },

    #[error("Pallet {pallet_id} not found")]
    PalletNotFound { pallet_id: i64 },

    #[error("Task {task_id} not found")]
    TaskNotFound { task_id: i64 },

    #[error("Operation requires the task lock, currently held by '{holder}'")]
    Forbidden { holder: String },

    #[error("Invalid task state: {0}")]
    InvalidState(String),

    #[error("Task already claimed by '{holder}'")]
    Conflict { holder: String },

    #[error("Database error: {0}")]
    Storage(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}
