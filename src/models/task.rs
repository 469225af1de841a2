use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::pallet::{validate_actor, validate_client, validate_quantity};
use crate::models::LedgerError;

/// Task lifecycle state. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "PENDING" => Some(TaskStatus::Pending),
            "COMPLETED" => Some(TaskStatus::Completed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// Cooperative lock sub-state, only meaningful while the task is `Pending`.
/// The holder lives in the task row so it survives restarts and is visible
/// to every service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Free,
    InProgress,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Free => "FREE",
            LockStatus::InProgress => "IN_PROGRESS",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "FREE" => Some(LockStatus::Free),
            "IN_PROGRESS" => Some(LockStatus::InProgress),
            _ => None,
        }
    }
}

/// A discount task as returned to callers. `qty_pending` is derived from the
/// discounts applied so far, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountTask {
    pub id: i64,
    pub pallet_id: i64,
    pub client_key: String,
    pub qty_requested: i64,
    pub qty_discounted: i64,
    pub qty_pending: i64,
    pub aisle: String,
    pub priority: Option<String>,
    pub status: TaskStatus,
    pub lock_status: LockStatus,
    pub lock_holder: Option<String>,
    pub lock_date: Option<NaiveDateTime>,
    pub rec_date: NaiveDateTime,
    pub rec_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub pallet_id: i64,
    pub client_key: String,
    pub quantity: i64,
    pub aisle: String,
    pub priority: Option<String>,
    pub user_id: String,
}

impl CreateTaskRequest {
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_client(&self.client_key)?;
        validate_actor(&self.user_id)?;
        validate_quantity(self.quantity)?;
        if self.aisle.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Aisle must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request body for claim, release and cancel. Actor identity is mandatory
/// on every lock-sensitive operation.
#[derive(Debug, Deserialize)]
pub struct TaskActionRequest {
    pub user_id: String,
}

impl TaskActionRequest {
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_actor(&self.user_id)
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResult {
    pub success: bool,
    pub task_id: i64,
    pub message: String,
    pub timestamp: String,
}

/// Outcome of a claim attempt against the current row state.
#[derive(Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Lock transitions FREE -> IN_PROGRESS; a movement must be recorded.
    Granted,
    /// Re-claim by the current holder; succeeds without a new movement.
    AlreadyHeld,
}

/// Decide a claim attempt. The caller must hold the task row under an update
/// lock so the decision and the subsequent write are atomic.
pub fn evaluate_claim(
    status: TaskStatus,
    lock: LockStatus,
    holder: Option<&str>,
    actor: &str,
) -> Result<ClaimOutcome, LedgerError> {
    if status != TaskStatus::Pending {
        return Err(LedgerError::InvalidState(format!(
            "Task is {} and can no longer be claimed",
            status.as_str()
        )));
    }
    match lock {
        LockStatus::Free => Ok(ClaimOutcome::Granted),
        LockStatus::InProgress => {
            let holder = holder.unwrap_or_default();
            if holder == actor {
                Ok(ClaimOutcome::AlreadyHeld)
            } else {
                Err(LedgerError::Conflict {
                    holder: holder.to_string(),
                })
            }
        }
    }
}

/// Decide a release attempt: only the current holder of an IN_PROGRESS lock
/// may release it.
pub fn evaluate_release(
    status: TaskStatus,
    lock: LockStatus,
    holder: Option<&str>,
    actor: &str,
) -> Result<(), LedgerError> {
    if status != TaskStatus::Pending {
        return Err(LedgerError::InvalidState(format!(
            "Task is {} and holds no releasable lock",
            status.as_str()
        )));
    }
    if lock != LockStatus::InProgress {
        return Err(LedgerError::InvalidState(
            "Task is not currently claimed".to_string(),
        ));
    }
    let holder = holder.unwrap_or_default();
    if holder != actor {
        return Err(LedgerError::Forbidden {
            holder: holder.to_string(),
        });
    }
    Ok(())
}

/// Decide a cancel attempt. Only PENDING tasks can be cancelled; a claim held
/// by a different actor blocks cancellation (the holder, or anyone once the
/// lock is free, may cancel).
pub fn evaluate_cancel(
    status: TaskStatus,
    lock: LockStatus,
    holder: Option<&str>,
    actor: &str,
) -> Result<(), LedgerError> {
    if status != TaskStatus::Pending {
        return Err(LedgerError::InvalidState(format!(
            "Task is {} and can no longer be cancelled",
            status.as_str()
        )));
    }
    if lock == LockStatus::InProgress {
        let holder = holder.unwrap_or_default();
        if holder != actor {
            return Err(LedgerError::Conflict {
                holder: holder.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_on_free_pending_task_is_granted() {
        let outcome = evaluate_claim(TaskStatus::Pending, LockStatus::Free, None, "worker-a");
        assert_eq!(outcome.unwrap(), ClaimOutcome::Granted);
    }

    #[test]
    fn reclaim_by_holder_is_idempotent() {
        let outcome = evaluate_claim(
            TaskStatus::Pending,
            LockStatus::InProgress,
            Some("worker-a"),
            "worker-a",
        );
        assert_eq!(outcome.unwrap(), ClaimOutcome::AlreadyHeld);
    }

    #[test]
    fn claim_against_foreign_holder_conflicts() {
        let err = evaluate_claim(
            TaskStatus::Pending,
            LockStatus::InProgress,
            Some("worker-a"),
            "worker-b",
        )
        .unwrap_err();
        match err {
            LedgerError::Conflict { holder } => assert_eq!(holder, "worker-a"),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn claim_on_terminal_task_is_invalid_state() {
        for status in [TaskStatus::Completed, TaskStatus::Cancelled] {
            let err = evaluate_claim(status, LockStatus::Free, None, "worker-a").unwrap_err();
            assert!(matches!(err, LedgerError::InvalidState(_)));
        }
    }

    #[test]
    fn release_requires_current_holder() {
        let err = evaluate_release(
            TaskStatus::Pending,
            LockStatus::InProgress,
            Some("worker-a"),
            "worker-b",
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden { .. }));

        assert!(evaluate_release(
            TaskStatus::Pending,
            LockStatus::InProgress,
            Some("worker-a"),
            "worker-a",
        )
        .is_ok());
    }

    #[test]
    fn release_of_unclaimed_task_is_invalid_state() {
        let err =
            evaluate_release(TaskStatus::Pending, LockStatus::Free, None, "worker-a").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn cancel_blocked_while_claimed_by_other_actor() {
        let err = evaluate_cancel(
            TaskStatus::Pending,
            LockStatus::InProgress,
            Some("worker-a"),
            "supervisor",
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
    }

    #[test]
    fn cancel_allowed_for_holder_and_on_free_tasks() {
        assert!(evaluate_cancel(
            TaskStatus::Pending,
            LockStatus::InProgress,
            Some("worker-a"),
            "worker-a",
        )
        .is_ok());
        assert!(evaluate_cancel(TaskStatus::Pending, LockStatus::Free, None, "anyone").is_ok());
    }

    #[test]
    fn cancel_of_terminal_task_is_invalid_state() {
        let err =
            evaluate_cancel(TaskStatus::Completed, LockStatus::Free, None, "worker-a").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Cancelled] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("UNKNOWN"), None);
        assert_eq!(LockStatus::parse("IN_PROGRESS"), Some(LockStatus::InProgress));
    }
}
