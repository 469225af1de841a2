use chrono::NaiveDateTime;

use crate::database::ledger::lock_pallet_for_update;
use crate::database::movements::{insert_movement, NewMovement};
use crate::database::{Database, SqlClient};
use crate::models::{
    evaluate_cancel, evaluate_claim, evaluate_release, ClaimOutcome, DiscountTask, LedgerError,
    LockStatus, MovementKind, TaskStatus,
};
use crate::utils::warehouse_now;

/// Task row state read under an update lock. The UPDLOCK on the task row
/// serializes every lock-sensitive operation against the same task.
pub(crate) struct LockedTask {
    pub pallet_id: i64,
    pub client_key: String,
    pub qty_requested: i64,
    pub aisle: String,
    pub status: TaskStatus,
    pub lock_status: LockStatus,
    pub lock_holder: Option<String>,
}

pub(crate) async fn lock_task_for_update(
    client: &mut SqlClient,
    task_id: i64,
) -> Result<LockedTask, LedgerError> {
    let query = r#"
        SELECT Id, PalletId, ClientKey, QtyRequested, Aisle,
               Status, LockStatus, LockHolder
        FROM DiscountTasks WITH (UPDLOCK, ROWLOCK)
        WHERE Id = @P1
    "#;

    let row = client
        .query(query, &[&task_id])
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to lock task row: {e}")))?
        .into_row()
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or(LedgerError::TaskNotFound { task_id })?;

    let status_code = row.get::<&str, _>("Status").unwrap_or("");
    let status = TaskStatus::parse(status_code)
        .ok_or_else(|| LedgerError::Storage(format!("Unknown task status '{status_code}'")))?;

    let lock_code = row.get::<&str, _>("LockStatus").unwrap_or("");
    let lock_status = LockStatus::parse(lock_code)
        .ok_or_else(|| LedgerError::Storage(format!("Unknown lock status '{lock_code}'")))?;

    Ok(LockedTask {
        pallet_id: row.get::<i64, _>("PalletId").unwrap_or(0),
        client_key: row.get::<&str, _>("ClientKey").unwrap_or("").to_string(),
        qty_requested: row.get::<i64, _>("QtyRequested").unwrap_or(0),
        aisle: row.get::<&str, _>("Aisle").unwrap_or("").to_string(),
        status,
        lock_status,
        lock_holder: row.get::<&str, _>("LockHolder").map(|s| s.to_string()),
    })
}

pub struct TaskDatabase {
    db: Database,
}

impl TaskDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a discount task against a pallet's availability. The pallet
    /// row is locked first, so two concurrent creations against the same
    /// pallet serialize and the loser sees the updated availability.
    pub async fn create_task(
        &self,
        pallet_id: i64,
        client_key: &str,
        quantity: i64,
        aisle: &str,
        priority: Option<&str>,
        actor: &str,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<i64, LedgerError> = async {
            let pallet = lock_pallet_for_update(tx.client(), pallet_id).await?;

            if pallet.client_key != client_key {
                return Err(LedgerError::Validation(format!(
                    "Pallet {pallet_id} belongs to client '{}', not '{client_key}'",
                    pallet.client_key
                )));
            }

            if quantity <= 0 || quantity > pallet.qty_available {
                return Err(LedgerError::InsufficientAvailability {
                    requested: quantity,
                    available: pallet.qty_available,
                });
            }

            let now = warehouse_now().naive_local();

            let insert_query = r#"
                INSERT INTO DiscountTasks (
                    PalletId, ClientKey, QtyRequested, Aisle, Priority,
                    Status, LockStatus, LockHolder, LockDate, RecDate, RecUserId
                ) OUTPUT INSERTED.Id
                VALUES (@P1, @P2, @P3, @P4, @P5, 'PENDING', 'FREE', NULL, NULL, @P6, @P7)
            "#;

            let row = tx
                .client()
                .query(
                    insert_query,
                    &[
                        &pallet_id,
                        &client_key,
                        &quantity,
                        &aisle,
                        &priority,
                        &now,
                        &actor,
                    ],
                )
                .await
                .map_err(|e| LedgerError::Transaction(format!("Failed to insert task: {e}")))?
                .into_row()
                .await
                .map_err(|e| LedgerError::Transaction(e.to_string()))?
                .ok_or_else(|| {
                    LedgerError::Transaction("Task insert returned no id".to_string())
                })?;

            let task_id: i64 = row.get("Id").unwrap_or(0);

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::CreacionTarea,
                    pallet_id: Some(pallet_id),
                    task_id: Some(task_id),
                    discount_id: None,
                    client_key,
                    qty: quantity,
                    aisle: Some(aisle),
                    actor,
                },
                &now,
            )
            .await?;

            Ok(task_id)
        }
        .await;

        match result {
            Ok(task_id) => {
                tx.commit().await?;
                Ok(task_id)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Claim the task's cooperative lock. Re-claiming by the current holder
    /// succeeds without recording a second TOMA_POSESION movement.
    pub async fn claim_task(&self, task_id: i64, actor: &str) -> Result<ClaimOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<ClaimOutcome, LedgerError> = async {
            let task = lock_task_for_update(tx.client(), task_id).await?;
            let outcome = evaluate_claim(
                task.status,
                task.lock_status,
                task.lock_holder.as_deref(),
                actor,
            )?;

            if outcome == ClaimOutcome::AlreadyHeld {
                return Ok(outcome);
            }

            let now = warehouse_now().naive_local();

            tx.client()
                .execute(
                    r#"
                        UPDATE DiscountTasks
                        SET LockStatus = 'IN_PROGRESS', LockHolder = @P2, LockDate = @P3
                        WHERE Id = @P1
                    "#,
                    &[&task_id, &actor, &now],
                )
                .await
                .map_err(|e| LedgerError::Transaction(format!("Failed to claim task: {e}")))?;

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::TomaPosesion,
                    pallet_id: Some(task.pallet_id),
                    task_id: Some(task_id),
                    discount_id: None,
                    client_key: &task.client_key,
                    qty: task.qty_requested,
                    aisle: Some(&task.aisle),
                    actor,
                },
                &now,
            )
            .await?;

            Ok(outcome)
        }
        .await;

        match result {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Release the cooperative lock. Only the current holder may release.
    pub async fn release_task(&self, task_id: i64, actor: &str) -> Result<(), LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<(), LedgerError> = async {
            let task = lock_task_for_update(tx.client(), task_id).await?;
            evaluate_release(
                task.status,
                task.lock_status,
                task.lock_holder.as_deref(),
                actor,
            )?;

            let now = warehouse_now().naive_local();

            tx.client()
                .execute(
                    r#"
                        UPDATE DiscountTasks
                        SET LockStatus = 'FREE', LockHolder = NULL, LockDate = NULL
                        WHERE Id = @P1
                    "#,
                    &[&task_id],
                )
                .await
                .map_err(|e| LedgerError::Transaction(format!("Failed to release task: {e}")))?;

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::DesbloqueoTarea,
                    pallet_id: Some(task.pallet_id),
                    task_id: Some(task_id),
                    discount_id: None,
                    client_key: &task.client_key,
                    qty: task.qty_requested,
                    aisle: Some(&task.aisle),
                    actor,
                },
                &now,
            )
            .await?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Cancel a pending task, returning its requested quantity to the
    /// pallet's availability. A claim held by another actor blocks this.
    pub async fn cancel_task(&self, task_id: i64, actor: &str) -> Result<(), LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<(), LedgerError> = async {
            let task = lock_task_for_update(tx.client(), task_id).await?;
            evaluate_cancel(
                task.status,
                task.lock_status,
                task.lock_holder.as_deref(),
                actor,
            )?;

            let now = warehouse_now().naive_local();

            tx.client()
                .execute(
                    r#"
                        UPDATE DiscountTasks
                        SET Status = 'CANCELLED', LockStatus = 'FREE',
                            LockHolder = NULL, LockDate = NULL
                        WHERE Id = @P1
                    "#,
                    &[&task_id],
                )
                .await
                .map_err(|e| LedgerError::Transaction(format!("Failed to cancel task: {e}")))?;

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::CancelacionTarea,
                    pallet_id: Some(task.pallet_id),
                    task_id: Some(task_id),
                    discount_id: None,
                    client_key: &task.client_key,
                    qty: task.qty_requested,
                    aisle: Some(&task.aisle),
                    actor,
                },
                &now,
            )
            .await?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Fetch a task with its derived pending amount.
    pub async fn find_task(&self, task_id: i64) -> Result<DiscountTask, LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let query = r#"
            SELECT t.Id, t.PalletId, t.ClientKey, t.QtyRequested, t.Aisle, t.Priority,
                   t.Status, t.LockStatus, t.LockHolder, t.LockDate, t.RecDate, t.RecUserId,
                   COALESCE((SELECT SUM(d.Qty) FROM Discounts d WHERE d.TaskId = t.Id), 0)
                       as QtyDiscounted
            FROM DiscountTasks t WITH (NOLOCK)
            WHERE t.Id = @P1
        "#;

        let row = client
            .query(query, &[&task_id])
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .ok_or(LedgerError::TaskNotFound { task_id })?;

        task_from_row(&row)
    }

    /// List tasks, newest first, optionally filtered by lifecycle status.
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        page: i32,
        limit: i32,
    ) -> Result<(Vec<DiscountTask>, i32), LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let offset = (page - 1) * limit;

        const SELECT_COLUMNS: &str = r#"
            SELECT t.Id, t.PalletId, t.ClientKey, t.QtyRequested, t.Aisle, t.Priority,
                   t.Status, t.LockStatus, t.LockHolder, t.LockDate, t.RecDate, t.RecUserId,
                   COALESCE((SELECT SUM(d.Qty) FROM Discounts d WHERE d.TaskId = t.Id), 0)
                       as QtyDiscounted
            FROM DiscountTasks t WITH (NOLOCK)
        "#;

        let (total_count, rows) = if let Some(status) = status {
            let status_code = status.as_str();
            let count_row = client
                .query(
                    "SELECT COUNT(*) as total_count FROM DiscountTasks WITH (NOLOCK) WHERE Status = @P1",
                    &[&status_code],
                )
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?
                .into_row()
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            let total = count_row
                .map(|row| row.get::<i32, _>("total_count").unwrap_or(0))
                .unwrap_or(0);

            let query = format!(
                "{SELECT_COLUMNS} WHERE t.Status = @P1 ORDER BY t.Id DESC OFFSET @P2 ROWS FETCH NEXT @P3 ROWS ONLY"
            );
            let rows = client
                .query(query.as_str(), &[&status_code, &offset, &limit])
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?
                .into_first_result()
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            (total, rows)
        } else {
            let count_row = client
                .query(
                    "SELECT COUNT(*) as total_count FROM DiscountTasks WITH (NOLOCK)",
                    &[],
                )
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?
                .into_row()
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            let total = count_row
                .map(|row| row.get::<i32, _>("total_count").unwrap_or(0))
                .unwrap_or(0);

            let query = format!(
                "{SELECT_COLUMNS} ORDER BY t.Id DESC OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY"
            );
            let rows = client
                .query(query.as_str(), &[&offset, &limit])
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?
                .into_first_result()
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            (total, rows)
        };

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            tasks.push(task_from_row(&row)?);
        }

        Ok((tasks, total_count))
    }
}

fn task_from_row(row: &tiberius::Row) -> Result<DiscountTask, LedgerError> {
    let status_code = row.get::<&str, _>("Status").unwrap_or("");
    let status = TaskStatus::parse(status_code)
        .ok_or_else(|| LedgerError::Storage(format!("Unknown task status '{status_code}'")))?;

    let lock_code = row.get::<&str, _>("LockStatus").unwrap_or("");
    let lock_status = LockStatus::parse(lock_code)
        .ok_or_else(|| LedgerError::Storage(format!("Unknown lock status '{lock_code}'")))?;

    let qty_requested: i64 = row.get("QtyRequested").unwrap_or(0);
    let qty_discounted: i64 = row.get("QtyDiscounted").unwrap_or(0);

    Ok(DiscountTask {
        id: row.get::<i64, _>("Id").unwrap_or(0),
        pallet_id: row.get::<i64, _>("PalletId").unwrap_or(0),
        client_key: row.get::<&str, _>("ClientKey").unwrap_or("").to_string(),
        qty_requested,
        qty_discounted,
        qty_pending: (qty_requested - qty_discounted).max(0),
        aisle: row.get::<&str, _>("Aisle").unwrap_or("").to_string(),
        priority: row.get::<&str, _>("Priority").map(|s| s.to_string()),
        status,
        lock_status,
        lock_holder: row.get::<&str, _>("LockHolder").map(|s| s.to_string()),
        lock_date: row.get::<NaiveDateTime, _>("LockDate"),
        rec_date: row
            .get::<NaiveDateTime, _>("RecDate")
            .unwrap_or_else(|| warehouse_now().naive_local()),
        rec_user_id: row.get::<&str, _>("RecUserId").unwrap_or("").to_string(),
    })
}
