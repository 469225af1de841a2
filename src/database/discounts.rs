use chrono::NaiveDateTime;

use crate::database::ledger::lock_pallet_for_update;
use crate::database::movements::{insert_movement, NewMovement};
use crate::database::tasks::lock_task_for_update;
use crate::database::{Database, SqlClient};
use crate::models::{Discount, LedgerError, LockStatus, MovementKind, TaskStatus};
use crate::utils::warehouse_now;

/// Result of a discount applied against a task.
pub struct AppliedTaskDiscount {
    pub discount_id: i64,
    pub qty_pending: i64,
    pub task_completed: bool,
}

pub struct DiscountDatabase {
    db: Database,
}

impl DiscountDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply a quantity against a claimed task. Requires the caller to hold
    /// the task's lock. A discount equal to the pending amount completes the
    /// task; in both cases the lock is released - a worker applies one
    /// deduction per claim.
    pub async fn apply_to_task(
        &self,
        task_id: i64,
        quantity: i64,
        actor: &str,
    ) -> Result<AppliedTaskDiscount, LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<AppliedTaskDiscount, LedgerError> = async {
            let task = lock_task_for_update(tx.client(), task_id).await?;

            if task.status != TaskStatus::Pending {
                return Err(LedgerError::InvalidState(format!(
                    "Task is {} and no longer accepts discounts",
                    task.status.as_str()
                )));
            }
            if task.lock_status != LockStatus::InProgress {
                return Err(LedgerError::InvalidState(
                    "Task must be claimed before discounting".to_string(),
                ));
            }
            let holder = task.lock_holder.as_deref().unwrap_or_default();
            if holder != actor {
                return Err(LedgerError::Forbidden {
                    holder: holder.to_string(),
                });
            }

            let qty_pending = pending_for_task(tx.client(), task_id, task.qty_requested).await?;
            if quantity <= 0 || quantity > qty_pending {
                return Err(LedgerError::InvalidQuantity {
                    requested: quantity,
                    available: qty_pending,
                });
            }

            let now = warehouse_now().naive_local();

            let discount_id = insert_discount(
                tx.client(),
                Some(task_id),
                task.pallet_id,
                &task.client_key,
                quantity,
                actor,
                &now,
            )
            .await?;

            let task_completed = quantity == qty_pending;
            if task_completed {
                tx.client()
                    .execute(
                        r#"
                            UPDATE DiscountTasks
                            SET Status = 'COMPLETED', LockStatus = 'FREE',
                                LockHolder = NULL, LockDate = NULL
                            WHERE Id = @P1
                        "#,
                        &[&task_id],
                    )
                    .await
                    .map_err(|e| {
                        LedgerError::Transaction(format!("Failed to complete task: {e}"))
                    })?;
            } else {
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
                    .map_err(|e| {
                        LedgerError::Transaction(format!("Failed to release task lock: {e}"))
                    })?;
            }

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::Descuento,
                    pallet_id: Some(task.pallet_id),
                    task_id: Some(task_id),
                    discount_id: Some(discount_id),
                    client_key: &task.client_key,
                    qty: quantity,
                    aisle: Some(&task.aisle),
                    actor,
                },
                &now,
            )
            .await?;

            Ok(AppliedTaskDiscount {
                discount_id,
                qty_pending: qty_pending - quantity,
                task_completed,
            })
        }
        .await;

        match result {
            Ok(applied) => {
                tx.commit().await?;
                Ok(applied)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Apply a quantity directly against a pallet, bypassing the task flow.
    /// The pallet row lock makes the availability check race-free.
    pub async fn apply_direct(
        &self,
        pallet_id: i64,
        quantity: i64,
        actor: &str,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<i64, LedgerError> = async {
            let pallet = lock_pallet_for_update(tx.client(), pallet_id).await?;

            if quantity <= 0 || quantity > pallet.qty_available {
                return Err(LedgerError::InvalidQuantity {
                    requested: quantity,
                    available: pallet.qty_available,
                });
            }

            let now = warehouse_now().naive_local();

            let discount_id = insert_discount(
                tx.client(),
                None,
                pallet_id,
                &pallet.client_key,
                quantity,
                actor,
                &now,
            )
            .await?;

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::DescuentoDirecto,
                    pallet_id: Some(pallet_id),
                    task_id: None,
                    discount_id: Some(discount_id),
                    client_key: &pallet.client_key,
                    qty: quantity,
                    aisle: None,
                    actor,
                },
                &now,
            )
            .await?;

            Ok(discount_id)
        }
        .await;

        match result {
            Ok(discount_id) => {
                tx.commit().await?;
                Ok(discount_id)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// All discounts recorded against a pallet, newest first, task-linked
    /// and direct alike.
    pub async fn list_for_pallet(&self, pallet_id: i64) -> Result<Vec<Discount>, LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let exists = client
            .query(
                "SELECT Id FROM Pallets WITH (NOLOCK) WHERE Id = @P1",
                &[&pallet_id],
            )
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        if exists.is_none() {
            return Err(LedgerError::PalletNotFound { pallet_id });
        }

        let query = r#"
            SELECT Id, TaskId, PalletId, ClientKey, Qty, RecDate, RecUserId
            FROM Discounts WITH (NOLOCK)
            WHERE PalletId = @P1
            ORDER BY Id DESC
        "#;

        let rows = client
            .query(query, &[&pallet_id])
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let mut discounts = Vec::with_capacity(rows.len());
        for row in rows {
            discounts.push(Discount {
                id: row.get::<i64, _>("Id").unwrap_or(0),
                task_id: row.get::<i64, _>("TaskId"),
                pallet_id: row.get::<i64, _>("PalletId").unwrap_or(0),
                client_key: row.get::<&str, _>("ClientKey").unwrap_or("").to_string(),
                qty: row.get::<i64, _>("Qty").unwrap_or(0),
                rec_date: row
                    .get::<NaiveDateTime, _>("RecDate")
                    .unwrap_or_else(|| warehouse_now().naive_local()),
                rec_user_id: row.get::<&str, _>("RecUserId").unwrap_or("").to_string(),
            });
        }

        Ok(discounts)
    }
}

/// Pending amount of a task, computed on the caller's transactional client
/// after the task row has been locked.
async fn pending_for_task(
    client: &mut SqlClient,
    task_id: i64,
    qty_requested: i64,
) -> Result<i64, LedgerError> {
    let row = client
        .query(
            "SELECT COALESCE(SUM(Qty), 0) as QtyDiscounted FROM Discounts WHERE TaskId = @P1",
            &[&task_id],
        )
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

    let qty_discounted = row
        .map(|r| r.get::<i64, _>("QtyDiscounted").unwrap_or(0))
        .unwrap_or(0);

    Ok((qty_requested - qty_discounted).max(0))
}

async fn insert_discount(
    client: &mut SqlClient,
    task_id: Option<i64>,
    pallet_id: i64,
    client_key: &str,
    quantity: i64,
    actor: &str,
    now: &NaiveDateTime,
) -> Result<i64, LedgerError> {
    let query = r#"
        INSERT INTO Discounts (TaskId, PalletId, ClientKey, Qty, RecDate, RecUserId)
        OUTPUT INSERTED.Id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6)
    "#;

    let row = client
        .query(
            query,
            &[&task_id, &pallet_id, &client_key, &quantity, now, &actor],
        )
        .await
        .map_err(|e| LedgerError::Transaction(format!("Failed to insert discount: {e}")))?
        .into_row()
        .await
        .map_err(|e| LedgerError::Transaction(e.to_string()))?
        .ok_or_else(|| LedgerError::Transaction("Discount insert returned no id".to_string()))?;

    Ok(row.get::<i64, _>("Id").unwrap_or(0))
}
