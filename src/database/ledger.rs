use chrono::NaiveDateTime;

use crate::database::movements::{insert_movement, NewMovement};
use crate::database::{Database, SqlClient};
use crate::models::{LedgerError, MovementKind, PalletSummary};
use crate::utils::warehouse_now;

/// Pallet row state read under an update lock, used by every operation that
/// checks availability before writing.
pub(crate) struct LockedPallet {
    pub client_key: String,
    pub qty_available: i64,
}

/// Lock the pallet row and recompute its availability inside the caller's
/// transaction. The UPDLOCK serializes concurrent writers against the same
/// pallet, so the value returned here stays valid until commit.
pub(crate) async fn lock_pallet_for_update(
    client: &mut SqlClient,
    pallet_id: i64,
) -> Result<LockedPallet, LedgerError> {
    let lock_query = r#"
        SELECT Id, ClientKey, QtyReceived
        FROM Pallets WITH (UPDLOCK, ROWLOCK)
        WHERE Id = @P1
    "#;

    let row = client
        .query(lock_query, &[&pallet_id])
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to lock pallet row: {e}")))?
        .into_row()
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or(LedgerError::PalletNotFound { pallet_id })?;

    let client_key = row.get::<&str, _>("ClientKey").unwrap_or("").to_string();
    let qty_received: i64 = row.get("QtyReceived").unwrap_or(0);

    let sums_query = r#"
        SELECT
            COALESCE((SELECT SUM(d.Qty) FROM Discounts d
                      WHERE d.PalletId = @P1 AND d.TaskId IS NULL), 0) as DirectDiscounted,
            COALESCE((SELECT SUM(t.QtyRequested) FROM DiscountTasks t
                      WHERE t.PalletId = @P1 AND t.Status <> 'CANCELLED'), 0) as ActiveRequested
    "#;

    let sums = client
        .query(sums_query, &[&pallet_id])
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or_else(|| LedgerError::Storage("Availability aggregation returned no row".to_string()))?;

    let direct_discounted: i64 = sums.get("DirectDiscounted").unwrap_or(0);
    let active_requested: i64 = sums.get("ActiveRequested").unwrap_or(0);

    // The derived invariant keeps this non-negative; clamp anyway so a
    // manually patched database never reports negative stock.
    let qty_available = (qty_received - direct_discounted - active_requested).max(0);

    Ok(LockedPallet {
        client_key,
        qty_available,
    })
}

pub struct LedgerDatabase {
    db: Database,
}

impl LedgerDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a pallet intake: insert the pallet and its INGRESO movement in
    /// one transaction.
    pub async fn record_intake(
        &self,
        client_key: &str,
        quantity: i64,
        actor: &str,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<i64, LedgerError> = async {
            let now = warehouse_now().naive_local();

            let insert_query = r#"
                INSERT INTO Pallets (ClientKey, QtyReceived, RecDate, RecUserId)
                OUTPUT INSERTED.Id
                VALUES (@P1, @P2, @P3, @P4)
            "#;

            let row = tx
                .client()
                .query(insert_query, &[&client_key, &quantity, &now, &actor])
                .await
                .map_err(|e| LedgerError::Transaction(format!("Failed to insert pallet: {e}")))?
                .into_row()
                .await
                .map_err(|e| LedgerError::Transaction(e.to_string()))?
                .ok_or_else(|| {
                    LedgerError::Transaction("Pallet insert returned no id".to_string())
                })?;

            let pallet_id: i64 = row.get("Id").unwrap_or(0);

            insert_movement(
                tx.client(),
                &NewMovement {
                    kind: MovementKind::Ingreso,
                    pallet_id: Some(pallet_id),
                    task_id: None,
                    discount_id: None,
                    client_key,
                    qty: quantity,
                    aisle: None,
                    actor,
                },
                &now,
            )
            .await?;

            Ok(pallet_id)
        }
        .await;

        match result {
            Ok(pallet_id) => {
                tx.commit().await?;
                Ok(pallet_id)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Current availability of a pallet. Read-only; callers that go on to
    /// write must recompute under `lock_pallet_for_update` instead.
    pub async fn availability(&self, pallet_id: i64) -> Result<i64, LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let query = r#"
            SELECT p.QtyReceived
                - COALESCE((SELECT SUM(d.Qty) FROM Discounts d
                            WHERE d.PalletId = p.Id AND d.TaskId IS NULL), 0)
                - COALESCE((SELECT SUM(t.QtyRequested) FROM DiscountTasks t
                            WHERE t.PalletId = p.Id AND t.Status <> 'CANCELLED'), 0)
                as QtyAvailable
            FROM Pallets p WITH (NOLOCK)
            WHERE p.Id = @P1
        "#;

        let row = client
            .query(query, &[&pallet_id])
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .ok_or(LedgerError::PalletNotFound { pallet_id })?;

        let qty_available: i64 = row.get("QtyAvailable").unwrap_or(0);
        Ok(qty_available.max(0))
    }

    /// List pallets with derived availability, newest first, paginated.
    pub async fn list_pallets(
        &self,
        page: i32,
        limit: i32,
    ) -> Result<(Vec<PalletSummary>, i32), LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let offset = (page - 1) * limit;

        let count_row = client
            .query(
                "SELECT COUNT(*) as total_count FROM Pallets WITH (NOLOCK)",
                &[],
            )
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let total_count = count_row
            .map(|row| row.get::<i32, _>("total_count").unwrap_or(0))
            .unwrap_or(0);

        let query = r#"
            SELECT p.Id, p.ClientKey, p.QtyReceived, p.RecDate, p.RecUserId,
                p.QtyReceived
                    - COALESCE((SELECT SUM(d.Qty) FROM Discounts d
                                WHERE d.PalletId = p.Id AND d.TaskId IS NULL), 0)
                    - COALESCE((SELECT SUM(t.QtyRequested) FROM DiscountTasks t
                                WHERE t.PalletId = p.Id AND t.Status <> 'CANCELLED'), 0)
                    as QtyAvailable
            FROM Pallets p WITH (NOLOCK)
            ORDER BY p.Id DESC
            OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY
        "#;

        let rows = client
            .query(query, &[&offset, &limit])
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let mut pallets = Vec::with_capacity(rows.len());
        for row in rows {
            pallets.push(PalletSummary {
                id: row.get::<i64, _>("Id").unwrap_or(0),
                client_key: row.get::<&str, _>("ClientKey").unwrap_or("").to_string(),
                qty_received: row.get::<i64, _>("QtyReceived").unwrap_or(0),
                qty_available: row.get::<i64, _>("QtyAvailable").unwrap_or(0).max(0),
                rec_date: row
                    .get::<NaiveDateTime, _>("RecDate")
                    .unwrap_or_else(|| warehouse_now().naive_local()),
                rec_user_id: row.get::<&str, _>("RecUserId").unwrap_or("").to_string(),
            });
        }

        Ok((pallets, total_count))
    }
}
