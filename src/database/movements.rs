use chrono::NaiveDateTime;

use crate::database::{Database, SqlClient};
use crate::models::{LedgerError, Movement, MovementFilter, MovementKind};
use crate::utils::warehouse_now;

/// Movement to be appended. Written only as the final step inside the same
/// transaction as the state change it documents.
pub(crate) struct NewMovement<'a> {
    pub kind: MovementKind,
    pub pallet_id: Option<i64>,
    pub task_id: Option<i64>,
    pub discount_id: Option<i64>,
    pub client_key: &'a str,
    pub qty: i64,
    pub aisle: Option<&'a str>,
    pub actor: &'a str,
}

/// Append one audit entry on the caller's transactional client. Never
/// retried independently; a failure here rolls back the whole operation.
pub(crate) async fn insert_movement(
    client: &mut SqlClient,
    movement: &NewMovement<'_>,
    now: &NaiveDateTime,
) -> Result<i64, LedgerError> {
    let query = r#"
        INSERT INTO Movements (
            Kind, PalletId, TaskId, DiscountId,
            ClientKey, Qty, Aisle, RecDate, RecUserId
        ) OUTPUT INSERTED.Id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)
    "#;

    let kind = movement.kind.as_str();
    let result = client
        .query(
            query,
            &[
                &kind,
                &movement.pallet_id,
                &movement.task_id,
                &movement.discount_id,
                &movement.client_key,
                &movement.qty,
                &movement.aisle,
                now,
                &movement.actor,
            ],
        )
        .await
        .map_err(|e| LedgerError::Transaction(format!("Failed to append movement: {e}")))?;

    if let Some(row) = result
        .into_row()
        .await
        .map_err(|e| LedgerError::Transaction(e.to_string()))?
    {
        Ok(row.get::<i64, _>("Id").unwrap_or(0))
    } else {
        Err(LedgerError::Transaction(
            "Movement insert returned no id".to_string(),
        ))
    }
}

pub struct MovementDatabase {
    db: Database,
}

impl MovementDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Query the movement log, newest first, optionally bounded by an
    /// inclusive calendar-day window.
    pub async fn query_movements(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<Movement>, LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let lower = filter.lower_bound();
        let upper = filter.upper_bound();

        const SELECT_COLUMNS: &str = r#"
            SELECT Id, Kind, PalletId, TaskId, DiscountId,
                   ClientKey, Qty, Aisle, RecDate, RecUserId
            FROM Movements WITH (NOLOCK)
        "#;

        let results = match (lower, upper) {
            (Some(from), Some(to)) => {
                let query = format!(
                    "{SELECT_COLUMNS} WHERE RecDate >= @P1 AND RecDate < @P2 ORDER BY RecDate DESC, Id DESC"
                );
                client.query(query.as_str(), &[&from, &to]).await
            }
            (Some(from), None) => {
                let query =
                    format!("{SELECT_COLUMNS} WHERE RecDate >= @P1 ORDER BY RecDate DESC, Id DESC");
                client.query(query.as_str(), &[&from]).await
            }
            (None, Some(to)) => {
                let query =
                    format!("{SELECT_COLUMNS} WHERE RecDate < @P1 ORDER BY RecDate DESC, Id DESC");
                client.query(query.as_str(), &[&to]).await
            }
            (None, None) => {
                let query = format!("{SELECT_COLUMNS} ORDER BY RecDate DESC, Id DESC");
                client.query(query.as_str(), &[]).await
            }
        };

        let rows = results
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            movements.push(movement_from_row(&row)?);
        }

        Ok(movements)
    }

    /// Administrative bulk clear: purges movements, discounts, tasks and
    /// pallets in one transaction. Returns the number of rows deleted per
    /// table in that order.
    pub async fn purge_all(&self) -> Result<(u64, u64, u64, u64), LedgerError> {
        let mut tx = self.db.begin().await?;

        let result: Result<(u64, u64, u64, u64), LedgerError> = async {
            // FK order: movements and discounts reference tasks and pallets,
            // tasks reference pallets.
            let movements = exec_delete(tx.client(), "DELETE FROM Movements").await?;
            let discounts = exec_delete(tx.client(), "DELETE FROM Discounts").await?;
            let tasks = exec_delete(tx.client(), "DELETE FROM DiscountTasks").await?;
            let pallets = exec_delete(tx.client(), "DELETE FROM Pallets").await?;
            Ok((movements, discounts, tasks, pallets))
        }
        .await;

        match result {
            Ok(counts) => {
                tx.commit().await?;
                Ok(counts)
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Most recent intake-or-discount movement, used by the report facade
    /// for the "last action" display.
    pub async fn last_intake_or_discount(&self) -> Result<Option<Movement>, LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let query = r#"
            SELECT TOP 1 Id, Kind, PalletId, TaskId, DiscountId,
                   ClientKey, Qty, Aisle, RecDate, RecUserId
            FROM Movements WITH (NOLOCK)
            WHERE Kind IN ('INGRESO', 'DESCUENTO', 'DESCUENTO_DIRECTO')
            ORDER BY RecDate DESC, Id DESC
        "#;

        let row = client
            .query(query, &[])
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(movement_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

async fn exec_delete(client: &mut SqlClient, query: &str) -> Result<u64, LedgerError> {
    let result = client
        .execute(query, &[])
        .await
        .map_err(|e| LedgerError::Transaction(format!("Bulk clear failed: {e}")))?;
    Ok(result.total())
}

fn movement_from_row(row: &tiberius::Row) -> Result<Movement, LedgerError> {
    let kind_code = row.get::<&str, _>("Kind").unwrap_or("");
    let kind = MovementKind::parse(kind_code).ok_or_else(|| {
        LedgerError::Storage(format!("Unknown movement kind '{kind_code}' in log"))
    })?;

    Ok(Movement {
        id: row.get::<i64, _>("Id").unwrap_or(0),
        kind,
        pallet_id: row.get::<i64, _>("PalletId"),
        task_id: row.get::<i64, _>("TaskId"),
        discount_id: row.get::<i64, _>("DiscountId"),
        client_key: row.get::<&str, _>("ClientKey").unwrap_or("").to_string(),
        qty: row.get::<i64, _>("Qty").unwrap_or(0),
        aisle: row.get::<&str, _>("Aisle").map(|s| s.to_string()),
        rec_date: row
            .get::<NaiveDateTime, _>("RecDate")
            .unwrap_or_else(|| warehouse_now().naive_local()),
        rec_user_id: row.get::<&str, _>("RecUserId").unwrap_or("").to_string(),
    })
}
