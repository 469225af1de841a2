use crate::database::movements::MovementDatabase;
use crate::database::Database;
use crate::models::{LedgerError, RawTotals, ReportSummary};

pub struct ReportDatabase {
    db: Database,
}

impl ReportDatabase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Derive the KPI summary. Read-only; the aggregates come back in a
    /// single round trip and the arithmetic lives in `ReportSummary`.
    pub async fn summary(&self) -> Result<ReportSummary, LedgerError> {
        let mut client = self
            .db
            .get_client()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let query = r#"
            SELECT
                COALESCE((SELECT SUM(QtyReceived) FROM Pallets WITH (NOLOCK)), 0)
                    as TotalReceived,
                COALESCE((SELECT SUM(Qty) FROM Discounts WITH (NOLOCK)
                          WHERE TaskId IS NULL), 0)
                    as DirectDiscounted,
                COALESCE((SELECT SUM(QtyRequested) FROM DiscountTasks WITH (NOLOCK)
                          WHERE Status <> 'CANCELLED'), 0)
                    as ActiveRequested,
                COALESCE((SELECT SUM(d.Qty)
                          FROM Discounts d WITH (NOLOCK)
                          JOIN DiscountTasks t WITH (NOLOCK) ON d.TaskId = t.Id
                          WHERE t.Status = 'COMPLETED'), 0)
                    as CompletedDiscounted,
                COALESCE((SELECT SUM(QtyRequested) FROM DiscountTasks WITH (NOLOCK)
                          WHERE Status = 'CANCELLED'), 0)
                    as CancelledRequested
        "#;

        let row = client
            .query(query, &[])
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .ok_or_else(|| LedgerError::Storage("KPI aggregation returned no row".to_string()))?;

        let totals = RawTotals {
            total_received: row.get::<i64, _>("TotalReceived").unwrap_or(0),
            direct_discounted: row.get::<i64, _>("DirectDiscounted").unwrap_or(0),
            active_requested: row.get::<i64, _>("ActiveRequested").unwrap_or(0),
            completed_discounted: row.get::<i64, _>("CompletedDiscounted").unwrap_or(0),
            cancelled_requested: row.get::<i64, _>("CancelledRequested").unwrap_or(0),
        };
        drop(client);

        let last_movement = MovementDatabase::new(self.db.clone())
            .last_intake_or_discount()
            .await?;

        Ok(ReportSummary::from_totals(totals, last_movement.as_ref()))
    }
}
