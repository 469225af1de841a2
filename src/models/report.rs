use serde::Serialize;

use crate::models::movement::Movement;

/// Raw aggregates read from the store in a single query. KPI math is kept
/// out of SQL so it can be unit tested.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawTotals {
    pub total_received: i64,
    pub direct_discounted: i64,
    /// Sum of requested quantities over tasks that are not cancelled.
    pub active_requested: i64,
    /// Sum of discounts applied against completed tasks.
    pub completed_discounted: i64,
    pub cancelled_requested: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub pending_total: i64,
    pub processed_total: i64,
    pub cancelled_total: i64,
    pub last_action: Option<LastAction>,
}

#[derive(Debug, Serialize)]
pub struct LastAction {
    pub kind: String,
    pub client_key: String,
    pub qty: i64,
    pub rec_date: String,
    pub description: String,
}

impl ReportSummary {
    /// `pending_total` equals the sum of per-pallet availability: completed
    /// tasks stay counted in `active_requested`, which is exactly the stock
    /// they consumed.
    pub fn from_totals(totals: RawTotals, last_movement: Option<&Movement>) -> Self {
        ReportSummary {
            pending_total: totals.total_received
                - totals.direct_discounted
                - totals.active_requested,
            processed_total: totals.direct_discounted + totals.completed_discounted,
            cancelled_total: totals.cancelled_requested,
            last_action: last_movement.map(LastAction::from_movement),
        }
    }
}

impl LastAction {
    fn from_movement(movement: &Movement) -> Self {
        LastAction {
            kind: movement.kind.as_str().to_string(),
            client_key: movement.client_key.clone(),
            qty: movement.qty,
            rec_date: movement.rec_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            description: format!(
                "{} de {} unidades para {}",
                movement.kind.as_str(),
                movement.qty,
                movement.client_key
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::movement::MovementKind;
    use chrono::NaiveDate;

    fn movement(kind: MovementKind, qty: i64) -> Movement {
        Movement {
            id: 1,
            kind,
            pallet_id: Some(1),
            task_id: None,
            discount_id: None,
            client_key: "ClientA".to_string(),
            qty,
            aisle: None,
            rec_date: NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            rec_user_id: "mgarcia".to_string(),
        }
    }

    #[test]
    fn summary_while_task_in_flight() {
        // Intake 200, direct discount 50, one pending task for 100 with a
        // partial discount of 60 already applied against it.
        let totals = RawTotals {
            total_received: 200,
            direct_discounted: 50,
            active_requested: 100,
            completed_discounted: 0,
            cancelled_requested: 0,
        };
        let summary = ReportSummary::from_totals(totals, None);
        assert_eq!(summary.pending_total, 50);
        assert_eq!(summary.processed_total, 50);
        assert_eq!(summary.cancelled_total, 0);
        assert!(summary.last_action.is_none());
    }

    #[test]
    fn summary_after_task_completion() {
        // The task above fully discounted: its 100 stays in active_requested
        // and its discounts now count as processed.
        let totals = RawTotals {
            total_received: 200,
            direct_discounted: 50,
            active_requested: 100,
            completed_discounted: 100,
            cancelled_requested: 0,
        };
        let summary = ReportSummary::from_totals(totals, None);
        assert_eq!(summary.pending_total, 50);
        assert_eq!(summary.processed_total, 150);
    }

    #[test]
    fn cancelled_tasks_return_stock_and_report_separately() {
        let totals = RawTotals {
            total_received: 100,
            direct_discounted: 0,
            active_requested: 0,
            completed_discounted: 0,
            cancelled_requested: 40,
        };
        let summary = ReportSummary::from_totals(totals, None);
        assert_eq!(summary.pending_total, 100);
        assert_eq!(summary.cancelled_total, 40);
    }

    #[test]
    fn last_action_is_formatted_for_display() {
        let m = movement(MovementKind::DescuentoDirecto, 25);
        let summary = ReportSummary::from_totals(RawTotals::default(), Some(&m));
        let action = summary.last_action.unwrap();
        assert_eq!(action.kind, "DESCUENTO_DIRECTO");
        assert_eq!(action.rec_date, "2025-03-10 14:30:00");
        assert!(action.description.contains("25"));
        assert!(action.description.contains("ClientA"));
    }
}
