use tracing::info;

use crate::database::discounts::DiscountDatabase;
use crate::database::ledger::LedgerDatabase;
use crate::database::movements::MovementDatabase;
use crate::database::reports::ReportDatabase;
use crate::database::tasks::TaskDatabase;
use crate::database::Database;
use crate::models::{
    AvailabilityResponse, ClaimOutcome, CreateTaskRequest, DirectDiscountRequest, Discount,
    DiscountResult, DiscountTask, IntakeRequest, IntakeResult, LedgerError, Movement,
    MovementFilter, PalletSummary, ReportSummary, TaskActionRequest, TaskDiscountRequest,
    TaskResult, TaskStatus,
};
use crate::utils::warehouse_now_rfc3339;

/// Orchestration layer between the HTTP handlers and the data access
/// modules. Input validation happens here, before any connection is taken;
/// the race-sensitive re-checks live inside the database transactions.
pub struct WarehouseService {
    ledger: LedgerDatabase,
    tasks: TaskDatabase,
    discounts: DiscountDatabase,
    movements: MovementDatabase,
    reports: ReportDatabase,
}

impl WarehouseService {
    pub fn new(db: Database) -> Self {
        Self {
            ledger: LedgerDatabase::new(db.clone()),
            tasks: TaskDatabase::new(db.clone()),
            discounts: DiscountDatabase::new(db.clone()),
            movements: MovementDatabase::new(db.clone()),
            reports: ReportDatabase::new(db),
        }
    }

    pub async fn record_intake(&self, request: IntakeRequest) -> Result<IntakeResult, LedgerError> {
        request.validate()?;

        let pallet_id = self
            .ledger
            .record_intake(
                request.client_key.trim(),
                request.quantity,
                request.user_id.trim(),
            )
            .await?;

        info!(
            pallet_id,
            client = %request.client_key.trim(),
            qty = request.quantity,
            "Pallet intake recorded"
        );

        Ok(IntakeResult {
            success: true,
            pallet_id,
            message: format!(
                "Intake of {} units recorded for {}",
                request.quantity,
                request.client_key.trim()
            ),
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn availability(&self, pallet_id: i64) -> Result<AvailabilityResponse, LedgerError> {
        let qty_available = self.ledger.availability(pallet_id).await?;
        Ok(AvailabilityResponse {
            pallet_id,
            qty_available,
        })
    }

    pub async fn list_pallets(
        &self,
        page: i32,
        limit: i32,
    ) -> Result<(Vec<PalletSummary>, i32), LedgerError> {
        self.ledger.list_pallets(page, limit).await
    }

    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<TaskResult, LedgerError> {
        request.validate()?;

        let task_id = self
            .tasks
            .create_task(
                request.pallet_id,
                request.client_key.trim(),
                request.quantity,
                request.aisle.trim(),
                request.priority.as_deref(),
                request.user_id.trim(),
            )
            .await?;

        info!(
            task_id,
            pallet_id = request.pallet_id,
            qty = request.quantity,
            aisle = %request.aisle.trim(),
            "Discount task created"
        );

        Ok(TaskResult {
            success: true,
            task_id,
            message: format!(
                "Task created for {} units in aisle {}",
                request.quantity,
                request.aisle.trim()
            ),
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn claim_task(
        &self,
        task_id: i64,
        request: TaskActionRequest,
    ) -> Result<TaskResult, LedgerError> {
        request.validate()?;
        let actor = request.user_id.trim();

        let outcome = self.tasks.claim_task(task_id, actor).await?;
        let message = match outcome {
            ClaimOutcome::Granted => {
                info!(task_id, actor, "Task claimed");
                format!("Task {task_id} claimed by {actor}")
            }
            ClaimOutcome::AlreadyHeld => format!("Task {task_id} already held by {actor}"),
        };

        Ok(TaskResult {
            success: true,
            task_id,
            message,
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn release_task(
        &self,
        task_id: i64,
        request: TaskActionRequest,
    ) -> Result<TaskResult, LedgerError> {
        request.validate()?;
        let actor = request.user_id.trim();

        self.tasks.release_task(task_id, actor).await?;
        info!(task_id, actor, "Task lock released");

        Ok(TaskResult {
            success: true,
            task_id,
            message: format!("Task {task_id} released"),
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn cancel_task(
        &self,
        task_id: i64,
        request: TaskActionRequest,
    ) -> Result<TaskResult, LedgerError> {
        request.validate()?;
        let actor = request.user_id.trim();

        self.tasks.cancel_task(task_id, actor).await?;
        info!(task_id, actor, "Task cancelled");

        Ok(TaskResult {
            success: true,
            task_id,
            message: format!("Task {task_id} cancelled"),
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn find_task(&self, task_id: i64) -> Result<DiscountTask, LedgerError> {
        self.tasks.find_task(task_id).await
    }

    pub async fn list_tasks(
        &self,
        status: Option<&str>,
        page: i32,
        limit: i32,
    ) -> Result<(Vec<DiscountTask>, i32), LedgerError> {
        let status = status
            .map(|code| {
                TaskStatus::parse(code).ok_or_else(|| {
                    LedgerError::Validation(format!("Unknown task status filter '{code}'"))
                })
            })
            .transpose()?;

        self.tasks.list_tasks(status, page, limit).await
    }

    pub async fn apply_task_discount(
        &self,
        task_id: i64,
        request: TaskDiscountRequest,
    ) -> Result<DiscountResult, LedgerError> {
        request.validate()?;
        let actor = request.user_id.trim();

        let applied = self
            .discounts
            .apply_to_task(task_id, request.quantity, actor)
            .await?;

        info!(
            task_id,
            discount_id = applied.discount_id,
            qty = request.quantity,
            completed = applied.task_completed,
            "Discount applied against task"
        );

        let message = if applied.task_completed {
            format!("Task {task_id} fully discounted and completed")
        } else {
            format!(
                "Partial discount applied, {} units still pending",
                applied.qty_pending
            )
        };

        Ok(DiscountResult {
            success: true,
            discount_id: applied.discount_id,
            qty_pending: Some(applied.qty_pending),
            task_completed: applied.task_completed,
            message,
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn apply_direct_discount(
        &self,
        pallet_id: i64,
        request: DirectDiscountRequest,
    ) -> Result<DiscountResult, LedgerError> {
        request.validate()?;
        let actor = request.user_id.trim();

        let discount_id = self
            .discounts
            .apply_direct(pallet_id, request.quantity, actor)
            .await?;

        info!(
            pallet_id,
            discount_id,
            qty = request.quantity,
            "Direct discount applied against pallet"
        );

        Ok(DiscountResult {
            success: true,
            discount_id,
            qty_pending: None,
            task_completed: false,
            message: format!(
                "Direct discount of {} units applied to pallet {pallet_id}",
                request.quantity
            ),
            timestamp: warehouse_now_rfc3339(),
        })
    }

    pub async fn list_pallet_discounts(
        &self,
        pallet_id: i64,
    ) -> Result<Vec<Discount>, LedgerError> {
        self.discounts.list_for_pallet(pallet_id).await
    }

    pub async fn query_movements(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<Movement>, LedgerError> {
        self.movements.query_movements(filter).await
    }

    pub async fn purge_all(&self) -> Result<(u64, u64, u64, u64), LedgerError> {
        let counts = self.movements.purge_all().await?;
        info!(
            movements = counts.0,
            discounts = counts.1,
            tasks = counts.2,
            pallets = counts.3,
            "Administrative purge completed"
        );
        Ok(counts)
    }

    pub async fn report_summary(&self) -> Result<ReportSummary, LedgerError> {
        self.reports.summary().await
    }
}
