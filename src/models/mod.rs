pub mod discount;
pub mod error;
pub mod movement;
pub mod pallet;
pub mod report;
pub mod task;

pub use discount::{Discount, DirectDiscountRequest, DiscountResult, TaskDiscountRequest};
pub use error::LedgerError;
pub use movement::{Movement, MovementFilter, MovementKind};
pub use pallet::{AvailabilityResponse, IntakeRequest, IntakeResult, PalletSummary};
pub use report::{LastAction, RawTotals, ReportSummary};
pub use task::{
    evaluate_cancel, evaluate_claim, evaluate_release, ClaimOutcome, CreateTaskRequest,
    DiscountTask, LockStatus, TaskActionRequest, TaskResult, TaskStatus,
};
