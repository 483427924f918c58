//! The payout approval state machine.
//!
//! [`advance`] is a pure function over a payout and an approver role. It computes the next status, the updated
//! approval flags, and the audit lines to append, and reports whether this call crossed the readiness threshold.
//! It never touches storage; persisting the result (and the wallet debit that readiness triggers) is the backend's
//! job, inside a single unit of work.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{ApproverRole, PayoutId, PayoutRequest, PayoutStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Payout {0} is already finalized and cannot be modified")]
    AlreadyFinalized(PayoutId),
}

/// The outcome of advancing a payout through one approval.
#[derive(Debug, Clone)]
pub struct Advanced {
    /// The payout with its updated status and approval flags
    pub payout: PayoutRequest,
    /// Audit lines to append, in order
    pub audit: Vec<String>,
    /// True iff this call moved the payout into `ReadyForPayout`. The debit must happen exactly when this is true.
    pub became_ready: bool,
}

/// Records the approval of `role` on `payout` and applies the guarded status transitions.
///
/// * The approval flag for `role` is set. Setting it again is a no-op, so duplicate calls are safe.
/// * `Security` moves `PendingApproval` to `ApprovedSecurity`; `Finance` moves `ApprovedSecurity` to
///   `ApprovedFinance`. A finance approval recorded before the security gate sets the flag but leaves the status
///   where it is. `Admin` never drives a status edge on its own.
/// * After the flag update, if all three approvals are in place and the payout is still in an approval stage, the
///   status is forced to `ReadyForPayout` no matter which order the approvals arrived in.
///
/// Status never moves backward, and terminal payouts are rejected outright.
pub fn advance(mut payout: PayoutRequest, role: ApproverRole, at: DateTime<Utc>) -> Result<Advanced, WorkflowError> {
    if payout.status.is_terminal() {
        return Err(WorkflowError::AlreadyFinalized(payout.payout_id.clone()));
    }
    let mut audit = vec![format!("Approved by {role} at {}", at.to_rfc3339())];
    payout.approvals.record(role);
    let was_ready = payout.status == PayoutStatus::ReadyForPayout;
    match (role, payout.status) {
        (ApproverRole::Security, PayoutStatus::PendingApproval) => payout.status = PayoutStatus::ApprovedSecurity,
        (ApproverRole::Finance, PayoutStatus::ApprovedSecurity) => payout.status = PayoutStatus::ApprovedFinance,
        // Approvals recorded out of order, or past their edge, only set the flag
        _ => {},
    }
    // The unlock condition is checked on every call, so approvals arriving in any order still converge
    if payout.approvals.is_complete() && payout.status.is_awaiting_approval() {
        payout.status = PayoutStatus::ReadyForPayout;
        audit.push("All approvals received. Payout is ready for processing".to_string());
    }
    let became_ready = !was_ready && payout.status == PayoutStatus::ReadyForPayout;
    payout.updated_at = at;
    Ok(Advanced { payout, audit, became_ready })
}
