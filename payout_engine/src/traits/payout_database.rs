use thiserror::Error;
use vpc_common::Money;

use crate::{
    db_types::{ApproverRole, AuditEntry, NewPayout, PayoutId, PayoutRequest, PayoutStatus, Wallet},
    workflow::WorkflowError,
};

#[derive(Debug, Clone, Error)]
pub enum PayoutDbError {
    #[error("Payout {0} does not exist")]
    PayoutNotFound(PayoutId),
    #[error("No wallet exists for vendor {0}")]
    WalletNotFound(String),
    #[error("Payout {0} is already finalized and cannot be modified")]
    AlreadyFinalized(PayoutId),
    #[error("Insufficient funds: the payout needs {needed} but the wallet only holds {available}")]
    InsufficientFunds { needed: Money, available: Money },
    #[error("Payout amounts must be strictly positive, got {0}")]
    InvalidAmount(Money),
    #[error("Payout {payout_id} cannot move from {from} to {to}")]
    InvalidStatusChange { payout_id: PayoutId, from: PayoutStatus, to: PayoutStatus },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<WorkflowError> for PayoutDbError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::AlreadyFinalized(id) => PayoutDbError::AlreadyFinalized(id),
        }
    }
}

/// The highest level of behaviour for backends supporting the payout engine.
///
/// Every mutating method is one explicit unit of work: the backend begins a transaction, serialises access to the
/// payout row, applies the workflow, conditionally moves money, and commits or rolls back as a single scope. A
/// payout write and its wallet debit either both land or neither does.
#[allow(async_fn_in_trait)]
pub trait PayoutDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates a new payout request in `PendingApproval` with no approvals recorded, assigns its id, and seeds the
    /// audit trail with a creation entry. Fails with [`PayoutDbError::InvalidAmount`] for non-positive amounts.
    async fn create_payout(&self, payout: NewPayout) -> Result<PayoutRequest, PayoutDbError>;

    /// Records the approval of `role` on the payout and, when this call is the one that crosses the readiness
    /// threshold, debits the vendor's wallet in the same transaction.
    ///
    /// Failure modes:
    /// * [`PayoutDbError::PayoutNotFound`] if the payout does not exist.
    /// * [`PayoutDbError::AlreadyFinalized`] if the payout is `Completed` or `Rejected` (checked again inside the
    ///   transaction; a pre-lock read is not trusted).
    /// * [`PayoutDbError::InsufficientFunds`] if the wallet cannot cover the amount. The whole unit of work rolls
    ///   back and the payout is left exactly as it was before the call.
    ///
    /// Repeating the call once the payout is already `ReadyForPayout` records the flag idempotently and never
    /// debits again.
    async fn approve_payout(&self, payout_id: &PayoutId, role: ApproverRole) -> Result<PayoutRequest, PayoutDbError>;

    /// Rejects a payout that has not yet been handed to the transfer rail. If the wallet was already debited
    /// (status `ReadyForPayout`), the amount is refunded in the same transaction.
    ///
    /// Payouts in `Processing` cannot be rejected, and terminal payouts fail with
    /// [`PayoutDbError::AlreadyFinalized`].
    async fn reject_payout(
        &self,
        payout_id: &PayoutId,
        role: ApproverRole,
        reason: &str,
    ) -> Result<PayoutRequest, PayoutDbError>;

    /// Moves a payout from `ReadyForPayout` to `Processing` when the transfer is handed to the payment rail.
    /// Calling this on a payout that is already `Processing` is a no-op.
    async fn mark_processing(&self, payout_id: &PayoutId) -> Result<PayoutRequest, PayoutDbError>;

    /// Moves a payout from `Processing` to the terminal `Completed` status once the transfer has settled.
    async fn mark_completed(&self, payout_id: &PayoutId) -> Result<PayoutRequest, PayoutDbError>;

    /// Fetches a payout by its id, or `None` if it does not exist.
    async fn fetch_payout(&self, payout_id: &PayoutId) -> Result<Option<PayoutRequest>, PayoutDbError>;

    /// Returns the payout's audit trail in insertion order.
    async fn fetch_audit_log(&self, payout_id: &PayoutId) -> Result<Vec<AuditEntry>, PayoutDbError>;

    /// All payout requests for the given vendor, newest first.
    async fn fetch_payouts_for_vendor(&self, vendor_id: &str) -> Result<Vec<PayoutRequest>, PayoutDbError>;

    /// Creates a wallet for the vendor if one does not exist yet, and returns it. Existing wallets are untouched.
    async fn upsert_wallet(&self, vendor_id: &str, currency: &str) -> Result<Wallet, PayoutDbError>;

    /// Adds funds to the vendor's wallet and returns the updated record.
    async fn credit_wallet(&self, vendor_id: &str, amount: Money) -> Result<Wallet, PayoutDbError>;

    /// Fetches the wallet for the vendor, or `None` if it has not been provisioned.
    async fn fetch_wallet(&self, vendor_id: &str) -> Result<Option<Wallet>, PayoutDbError>;

    /// Closes the database connection
    async fn close(&mut self) -> Result<(), PayoutDbError>;
}
