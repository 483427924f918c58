use std::{fmt::Debug, sync::Arc};

use log::*;
use vpc_common::Money;

use crate::{
    db_types::{ApproverRole, AuditEntry, NewPayout, PayoutId, PayoutRequest, Wallet},
    ppe_api::{
        errors::PayoutApiError,
        permissions::{Capability, PermissionCheck},
    },
    traits::PayoutDatabase,
};

/// `PayoutApi` is the primary entry point for the payout approval flow.
///
/// It wraps a [`PayoutDatabase`] backend and gates the mutating calls behind the injected [`PermissionCheck`]. The
/// actual state machine and the atomicity of the debit live in the backend; this layer decides who may trigger them.
pub struct PayoutApi<B> {
    db: B,
    permissions: Arc<dyn PermissionCheck>,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, permissions: Arc<dyn PermissionCheck>) -> Self {
        Self { db, permissions }
    }

    fn check(&self, role: ApproverRole, capability: Capability) -> Result<(), PayoutApiError> {
        if self.permissions.can_approve(role, capability) {
            Ok(())
        } else {
            warn!("🔐️ {role} attempted to {capability} without permission");
            Err(PayoutApiError::Forbidden { role, capability })
        }
    }
}

impl<B> PayoutApi<B>
where B: PayoutDatabase
{
    /// Submits a new payout request. The engine assigns the id, seeds the audit trail, and starts the payout in
    /// `PendingApproval` with no approvals recorded.
    pub async fn create_payout(&self, payout: NewPayout) -> Result<PayoutRequest, PayoutApiError> {
        let created = self.db.create_payout(payout).await?;
        Ok(created)
    }

    /// Records the approval of `role` on the payout. When this approval is the one that completes the set, the
    /// vendor's wallet is debited atomically with the status change; see [`PayoutDatabase::approve_payout`].
    pub async fn approve_payout(
        &self,
        payout_id: &PayoutId,
        role: ApproverRole,
    ) -> Result<PayoutRequest, PayoutApiError> {
        self.check(role, Capability::ApprovePayout)?;
        let payout = self.db.approve_payout(payout_id, role).await?;
        Ok(payout)
    }

    /// Rejects the payout, refunding the wallet if the funds were already reserved.
    pub async fn reject_payout(
        &self,
        payout_id: &PayoutId,
        role: ApproverRole,
        reason: &str,
    ) -> Result<PayoutRequest, PayoutApiError> {
        self.check(role, Capability::RejectPayout)?;
        let payout = self.db.reject_payout(payout_id, role, reason).await?;
        Ok(payout)
    }

    /// Marks a ready payout as handed over to the payment rail.
    pub async fn mark_processing(&self, payout_id: &PayoutId) -> Result<PayoutRequest, PayoutApiError> {
        let payout = self.db.mark_processing(payout_id).await?;
        Ok(payout)
    }

    /// Marks an in-flight payout as settled.
    pub async fn mark_completed(&self, payout_id: &PayoutId) -> Result<PayoutRequest, PayoutApiError> {
        let payout = self.db.mark_completed(payout_id).await?;
        Ok(payout)
    }

    /// Fetches the payout with the given id. If no payout exists, `None` is returned.
    pub async fn payout_by_id(&self, payout_id: &PayoutId) -> Result<Option<PayoutRequest>, PayoutApiError> {
        let payout = self.db.fetch_payout(payout_id).await?;
        Ok(payout)
    }

    /// The payout's audit trail, oldest entry first.
    pub async fn audit_log(&self, payout_id: &PayoutId) -> Result<Vec<AuditEntry>, PayoutApiError> {
        let entries = self.db.fetch_audit_log(payout_id).await?;
        Ok(entries)
    }

    /// All payout requests for the given vendor, newest first.
    pub async fn payouts_for_vendor(&self, vendor_id: &str) -> Result<Vec<PayoutRequest>, PayoutApiError> {
        let payouts = self.db.fetch_payouts_for_vendor(vendor_id).await?;
        Ok(payouts)
    }

    /// Provisions a wallet for the vendor if it does not exist yet.
    pub async fn upsert_wallet(&self, vendor_id: &str, currency: &str) -> Result<Wallet, PayoutApiError> {
        let wallet = self.db.upsert_wallet(vendor_id, currency).await?;
        Ok(wallet)
    }

    /// Adds funds to the vendor's wallet.
    pub async fn credit_wallet(&self, vendor_id: &str, amount: Money) -> Result<Wallet, PayoutApiError> {
        let wallet = self.db.credit_wallet(vendor_id, amount).await?;
        Ok(wallet)
    }

    /// Fetches the vendor's wallet, or `None` if it has not been provisioned.
    pub async fn wallet_for_vendor(&self, vendor_id: &str) -> Result<Option<Wallet>, PayoutApiError> {
        let wallet = self.db.fetch_wallet(vendor_id).await?;
        Ok(wallet)
    }
}
