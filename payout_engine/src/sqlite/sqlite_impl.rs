//! `SqliteDatabase` is a concrete implementation of the payout engine backend.
//!
//! Every mutating method is one explicit unit of work: a single sqlx transaction that loads the payout, applies the
//! workflow, conditionally moves wallet funds, and commits or rolls back as a whole. All writes run on a dedicated
//! single-connection pool, so concurrent units of work on the same payout queue up behind each other at connection
//! acquisition rather than racing to upgrade a deferred transaction and failing with `SQLITE_BUSY`. Reads use a
//! separate multi-connection pool and never block behind a writer.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::SqlitePool;
use vpc_common::Money;

use super::{
    db::{db_url, new_pool},
    payouts,
    wallets,
    wallets::DebitOutcome,
    SqliteDatabaseError,
};
use crate::{
    db_types::{ApproverRole, AuditEntry, NewPayout, PayoutId, PayoutRequest, PayoutStatus, Wallet},
    traits::{PayoutDatabase, PayoutDbError},
    workflow,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    write_pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PayoutDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_payout(&self, payout: NewPayout) -> Result<PayoutRequest, PayoutDbError> {
        if !payout.amount.is_positive() {
            return Err(PayoutDbError::InvalidAmount(payout.amount));
        }
        let payout_id = PayoutId::random();
        let mut tx = self.write_pool.begin().await.map_err(SqliteDatabaseError::from)?;
        payouts::insert_payout(&payout, &payout_id, &mut tx).await?;
        let entry = format!("Payout request created for vendor {}: {}", payout.vendor_id, payout.amount);
        payouts::append_audit(&payout_id, &entry, Utc::now(), &mut tx).await?;
        let created = payouts::fetch_payout(&payout_id, &mut tx)
            .await?
            .ok_or_else(|| PayoutDbError::PayoutNotFound(payout_id.clone()))?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!("🗃️ Payout {payout_id} created for vendor {} ({})", created.vendor_id, created.amount);
        Ok(created)
    }

    /// Records an approval and, when the approval completes the set, debits the vendor's wallet.
    ///
    /// The payout load, the workflow result, the debit, and the audit entries are one transaction. If the debit
    /// fails, everything rolls back and the payout keeps its pre-call status and flags.
    async fn approve_payout(&self, payout_id: &PayoutId, role: ApproverRole) -> Result<PayoutRequest, PayoutDbError> {
        let mut tx = self.write_pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| PayoutDbError::PayoutNotFound(payout_id.clone()))?;
        let advanced = workflow::advance(payout, role, Utc::now())?;
        let payout = advanced.payout;
        let mut debit_entry = None;
        if advanced.became_ready {
            match wallets::debit(&payout.vendor_id, payout.amount, &mut tx).await? {
                DebitOutcome::Debited => {
                    debit_entry = Some(format!("Wallet debited by {}", payout.amount));
                },
                DebitOutcome::InsufficientFunds { available } => {
                    // The single most important invariant in this module: a payout must never be marked ready while
                    // the debit failed. Roll the whole unit of work back, including the approval flag.
                    tx.rollback().await.map_err(SqliteDatabaseError::from)?;
                    info!(
                        "🗃️ Payout {payout_id} needs {} but vendor {} only has {available}. Approval rolled back",
                        payout.amount, payout.vendor_id
                    );
                    return Err(PayoutDbError::InsufficientFunds { needed: payout.amount, available });
                },
                DebitOutcome::NoWallet => {
                    tx.rollback().await.map_err(SqliteDatabaseError::from)?;
                    return Err(PayoutDbError::WalletNotFound(payout.vendor_id));
                },
            }
        }
        payouts::update_payout(&payout, &mut tx).await?;
        // The trail must read approval, then readiness, then the debit that readiness triggered
        for entry in &advanced.audit {
            payouts::append_audit(payout_id, entry, payout.updated_at, &mut tx).await?;
        }
        if let Some(entry) = &debit_entry {
            payouts::append_audit(payout_id, entry, Utc::now(), &mut tx).await?;
        }
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!("🗃️ Payout {payout_id} approved by {role}. Status is now {}", payout.status);
        Ok(payout)
    }

    async fn reject_payout(
        &self,
        payout_id: &PayoutId,
        role: ApproverRole,
        reason: &str,
    ) -> Result<PayoutRequest, PayoutDbError> {
        let mut tx = self.write_pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let mut payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| PayoutDbError::PayoutNotFound(payout_id.clone()))?;
        if payout.status.is_terminal() {
            return Err(PayoutDbError::AlreadyFinalized(payout_id.clone()));
        }
        if payout.status == PayoutStatus::Processing {
            // The transfer is already in flight; rejecting now would desync us from the payment rail
            return Err(PayoutDbError::InvalidStatusChange {
                payout_id: payout_id.clone(),
                from: payout.status,
                to: PayoutStatus::Rejected,
            });
        }
        let was_debited = payout.status == PayoutStatus::ReadyForPayout;
        payout.status = PayoutStatus::Rejected;
        payout.updated_at = Utc::now();
        payouts::update_payout(&payout, &mut tx).await?;
        payouts::append_audit(payout_id, &format!("Rejected by {role}: {reason}"), payout.updated_at, &mut tx).await?;
        if was_debited {
            let rows = wallets::credit(&payout.vendor_id, payout.amount, &mut tx).await?;
            if rows == 0 {
                tx.rollback().await.map_err(SqliteDatabaseError::from)?;
                return Err(PayoutDbError::WalletNotFound(payout.vendor_id));
            }
            let entry = format!("Wallet refunded {} after rejection", payout.amount);
            payouts::append_audit(payout_id, &entry, Utc::now(), &mut tx).await?;
        }
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        info!("🗃️ Payout {payout_id} rejected by {role}: {reason}");
        Ok(payout)
    }

    async fn mark_processing(&self, payout_id: &PayoutId) -> Result<PayoutRequest, PayoutDbError> {
        self.transition(payout_id, PayoutStatus::ReadyForPayout, PayoutStatus::Processing, "Payout processing started")
            .await
    }

    async fn mark_completed(&self, payout_id: &PayoutId) -> Result<PayoutRequest, PayoutDbError> {
        self.transition(payout_id, PayoutStatus::Processing, PayoutStatus::Completed, "Payout completed").await
    }

    async fn fetch_payout(&self, payout_id: &PayoutId) -> Result<Option<PayoutRequest>, PayoutDbError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let payout = payouts::fetch_payout(payout_id, &mut conn).await?;
        Ok(payout)
    }

    async fn fetch_audit_log(&self, payout_id: &PayoutId) -> Result<Vec<AuditEntry>, PayoutDbError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let entries = payouts::audit_log(payout_id, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_payouts_for_vendor(&self, vendor_id: &str) -> Result<Vec<PayoutRequest>, PayoutDbError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let payouts = payouts::fetch_payouts_for_vendor(vendor_id, &mut conn).await?;
        Ok(payouts)
    }

    async fn upsert_wallet(&self, vendor_id: &str, currency: &str) -> Result<Wallet, PayoutDbError> {
        let mut conn = self.write_pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let wallet = wallets::upsert_wallet(vendor_id, currency, &mut conn).await?;
        Ok(wallet)
    }

    async fn credit_wallet(&self, vendor_id: &str, amount: Money) -> Result<Wallet, PayoutDbError> {
        if !amount.is_positive() {
            return Err(PayoutDbError::InvalidAmount(amount));
        }
        let mut tx = self.write_pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let rows = wallets::credit(vendor_id, amount, &mut tx).await?;
        if rows == 0 {
            return Err(PayoutDbError::WalletNotFound(vendor_id.to_string()));
        }
        let wallet = wallets::fetch_wallet(vendor_id, &mut tx)
            .await?
            .ok_or_else(|| PayoutDbError::WalletNotFound(vendor_id.to_string()))?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(wallet)
    }

    async fn fetch_wallet(&self, vendor_id: &str) -> Result<Option<Wallet>, PayoutDbError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let wallet = wallets::fetch_wallet(vendor_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn close(&mut self) -> Result<(), PayoutDbError> {
        self.write_pool.close().await;
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        // One connection for every mutating unit of work. Writers queue here instead of contending in SQLite.
        let write_pool = new_pool(url, 1).await?;
        let url = url.to_string();
        Ok(Self { url, pool, write_pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A guarded status edge shared by the post-readiness transitions. Re-applying the current target status is a
    /// no-op; any other source status is an error.
    async fn transition(
        &self,
        payout_id: &PayoutId,
        from: PayoutStatus,
        to: PayoutStatus,
        entry: &str,
    ) -> Result<PayoutRequest, PayoutDbError> {
        let mut tx = self.write_pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let mut payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| PayoutDbError::PayoutNotFound(payout_id.clone()))?;
        if payout.status == to {
            debug!("🗃️ Payout {payout_id} already has status {to}. No action to take");
            return Ok(payout);
        }
        if payout.status.is_terminal() {
            return Err(PayoutDbError::AlreadyFinalized(payout_id.clone()));
        }
        if payout.status != from {
            return Err(PayoutDbError::InvalidStatusChange { payout_id: payout_id.clone(), from: payout.status, to });
        }
        payout.status = to;
        payout.updated_at = Utc::now();
        payouts::update_payout(&payout, &mut tx).await?;
        payouts::append_audit(payout_id, entry, payout.updated_at, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!("🗃️ Payout {payout_id} moved from {from} to {to}");
        Ok(payout)
    }
}
