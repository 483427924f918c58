use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use super::SqliteDatabaseError;
use crate::db_types::{AuditEntry, NewPayout, PayoutId, PayoutRequest};

/// Inserts a new payout row in `PendingApproval` with no approvals recorded.
pub async fn insert_payout(
    payout: &NewPayout,
    payout_id: &PayoutId,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        r#"INSERT INTO payouts (payout_id, vendor_id, amount, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $4)"#,
    )
    .bind(payout_id)
    .bind(&payout.vendor_id)
    .bind(payout.amount)
    .bind(Utc::now())
    .execute(conn)
    .await;
    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SqliteDatabaseError::DuplicatePayout(payout_id.clone()))
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_payout(
    payout_id: &PayoutId,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRequest>, SqliteDatabaseError> {
    let payout = sqlx::query_as(
        r#"SELECT id, payout_id, vendor_id, amount, status,
                  security_approved, finance_approved, admin_approved,
                  created_at, updated_at
           FROM payouts WHERE payout_id = ?"#,
    )
    .bind(payout_id)
    .fetch_optional(conn)
    .await?;
    Ok(payout)
}

pub async fn fetch_payouts_for_vendor(
    vendor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutRequest>, SqliteDatabaseError> {
    let payouts = sqlx::query_as(
        r#"SELECT id, payout_id, vendor_id, amount, status,
                  security_approved, finance_approved, admin_approved,
                  created_at, updated_at
           FROM payouts WHERE vendor_id = ? ORDER BY id DESC"#,
    )
    .bind(vendor_id)
    .fetch_all(conn)
    .await?;
    Ok(payouts)
}

/// Persists the mutable portion of a payout: status, approval flags, and the updated timestamp.
/// `vendor_id` and `amount` are immutable and deliberately excluded from the statement.
pub async fn update_payout(payout: &PayoutRequest, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    trace!("🗃️ Persisting payout {}: status {}", payout.payout_id, payout.status);
    let _ = sqlx::query(
        r#"UPDATE payouts SET
               status = $1,
               security_approved = $2,
               finance_approved = $3,
               admin_approved = $4,
               updated_at = $5
           WHERE payout_id = $6"#,
    )
    .bind(payout.status)
    .bind(payout.approvals.security)
    .bind(payout.approvals.finance)
    .bind(payout.approvals.admin)
    .bind(payout.updated_at)
    .bind(&payout.payout_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Appends one line to the payout's audit trail. The table is append-only; nothing ever updates or deletes rows.
pub async fn append_audit(
    payout_id: &PayoutId,
    entry: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("INSERT INTO payout_audit_log (payout_id, entry, created_at) VALUES ($1, $2, $3)")
        .bind(payout_id)
        .bind(entry)
        .bind(at)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn audit_log(
    payout_id: &PayoutId,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, SqliteDatabaseError> {
    let entries = sqlx::query_as(
        "SELECT id, payout_id, created_at, entry FROM payout_audit_log WHERE payout_id = ? ORDER BY id",
    )
    .bind(payout_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
