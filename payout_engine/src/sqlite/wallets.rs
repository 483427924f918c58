use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;
use vpc_common::Money;

use super::SqliteDatabaseError;
use crate::db_types::Wallet;

/// The result of an atomic balance-checked debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The full amount was removed from the wallet
    Debited,
    /// The balance could not cover the amount. Nothing was changed
    InsufficientFunds { available: Money },
    /// No wallet exists for the vendor
    NoWallet,
}

pub async fn fetch_wallet(vendor_id: &str, conn: &mut SqliteConnection) -> Result<Option<Wallet>, SqliteDatabaseError> {
    let wallet = sqlx::query_as(
        "SELECT id, vendor_id, balance, currency, created_at, updated_at FROM wallets WHERE vendor_id = ?",
    )
    .bind(vendor_id)
    .fetch_optional(conn)
    .await?;
    Ok(wallet)
}

/// Creates a wallet with a zero balance if the vendor does not have one yet. Existing wallets are left untouched,
/// including their currency.
pub async fn upsert_wallet(
    vendor_id: &str,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Wallet, SqliteDatabaseError> {
    let _ = sqlx::query(
        "INSERT INTO wallets (vendor_id, currency, created_at, updated_at) VALUES ($1, $2, $3, $3) \
         ON CONFLICT (vendor_id) DO NOTHING",
    )
    .bind(vendor_id)
    .bind(currency)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    fetch_wallet(vendor_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::QueryError(format!("Wallet for {vendor_id} missing after upsert")))
}

pub async fn credit(vendor_id: &str, amount: Money, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE wallets SET balance = balance + $1, updated_at = $2 WHERE vendor_id = $3")
        .bind(amount)
        .bind(Utc::now())
        .bind(vendor_id)
        .execute(conn)
        .await?;
    trace!("🏦️ Credited {amount} to wallet of {vendor_id}");
    Ok(result.rows_affected())
}

/// Removes `amount` from the vendor's wallet iff the balance covers it. The balance check and the decrement are a
/// single UPDATE statement, so no concurrent caller can observe or create a negative balance.
pub async fn debit(
    vendor_id: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<DebitOutcome, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE wallets SET balance = balance - $1, updated_at = $2 WHERE vendor_id = $3 AND balance >= $1",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(vendor_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        trace!("🏦️ Debited {amount} from wallet of {vendor_id}");
        return Ok(DebitOutcome::Debited);
    }
    // Zero rows: either the wallet is missing or the balance came up short
    match fetch_wallet(vendor_id, conn).await? {
        Some(wallet) => Ok(DebitOutcome::InsufficientFunds { available: wallet.balance }),
        None => Ok(DebitOutcome::NoWallet),
    }
}
