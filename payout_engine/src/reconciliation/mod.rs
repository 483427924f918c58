//! Three-way settlement reconciliation.
//!
//! Reconciliation verifies, after the fact, that money moved the way the order records claim it did: every internal
//! order must line up with one payment gateway record, which in turn must line up with one bank statement line. It
//! is a pure verification pass over three read-only data streams; it never mutates payouts or wallets, and a
//! mismatch is a reportable business event, not a fault.

mod batch;
mod matcher;
mod records;

pub use batch::{BatchFailure, BatchReport, InMemorySource, ReconciliationApi, SettlementSource};
pub use matcher::{reconcile, MismatchReason};
pub use records::{BankStatement, BankStatus, GatewayRecord, GatewayStatus, SettledOrder};
