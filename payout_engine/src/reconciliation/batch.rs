use std::{collections::HashMap, fmt::Display, time::Duration};

use log::{debug, info};
use tokio::time::timeout;

use super::{
    matcher::{reconcile, MismatchReason},
    records::{BankStatement, GatewayRecord, SettledOrder},
};

const DEFAULT_PER_ORDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the batch runner looks up the downstream half of the settlement chain. In production this fronts the
/// gateway's transaction export and the bank statement feed; tests use [`InMemorySource`].
#[allow(async_fn_in_trait)]
pub trait SettlementSource {
    async fn gateway_record_for(&self, tx_id: &str) -> Option<GatewayRecord>;
    async fn bank_statement_for(&self, ref_id: &str) -> Option<BankStatement>;
}

/// A [`SettlementSource`] backed by maps of already-loaded records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    gateway_records: HashMap<String, GatewayRecord>,
    bank_statements: HashMap<String, BankStatement>,
}

impl InMemorySource {
    pub fn new(gateway_records: Vec<GatewayRecord>, bank_statements: Vec<BankStatement>) -> Self {
        let gateway_records = gateway_records.into_iter().map(|r| (r.tx_id.clone(), r)).collect();
        let bank_statements = bank_statements.into_iter().map(|s| (s.ref_id.clone(), s)).collect();
        Self { gateway_records, bank_statements }
    }
}

impl SettlementSource for InMemorySource {
    async fn gateway_record_for(&self, tx_id: &str) -> Option<GatewayRecord> {
        self.gateway_records.get(tx_id).cloned()
    }

    async fn bank_statement_for(&self, ref_id: &str) -> Option<BankStatement> {
        self.bank_statements.get(ref_id).cloned()
    }
}

/// Why one order failed to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchFailure {
    /// No gateway record exists for the order's transaction id
    MissingGatewayRecord,
    /// No bank statement line exists for the gateway's reference id
    MissingBankStatement,
    /// The lookups did not complete within the per-order budget
    LookupTimedOut,
    /// All three records were found but they do not form a consistent match
    Mismatch(MismatchReason),
}

impl Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchFailure::MissingGatewayRecord => write!(f, "No gateway record for the order's transaction id"),
            BatchFailure::MissingBankStatement => write!(f, "No bank statement for the gateway's reference id"),
            BatchFailure::LookupTimedOut => write!(f, "Record lookups timed out"),
            BatchFailure::Mismatch(reason) => write!(f, "{reason}"),
        }
    }
}

/// The aggregate outcome of a reconciliation run. `matched + mismatched` always equals the number of orders
/// submitted, and `failures` names each failed order and why.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub matched: usize,
    pub mismatched: usize,
    pub failures: Vec<(String, BatchFailure)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.matched + self.mismatched
    }
}

/// Drives the three-way matcher over a batch of orders.
///
/// Each order is processed independently: a missing record, a field mismatch, or a hung lookup affects only that
/// order's counter, never the rest of the batch.
pub struct ReconciliationApi<S> {
    source: S,
    per_order_timeout: Duration,
}

impl<S> ReconciliationApi<S> {
    pub fn new(source: S) -> Self {
        Self { source, per_order_timeout: DEFAULT_PER_ORDER_TIMEOUT }
    }

    /// Caps the time spent on any single order's lookups. An order that exceeds the budget is counted as
    /// mismatched and the batch moves on.
    pub fn with_per_order_timeout(mut self, per_order_timeout: Duration) -> Self {
        self.per_order_timeout = per_order_timeout;
        self
    }
}

impl<S> ReconciliationApi<S>
where S: SettlementSource
{
    pub async fn run_batch(&self, orders: &[SettledOrder]) -> BatchReport {
        let mut report = BatchReport::default();
        for order in orders {
            let outcome = match timeout(self.per_order_timeout, self.reconcile_order(order)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BatchFailure::LookupTimedOut),
            };
            match outcome {
                Ok(()) => report.matched += 1,
                Err(failure) => {
                    report.mismatched += 1;
                    report.failures.push((order.order_id.clone(), failure));
                },
            }
        }
        info!(
            "🔍️ Reconciliation batch complete: {} matched, {} mismatched of {} orders",
            report.matched,
            report.mismatched,
            orders.len()
        );
        report
    }

    async fn reconcile_order(&self, order: &SettledOrder) -> Result<(), BatchFailure> {
        let gateway = self
            .source
            .gateway_record_for(&order.gateway_tx_id)
            .await
            .ok_or(BatchFailure::MissingGatewayRecord)?;
        let bank = self
            .source
            .bank_statement_for(&gateway.bank_ref_id)
            .await
            .ok_or(BatchFailure::MissingBankStatement)?;
        reconcile(order, &gateway, &bank).map_err(BatchFailure::Mismatch)?;
        debug!("🔍️ Order {} reconciled cleanly", order.order_id);
        Ok(())
    }
}
