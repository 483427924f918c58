//! Batch-level reconciliation tests: failure containment, per-order independence, and lookup timeouts.

use std::time::Duration;

use payout_engine::reconciliation::{
    BankStatement,
    BankStatus,
    BatchFailure,
    GatewayRecord,
    GatewayStatus,
    InMemorySource,
    MismatchReason,
    ReconciliationApi,
    SettledOrder,
    SettlementSource,
};
use vpc_common::Money;

fn order(n: u32, cents: i64) -> SettledOrder {
    SettledOrder {
        order_id: format!("ord-{n}"),
        amount: Money::from_cents(cents),
        status: "Settled".to_string(),
        gateway_tx_id: format!("gw-{n}"),
    }
}

fn gateway(n: u32, cents: i64) -> GatewayRecord {
    GatewayRecord {
        tx_id: format!("gw-{n}"),
        amount: Money::from_cents(cents),
        status: GatewayStatus::Captured,
        bank_ref_id: format!("bank-{n}"),
    }
}

fn bank(n: u32, cents: i64) -> BankStatement {
    BankStatement { ref_id: format!("bank-{n}"), amount: Money::from_cents(cents), status: BankStatus::Credited }
}

#[tokio::test]
async fn clean_batch_matches_every_order() {
    let orders: Vec<_> = (1..=3).map(|n| order(n, 10_000 * n as i64)).collect();
    let source = InMemorySource::new(
        (1..=3).map(|n| gateway(n, 10_000 * n as i64)).collect(),
        (1..=3).map(|n| bank(n, 10_000 * n as i64)).collect(),
    );
    let report = ReconciliationApi::new(source).run_batch(&orders).await;
    assert_eq!(report.matched, 3);
    assert_eq!(report.mismatched, 0);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn missing_records_do_not_abort_the_batch() {
    // Order 2 has no gateway record, order 3's gateway record points at a bank line that never arrived,
    // order 4's amounts disagree. Order 1 is clean and must be unaffected.
    let orders: Vec<_> = (1..=4).map(|n| order(n, 50_000)).collect();
    let gateways = vec![gateway(1, 50_000), gateway(3, 50_000), gateway(4, 49_900)];
    let banks = vec![bank(1, 50_000), bank(4, 49_900)];
    let report = ReconciliationApi::new(InMemorySource::new(gateways, banks)).run_batch(&orders).await;

    assert_eq!(report.matched, 1);
    assert_eq!(report.mismatched, 3);
    assert_eq!(report.total(), orders.len());
    assert_eq!(report.failures.len(), 3);
    assert!(report.failures.contains(&("ord-2".to_string(), BatchFailure::MissingGatewayRecord)));
    assert!(report.failures.contains(&("ord-3".to_string(), BatchFailure::MissingBankStatement)));
    assert!(matches!(
        report.failures.iter().find(|(id, _)| id == "ord-4"),
        Some((_, BatchFailure::Mismatch(MismatchReason::OrderGatewayAmount { .. })))
    ));
}

#[tokio::test]
async fn uncaptured_gateway_and_uncredited_bank_records_mismatch() {
    let orders = vec![order(1, 10_000), order(2, 10_000)];
    let mut gw1 = gateway(1, 10_000);
    gw1.status = GatewayStatus::Refunded;
    let mut bk2 = bank(2, 10_000);
    bk2.status = BankStatus::Pending;
    let source = InMemorySource::new(vec![gw1, gateway(2, 10_000)], vec![bank(1, 10_000), bk2]);
    let report = ReconciliationApi::new(source).run_batch(&orders).await;

    assert_eq!(report.matched, 0);
    assert_eq!(report.mismatched, 2);
    assert!(report
        .failures
        .contains(&("ord-1".to_string(), BatchFailure::Mismatch(MismatchReason::GatewayNotCaptured(GatewayStatus::Refunded)))));
    assert!(report
        .failures
        .contains(&("ord-2".to_string(), BatchFailure::Mismatch(MismatchReason::BankNotCredited(BankStatus::Pending)))));
}

/// A source whose gateway lookups hang for one specific transaction id.
struct StallingSource {
    inner: InMemorySource,
    stall_on: String,
}

impl SettlementSource for StallingSource {
    async fn gateway_record_for(&self, tx_id: &str) -> Option<GatewayRecord> {
        if tx_id == self.stall_on {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.inner.gateway_record_for(tx_id).await
    }

    async fn bank_statement_for(&self, ref_id: &str) -> Option<BankStatement> {
        self.inner.bank_statement_for(ref_id).await
    }
}

#[tokio::test]
async fn a_hung_lookup_is_capped_and_counted_as_mismatched() {
    let orders: Vec<_> = (1..=3).map(|n| order(n, 10_000)).collect();
    let inner = InMemorySource::new(
        (1..=3).map(|n| gateway(n, 10_000)).collect(),
        (1..=3).map(|n| bank(n, 10_000)).collect(),
    );
    let source = StallingSource { inner, stall_on: "gw-2".to_string() };
    let report = ReconciliationApi::new(source)
        .with_per_order_timeout(Duration::from_millis(50))
        .run_batch(&orders)
        .await;

    assert_eq!(report.matched, 2);
    assert_eq!(report.mismatched, 1);
    assert!(report.failures.contains(&("ord-2".to_string(), BatchFailure::LookupTimedOut)));
}
