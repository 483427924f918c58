//! End-to-end tests for the approval-gated payout flow against a real SQLite database.

use std::sync::Arc;

use payout_engine::{
    db_types::{ApproverRole, NewPayout, PayoutId, PayoutStatus},
    Capability,
    PayoutApi,
    PayoutApiError,
    PayoutDbError,
    RolePermissions,
    SqliteDatabase,
};
use vpc_common::Money;

mod support;

const VENDOR: &str = "vendor-001";

fn api_for(db: &SqliteDatabase) -> PayoutApi<SqliteDatabase> {
    PayoutApi::new(db.clone(), Arc::new(RolePermissions::standard()))
}

/// A vendor with a funded wallet and one pending payout of 5000.00.
async fn setup(balance: Money) -> (PayoutApi<SqliteDatabase>, PayoutId) {
    let db = support::prepare_test_env(&support::random_db_path(), 5).await;
    let api = api_for(&db);
    api.upsert_wallet(VENDOR, "USD").await.unwrap();
    if balance.is_positive() {
        api.credit_wallet(VENDOR, balance).await.unwrap();
    }
    let payout = api.create_payout(NewPayout::new(VENDOR, Money::from_cents(500_000))).await.unwrap();
    (api, payout.payout_id)
}

async fn balance_of(api: &PayoutApi<SqliteDatabase>) -> Money {
    api.wallet_for_vendor(VENDOR).await.unwrap().unwrap().balance
}

#[tokio::test]
async fn create_payout_seeds_audit_and_pending_state() {
    let (api, id) = setup(Money::from_cents(500_000)).await;
    let payout = api.payout_by_id(&id).await.unwrap().unwrap();
    assert_eq!(payout.status, PayoutStatus::PendingApproval);
    assert!(!payout.approvals.security && !payout.approvals.finance && !payout.approvals.admin);
    assert_eq!(payout.amount, Money::from_cents(500_000));
    let log = api.audit_log(&id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].entry.contains("created for vendor vendor-001"));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let db = support::prepare_test_env(&support::random_db_path(), 5).await;
    let api = api_for(&db);
    let err = api.create_payout(NewPayout::new(VENDOR, Money::from_cents(0))).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::InvalidAmount(_))));
}

#[tokio::test]
async fn full_approval_chain_debits_the_wallet_exactly_once() {
    let (api, id) = setup(Money::from_cents(500_000)).await;

    let payout = api.approve_payout(&id, ApproverRole::Security).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::ApprovedSecurity);
    let payout = api.approve_payout(&id, ApproverRole::Finance).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::ApprovedFinance);
    assert_eq!(balance_of(&api).await, Money::from_cents(500_000));

    let payout = api.approve_payout(&id, ApproverRole::Admin).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::ReadyForPayout);
    assert!(payout.approvals.is_complete());
    assert_eq!(balance_of(&api).await, Money::from_cents(0));

    // A duplicate call once past the threshold is a safe no-op: flags stay set, nothing is debited again
    let payout = api.approve_payout(&id, ApproverRole::Admin).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::ReadyForPayout);
    assert_eq!(balance_of(&api).await, Money::from_cents(0));

    let log = api.audit_log(&id).await.unwrap();
    let debits = log.iter().filter(|e| e.entry.starts_with("Wallet debited")).count();
    let ready = log.iter().filter(|e| e.entry.contains("ready for processing")).count();
    assert_eq!(debits, 1);
    assert_eq!(ready, 1);

    // The trail must record the authorising approval, then readiness, and only then the money leaving
    let pos = |needle: &str| log.iter().position(|e| e.entry.contains(needle)).unwrap();
    assert!(pos("Approved by Admin") < pos("ready for processing"));
    assert!(pos("ready for processing") < pos("Wallet debited"));
}

#[tokio::test]
async fn insufficient_funds_rolls_back_the_whole_approval() {
    let (api, id) = setup(Money::from_cents(100_000)).await;
    api.approve_payout(&id, ApproverRole::Security).await.unwrap();
    api.approve_payout(&id, ApproverRole::Finance).await.unwrap();

    let err = api.approve_payout(&id, ApproverRole::Admin).await.unwrap_err();
    match err {
        PayoutApiError::Database(PayoutDbError::InsufficientFunds { needed, available }) => {
            assert_eq!(needed, Money::from_cents(500_000));
            assert_eq!(available, Money::from_cents(100_000));
        },
        other => panic!("Expected InsufficientFunds, got {other:?}"),
    }

    // Nothing from the failed call may stick: status, admin flag, and balance are all at their pre-call values
    let payout = api.payout_by_id(&id).await.unwrap().unwrap();
    assert_eq!(payout.status, PayoutStatus::ApprovedFinance);
    assert!(!payout.approvals.admin);
    assert_eq!(balance_of(&api).await, Money::from_cents(100_000));

    // Funding the wallet lets the same approval succeed
    api.credit_wallet(VENDOR, Money::from_cents(400_000)).await.unwrap();
    let payout = api.approve_payout(&id, ApproverRole::Admin).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::ReadyForPayout);
    assert_eq!(balance_of(&api).await, Money::from_cents(0));
}

#[tokio::test]
async fn out_of_order_approvals_converge_and_debit_once() {
    let (api, id) = setup(Money::from_cents(500_000)).await;

    let payout = api.approve_payout(&id, ApproverRole::Admin).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::PendingApproval);
    let payout = api.approve_payout(&id, ApproverRole::Finance).await.unwrap();
    // Finance before security records the flag but does not advance the status
    assert_eq!(payout.status, PayoutStatus::PendingApproval);
    assert!(payout.approvals.finance);
    assert_eq!(balance_of(&api).await, Money::from_cents(500_000));

    let payout = api.approve_payout(&id, ApproverRole::Security).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::ReadyForPayout);
    assert_eq!(balance_of(&api).await, Money::from_cents(0));
}

#[tokio::test]
async fn rejected_payouts_are_terminal() {
    let (api, id) = setup(Money::from_cents(500_000)).await;
    api.reject_payout(&id, ApproverRole::Security, "Vendor under investigation").await.unwrap();

    let err = api.approve_payout(&id, ApproverRole::Finance).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::AlreadyFinalized(_))));
    let payout = api.payout_by_id(&id).await.unwrap().unwrap();
    assert_eq!(payout.status, PayoutStatus::Rejected);
    assert!(!payout.approvals.finance);
    assert_eq!(balance_of(&api).await, Money::from_cents(500_000));
}

#[tokio::test]
async fn rejecting_a_ready_payout_refunds_the_wallet() {
    let (api, id) = setup(Money::from_cents(500_000)).await;
    api.approve_payout(&id, ApproverRole::Security).await.unwrap();
    api.approve_payout(&id, ApproverRole::Finance).await.unwrap();
    api.approve_payout(&id, ApproverRole::Admin).await.unwrap();
    assert_eq!(balance_of(&api).await, Money::from_cents(0));

    let payout = api.reject_payout(&id, ApproverRole::Admin, "Bank details failed verification").await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Rejected);
    assert_eq!(balance_of(&api).await, Money::from_cents(500_000));
    let log = api.audit_log(&id).await.unwrap();
    assert!(log.iter().any(|e| e.entry.contains("refunded")));
}

#[tokio::test]
async fn processing_and_completion_transitions() {
    let (api, id) = setup(Money::from_cents(500_000)).await;

    // Processing is only reachable from ReadyForPayout
    let err = api.mark_processing(&id).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::InvalidStatusChange { .. })));

    api.approve_payout(&id, ApproverRole::Security).await.unwrap();
    api.approve_payout(&id, ApproverRole::Finance).await.unwrap();
    api.approve_payout(&id, ApproverRole::Admin).await.unwrap();

    let payout = api.mark_processing(&id).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);
    // Re-announcing the hand-over is a no-op
    let payout = api.mark_processing(&id).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);

    // An in-flight payout can no longer be rejected
    let err = api.reject_payout(&id, ApproverRole::Admin, "too late").await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::InvalidStatusChange { .. })));

    let payout = api.mark_completed(&id).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Completed);
    let err = api.approve_payout(&id, ApproverRole::Admin).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::AlreadyFinalized(_))));
}

#[tokio::test]
async fn unknown_payouts_and_unprovisioned_wallets_are_reported() {
    let db = support::prepare_test_env(&support::random_db_path(), 5).await;
    let api = api_for(&db);

    let missing = PayoutId::random();
    let err = api.approve_payout(&missing, ApproverRole::Security).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::PayoutNotFound(_))));
    assert!(api.payout_by_id(&missing).await.unwrap().is_none());

    // A payout for a vendor with no wallet only trips up at the debit
    let payout = api.create_payout(NewPayout::new("vendor-walletless", Money::from_cents(1000))).await.unwrap();
    api.approve_payout(&payout.payout_id, ApproverRole::Security).await.unwrap();
    api.approve_payout(&payout.payout_id, ApproverRole::Finance).await.unwrap();
    let err = api.approve_payout(&payout.payout_id, ApproverRole::Admin).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Database(PayoutDbError::WalletNotFound(_))));
    let payout = api.payout_by_id(&payout.payout_id).await.unwrap().unwrap();
    assert_eq!(payout.status, PayoutStatus::ApprovedFinance);
}

#[tokio::test]
async fn permission_check_gates_the_mutating_calls() {
    let db = support::prepare_test_env(&support::random_db_path(), 5).await;
    // Finance may approve but nobody may reject
    let perms = RolePermissions::default().with_grant(ApproverRole::Finance, Capability::ApprovePayout);
    let api = PayoutApi::new(db.clone(), Arc::new(perms));
    api.upsert_wallet(VENDOR, "USD").await.unwrap();
    let payout = api.create_payout(NewPayout::new(VENDOR, Money::from_cents(1000))).await.unwrap();

    let err = api.approve_payout(&payout.payout_id, ApproverRole::Security).await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Forbidden { role: ApproverRole::Security, .. }));
    let err = api.reject_payout(&payout.payout_id, ApproverRole::Finance, "nope").await.unwrap_err();
    assert!(matches!(err, PayoutApiError::Forbidden { role: ApproverRole::Finance, .. }));

    let payout = api.approve_payout(&payout.payout_id, ApproverRole::Finance).await.unwrap();
    assert!(payout.approvals.finance);
}

#[tokio::test]
async fn concurrent_approvals_of_one_payout_debit_exactly_once() {
    // A multi-connection pool lets the three approvals genuinely race. The write path must queue them, not
    // bounce any of them with a busy error: every ordering of the three roles is legal, so each call must succeed.
    const ROUNDS: i64 = 5;
    let db = support::prepare_test_env(&support::random_db_path(), 5).await;
    let api = api_for(&db);
    api.upsert_wallet(VENDOR, "USD").await.unwrap();
    api.credit_wallet(VENDOR, Money::from_cents(ROUNDS * 500_000)).await.unwrap();

    for _ in 0..ROUNDS {
        let payout = api.create_payout(NewPayout::new(VENDOR, Money::from_cents(500_000))).await.unwrap();
        let mut handles = vec![];
        for role in [ApproverRole::Security, ApproverRole::Finance, ApproverRole::Admin] {
            let db = db.clone();
            let id = payout.payout_id.clone();
            handles.push(tokio::spawn(async move {
                let api = api_for(&db);
                api.approve_payout(&id, role).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let payout = api.payout_by_id(&payout.payout_id).await.unwrap().unwrap();
        assert_eq!(payout.status, PayoutStatus::ReadyForPayout);
        assert!(payout.approvals.is_complete());
        let log = api.audit_log(&payout.payout_id).await.unwrap();
        assert_eq!(log.iter().filter(|e| e.entry.starts_with("Wallet debited")).count(), 1);
    }
    assert_eq!(balance_of(&api).await, Money::from_cents(0));
}

#[tokio::test]
async fn payouts_for_vendor_lists_newest_first() {
    let (api, _id) = setup(Money::from_cents(500_000)).await;
    let second = api.create_payout(NewPayout::new(VENDOR, Money::from_cents(2500))).await.unwrap();
    let payouts = api.payouts_for_vendor(VENDOR).await.unwrap();
    assert_eq!(payouts.len(), 2);
    assert_eq!(payouts[0].payout_id, second.payout_id);
    assert!(api.payouts_for_vendor("vendor-none").await.unwrap().is_empty());
}
