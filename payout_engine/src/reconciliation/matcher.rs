use std::fmt::Display;

use log::warn;
use vpc_common::Money;

use super::records::{BankStatement, BankStatus, GatewayRecord, GatewayStatus, SettledOrder};

/// The first check that failed in the order → gateway → bank chain. Mismatches are values to report and follow up
/// on, never errors to propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    OrderGatewayAmount { order: Money, gateway: Money },
    GatewayTxIdMismatch { order_ref: String, gateway_tx: String },
    GatewayNotCaptured(GatewayStatus),
    GatewayBankAmount { gateway: Money, bank: Money },
    BankRefIdMismatch { gateway_ref: String, bank_ref: String },
    BankNotCredited(BankStatus),
}

impl Display for MismatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MismatchReason::OrderGatewayAmount { order, gateway } => {
                write!(f, "Order amount {order} does not match gateway amount {gateway}")
            },
            MismatchReason::GatewayTxIdMismatch { order_ref, gateway_tx } => {
                write!(f, "Order references gateway transaction {order_ref} but the record is for {gateway_tx}")
            },
            MismatchReason::GatewayNotCaptured(status) => {
                write!(f, "Gateway transaction is {status}, expected Captured")
            },
            MismatchReason::GatewayBankAmount { gateway, bank } => {
                write!(f, "Gateway amount {gateway} does not match bank amount {bank}")
            },
            MismatchReason::BankRefIdMismatch { gateway_ref, bank_ref } => {
                write!(f, "Gateway references bank statement {gateway_ref} but the line is {bank_ref}")
            },
            MismatchReason::BankNotCredited(status) => {
                write!(f, "Bank statement line is {status}, expected Credited")
            },
        }
    }
}

/// Decides whether the three records form a consistent three-way match.
///
/// The order must match the gateway record on amount and transaction id with the gateway reporting `Captured`, and
/// the gateway record must match the bank statement on amount and reference id with the bank reporting `Credited`.
/// Strict equality on every field; there is no partial credit. The first failed check is returned.
pub fn reconcile(
    order: &SettledOrder,
    gateway: &GatewayRecord,
    bank: &BankStatement,
) -> Result<(), MismatchReason> {
    let result = check(order, gateway, bank);
    if let Err(reason) = &result {
        warn!("🔍️ Order {} failed reconciliation: {reason}", order.order_id);
    }
    result
}

fn check(order: &SettledOrder, gateway: &GatewayRecord, bank: &BankStatement) -> Result<(), MismatchReason> {
    if order.gateway_tx_id != gateway.tx_id {
        return Err(MismatchReason::GatewayTxIdMismatch {
            order_ref: order.gateway_tx_id.clone(),
            gateway_tx: gateway.tx_id.clone(),
        });
    }
    if order.amount != gateway.amount {
        return Err(MismatchReason::OrderGatewayAmount { order: order.amount, gateway: gateway.amount });
    }
    if gateway.status != GatewayStatus::Captured {
        return Err(MismatchReason::GatewayNotCaptured(gateway.status));
    }
    if gateway.bank_ref_id != bank.ref_id {
        return Err(MismatchReason::BankRefIdMismatch {
            gateway_ref: gateway.bank_ref_id.clone(),
            bank_ref: bank.ref_id.clone(),
        });
    }
    if gateway.amount != bank.amount {
        return Err(MismatchReason::GatewayBankAmount { gateway: gateway.amount, bank: bank.amount });
    }
    if bank.status != BankStatus::Credited {
        return Err(MismatchReason::BankNotCredited(bank.status));
    }
    Ok(())
}
