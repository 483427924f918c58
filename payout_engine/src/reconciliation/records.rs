use std::fmt::Display;

use serde::{Deserialize, Serialize};
use vpc_common::Money;

//--------------------------------------    SettledOrder     ---------------------------------------------------------
/// An internal order record, as it enters the reconciliation pass. Linked to the gateway by `gateway_tx_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledOrder {
    pub order_id: String,
    pub amount: Money,
    pub status: String,
    pub gateway_tx_id: String,
}

//--------------------------------------    GatewayRecord    ---------------------------------------------------------
/// The payment gateway's view of one transaction. Linked to the bank statement by `bank_ref_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRecord {
    pub tx_id: String,
    pub amount: Money,
    pub status: GatewayStatus,
    pub bank_ref_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayStatus {
    /// The gateway has captured the funds. The only status that reconciles
    Captured,
    Pending,
    Refunded,
    Failed,
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Captured => write!(f, "Captured"),
            GatewayStatus::Pending => write!(f, "Pending"),
            GatewayStatus::Refunded => write!(f, "Refunded"),
            GatewayStatus::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------    BankStatement    ---------------------------------------------------------
/// One line of the bank statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStatement {
    pub ref_id: String,
    pub amount: Money,
    pub status: BankStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankStatus {
    /// The funds landed in the account. The only status that reconciles
    Credited,
    Pending,
    Reversed,
}

impl Display for BankStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankStatus::Credited => write!(f, "Credited"),
            BankStatus::Pending => write!(f, "Pending"),
            BankStatus::Reversed => write!(f, "Reversed"),
        }
    }
}
