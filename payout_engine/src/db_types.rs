use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use vpc_common::Money;

//--------------------------------------      PayoutId       ---------------------------------------------------------
/// A lightweight wrapper around the opaque payout identifier assigned at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct PayoutId(pub String);

impl PayoutId {
    /// Generates a fresh payout id. Uniqueness is ultimately enforced by the database.
    pub fn random() -> Self {
        Self(format!("po-{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PayoutId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for PayoutId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for PayoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    PayoutStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// The payout request has been created and no approvals have been recorded.
    PendingApproval,
    /// The security review has signed off.
    ApprovedSecurity,
    /// The finance review has signed off (after security).
    ApprovedFinance,
    /// All three approvals are in place and the wallet has been debited.
    ReadyForPayout,
    /// The transfer to the vendor's bank account is in flight.
    Processing,
    /// The payout has been settled. Terminal.
    Completed,
    /// The payout was rejected by an approver. Terminal.
    Rejected,
}

impl PayoutStatus {
    /// Terminal payouts are immutable; any further mutation attempt is an error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Completed | PayoutStatus::Rejected)
    }

    /// True for the statuses that precede the readiness threshold.
    pub fn is_awaiting_approval(&self) -> bool {
        matches!(
            self,
            PayoutStatus::PendingApproval | PayoutStatus::ApprovedSecurity | PayoutStatus::ApprovedFinance
        )
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::PendingApproval => write!(f, "PendingApproval"),
            PayoutStatus::ApprovedSecurity => write!(f, "ApprovedSecurity"),
            PayoutStatus::ApprovedFinance => write!(f, "ApprovedFinance"),
            PayoutStatus::ReadyForPayout => write!(f, "ReadyForPayout"),
            PayoutStatus::Processing => write!(f, "Processing"),
            PayoutStatus::Completed => write!(f, "Completed"),
            PayoutStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payout status: {0}")]
pub struct ConversionError(String);

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingApproval" => Ok(Self::PendingApproval),
            "ApprovedSecurity" => Ok(Self::ApprovedSecurity),
            "ApprovedFinance" => Ok(Self::ApprovedFinance),
            "ReadyForPayout" => Ok(Self::ReadyForPayout),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

//--------------------------------------    ApproverRole     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApproverRole {
    Security,
    Finance,
    Admin,
}

impl Display for ApproverRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApproverRole::Security => write!(f, "Security"),
            ApproverRole::Finance => write!(f, "Finance"),
            ApproverRole::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for ApproverRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "security" => Ok(Self::Security),
            "finance" => Ok(Self::Finance),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid approver role: {s}"))),
        }
    }
}

//--------------------------------------    ApprovalSet      ---------------------------------------------------------
/// The three independent sign-off flags on a payout. Flags are monotonic: once set, nothing clears them again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ApprovalSet {
    #[sqlx(rename = "security_approved")]
    pub security: bool,
    #[sqlx(rename = "finance_approved")]
    pub finance: bool,
    #[sqlx(rename = "admin_approved")]
    pub admin: bool,
}

impl ApprovalSet {
    /// Records the approval for `role`. Returns true if the flag was newly set, false if it was already in place.
    pub fn record(&mut self, role: ApproverRole) -> bool {
        let flag = match role {
            ApproverRole::Security => &mut self.security,
            ApproverRole::Finance => &mut self.finance,
            ApproverRole::Admin => &mut self.admin,
        };
        let newly_set = !*flag;
        *flag = true;
        newly_set
    }

    pub fn is_approved_by(&self, role: ApproverRole) -> bool {
        match role {
            ApproverRole::Security => self.security,
            ApproverRole::Finance => self.finance,
            ApproverRole::Admin => self.admin,
        }
    }

    /// The unlock condition: all three sign-offs are in place.
    pub fn is_complete(&self) -> bool {
        self.security && self.finance && self.admin
    }
}

//--------------------------------------    PayoutRequest    ---------------------------------------------------------
/// A request to release funds from a vendor's wallet. `vendor_id` and `amount` are immutable after creation; status
/// and approvals only ever change through the workflow, inside the backend's unit of work.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: i64,
    pub payout_id: PayoutId,
    pub vendor_id: String,
    pub amount: Money,
    pub status: PayoutStatus,
    #[sqlx(flatten)]
    pub approvals: ApprovalSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewPayout      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayout {
    /// The vendor whose wallet will be debited when the payout unlocks
    pub vendor_id: String,
    /// The amount to pay out. Must be strictly positive
    pub amount: Money,
}

impl NewPayout {
    pub fn new<S: Into<String>>(vendor_id: S, amount: Money) -> Self {
        Self { vendor_id: vendor_id.into(), amount }
    }
}

//--------------------------------------     AuditEntry      ---------------------------------------------------------
/// One timestamped line in a payout's append-only audit trail. Entries are ordered by insertion and never rewritten.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub payout_id: PayoutId,
    pub created_at: DateTime<Utc>,
    pub entry: String,
}

//--------------------------------------       Wallet        ---------------------------------------------------------
/// A vendor's balance record. One row per vendor; the balance is only ever changed by the atomic credit and debit
/// statements in the backend and can never be observed negative.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub vendor_id: String,
    pub balance: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
