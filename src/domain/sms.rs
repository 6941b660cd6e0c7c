//! SMS credit balance and its append-only ledger

use super::common::{impl_mysql_string_enum, StringUuid};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsTransactionType {
    Purchase,
    Usage,
    Refund,
    AdminAdjustment,
    Bonus,
}

impl SmsTransactionType {
    /// Types accepted by `credit`. Usage only comes from debits.
    pub fn is_credit(self) -> bool {
        !matches!(self, SmsTransactionType::Usage)
    }
}

impl std::str::FromStr for SmsTransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "purchase" => Ok(SmsTransactionType::Purchase),
            "usage" => Ok(SmsTransactionType::Usage),
            "refund" => Ok(SmsTransactionType::Refund),
            "admin_adjustment" => Ok(SmsTransactionType::AdminAdjustment),
            "bonus" => Ok(SmsTransactionType::Bonus),
            _ => Err(format!("Unknown SMS transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for SmsTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SmsTransactionType::Purchase => "purchase",
            SmsTransactionType::Usage => "usage",
            SmsTransactionType::Refund => "refund",
            SmsTransactionType::AdminAdjustment => "admin_adjustment",
            SmsTransactionType::Bonus => "bonus",
        };
        f.write_str(s)
    }
}

impl_mysql_string_enum!(SmsTransactionType);

/// Per-tenant credit balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SmsBalance {
    pub tenant_id: StringUuid,
    pub balance: i64,
    /// Incremented on every mutation; equals the last transaction's sequence
    pub version: i64,
    pub integrity_hold: bool,
    pub hold_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SmsBalance {
    pub fn new(tenant_id: StringUuid, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            balance: 0,
            version: 0,
            integrity_hold: false,
            hold_reason: None,
            updated_at: now,
        }
    }
}

/// Append-only ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SmsTransaction {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub sequence: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub transaction_type: SmsTransactionType,
    /// Signed delta
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub created_by: Option<StringUuid>,
    pub created_at: DateTime<Utc>,
}

/// A requested balance change, validated and applied atomically by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerMutation {
    pub transaction_type: SmsTransactionType,
    pub delta: i64,
    pub description: String,
    pub created_by: Option<StringUuid>,
}

impl LedgerMutation {
    /// Whether this mutation may be applied to `balance`: no integrity hold,
    /// and the result stays non-negative.
    pub fn check_against(&self, balance: &SmsBalance) -> Result<()> {
        if balance.integrity_hold {
            return Err(AppError::IntegrityViolation(format!(
                "SMS balance for tenant {} is on hold: {}",
                balance.tenant_id,
                balance.hold_reason.as_deref().unwrap_or("ledger mismatch")
            )));
        }
        if balance.balance + self.delta < 0 {
            return Err(AppError::InsufficientCredit {
                requested: -self.delta,
                available: balance.balance,
            });
        }
        Ok(())
    }

    /// Transaction row produced by applying this mutation to `balance`.
    pub fn to_transaction(&self, balance: &SmsBalance, now: DateTime<Utc>) -> SmsTransaction {
        SmsTransaction {
            id: StringUuid::new_v4(),
            tenant_id: balance.tenant_id,
            sequence: balance.version + 1,
            transaction_type: self.transaction_type,
            amount: self.delta,
            balance_after: balance.balance + self.delta,
            description: self.description.clone(),
            created_by: self.created_by,
            created_at: now,
        }
    }
}

/// Outcome of replaying a tenant's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub tenant_id: StringUuid,
    pub transactions: usize,
    pub replayed_balance: i64,
    pub stored_balance: i64,
    /// First transaction whose balance_after disagrees with the running sum
    pub first_mismatch: Option<StringUuid>,
}

impl LedgerAudit {
    /// Replay `transactions` (already in ledger order) against the stored balance.
    pub fn replay(balance: &SmsBalance, transactions: &[SmsTransaction]) -> Self {
        let mut running = 0i64;
        let mut first_mismatch = None;
        for tx in transactions {
            running += tx.amount;
            if first_mismatch.is_none() && tx.balance_after != running {
                first_mismatch = Some(tx.id);
            }
        }
        Self {
            tenant_id: balance.tenant_id,
            transactions: transactions.len(),
            replayed_balance: running,
            stored_balance: balance.balance,
            first_mismatch,
        }
    }

    pub fn reconciles(&self) -> bool {
        self.first_mismatch.is_none() && self.replayed_balance == self.stored_balance
    }

    pub fn describe(&self) -> String {
        match self.first_mismatch {
            Some(id) => format!(
                "transaction {} does not match the running balance",
                id
            ),
            None => format!(
                "replayed balance {} differs from stored balance {}",
                self.replayed_balance, self.stored_balance
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AdjustBalanceInput {
    pub tenant_id: StringUuid,
    pub delta: i64,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyLedgerInput {
    pub tenant_id: StringUuid,
    /// Lift an existing hold if the ledger now reconciles
    #[serde(default)]
    pub release_hold: bool,
}
