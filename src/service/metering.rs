//! SMS credit ledger
//!
//! All balance changes go through [`SmsRepository::apply_mutation`], which pairs
//! the balance update with exactly one ledger row inside a single transaction.
//! This service validates requests, retries lock conflicts and audits the
//! ledger on demand.

use crate::config::LedgerConfig;
use crate::domain::{
    LedgerAudit, LedgerMutation, SmsBalance, SmsTransaction, SmsTransactionType, StringUuid,
};
use crate::error::{AppError, Result};
use crate::repository::SmsRepository;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct SmsLedgerService<R: SmsRepository> {
    repo: Arc<R>,
    config: LedgerConfig,
}

impl<R: SmsRepository> SmsLedgerService<R> {
    pub fn new(repo: Arc<R>, config: LedgerConfig) -> Self {
        Self { repo, config }
    }

    /// Spend `amount` credits. Fails without side effects when the balance is short.
    pub async fn debit(
        &self,
        tenant_id: StringUuid,
        amount: i64,
        description: &str,
    ) -> Result<SmsTransaction> {
        require_positive(amount)?;
        let mutation = LedgerMutation {
            transaction_type: SmsTransactionType::Usage,
            delta: -amount,
            description: description.to_string(),
            created_by: None,
        };
        self.apply(tenant_id, mutation).await
    }

    /// Add `amount` credits recorded as `transaction_type`.
    pub async fn credit(
        &self,
        tenant_id: StringUuid,
        amount: i64,
        transaction_type: SmsTransactionType,
        description: &str,
    ) -> Result<SmsTransaction> {
        require_positive(amount)?;
        if !transaction_type.is_credit() {
            return Err(AppError::Validation(format!(
                "{} cannot be used to credit a balance",
                transaction_type
            )));
        }
        let mutation = LedgerMutation {
            transaction_type,
            delta: amount,
            description: description.to_string(),
            created_by: None,
        };
        self.apply(tenant_id, mutation).await
    }

    /// Signed administrative correction attributed to `actor`.
    pub async fn adjust(
        &self,
        tenant_id: StringUuid,
        delta: i64,
        actor: StringUuid,
        description: &str,
    ) -> Result<SmsTransaction> {
        if delta == 0 {
            return Err(AppError::Validation(
                "Adjustment must be non-zero".to_string(),
            ));
        }
        let mutation = LedgerMutation {
            transaction_type: SmsTransactionType::AdminAdjustment,
            delta,
            description: description.to_string(),
            created_by: Some(actor),
        };
        let tx = self.apply(tenant_id, mutation).await?;
        info!(tenant_id = %tenant_id, actor = %actor, delta, "SMS balance adjusted");
        Ok(tx)
    }

    pub async fn get_balance(&self, tenant_id: StringUuid) -> Result<SmsBalance> {
        self.repo.find_balance(tenant_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("SMS balance for tenant {} not found", tenant_id))
        })
    }

    /// Newest first, with the total row count.
    pub async fn list_transactions(
        &self,
        tenant_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<SmsTransaction>, i64)> {
        let rows = self
            .repo
            .list_transactions(tenant_id, offset.max(0), limit.clamp(1, 100))
            .await?;
        let total = self.repo.count_transactions(tenant_id).await?;
        Ok((rows, total))
    }

    /// Replay the ledger. A mismatch places the balance on hold and is
    /// reported as `IntegrityViolation`; nothing is corrected.
    pub async fn verify(&self, tenant_id: StringUuid) -> Result<LedgerAudit> {
        let audit = self.audit(tenant_id).await?;
        if audit.reconciles() {
            return Ok(audit);
        }

        let reason = audit.describe();
        error!(
            tenant_id = %tenant_id,
            replayed = audit.replayed_balance,
            stored = audit.stored_balance,
            reason = %reason,
            "SMS ledger does not reconcile; placing balance on hold"
        );
        counter!("tenantry_sms_ledger_integrity_holds_total").increment(1);
        self.repo.set_hold(tenant_id, Some(reason.clone())).await?;
        Err(AppError::IntegrityViolation(reason))
    }

    /// Lift the hold once the ledger reconciles again.
    pub async fn release_hold(&self, tenant_id: StringUuid) -> Result<LedgerAudit> {
        let audit = self.audit(tenant_id).await?;
        if !audit.reconciles() {
            return Err(AppError::IntegrityViolation(audit.describe()));
        }
        self.repo.set_hold(tenant_id, None).await?;
        info!(tenant_id = %tenant_id, "SMS ledger hold released");
        Ok(audit)
    }

    async fn audit(&self, tenant_id: StringUuid) -> Result<LedgerAudit> {
        let balance = self.get_balance(tenant_id).await?;
        let ledger = self.repo.ledger(tenant_id).await?;
        Ok(LedgerAudit::replay(&balance, &ledger))
    }

    async fn apply(&self, tenant_id: StringUuid, mutation: LedgerMutation) -> Result<SmsTransaction> {
        let kind = mutation.transaction_type.to_string();
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        let result = loop {
            match self.repo.apply_mutation(tenant_id, &mutation).await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(tenant_id = %tenant_id, attempt, error = %e, "Retrying SMS ledger mutation");
                    counter!("tenantry_sms_ledger_retries_total").increment(1);
                    tokio::time::sleep(Duration::from_millis(
                        self.config.retry_backoff_ms * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                other => break other,
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AppError::InsufficientCredit { .. }) => "insufficient_credit",
            Err(AppError::IntegrityViolation(_)) => "on_hold",
            Err(AppError::ConcurrencyConflict(_)) => "conflict",
            Err(_) => "error",
        };
        counter!("tenantry_sms_ledger_operations_total", "kind" => kind, "result" => outcome)
            .increment(1);

        result.map(|(_, row)| row)
    }
}

fn require_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(AppError::Validation(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}
