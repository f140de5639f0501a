use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{
    DepositRequest, STATUS_COMPLETED, STATUS_PENDING, TX_DEPOSIT, TransactionRecord,
};
use crate::db::queries;
use crate::error::AppError;
use crate::session::CurrentIdentity;
use crate::validation::{
    DESCRIPTION_MAX_LEN, validate_amount_scale, validate_max_len, validate_positive_amount,
};

/// Ledger marker for money entering from outside the ledger (cash desk,
/// inbound wires); deposits and loan disbursements use it as the
/// counterparty account field.
pub const BANK_COUNTERPARTY: &str = "bank";

#[derive(Debug)]
pub struct NewDeposit {
    pub account_id: Uuid,
    pub amount: BigDecimal,
    pub reference: Option<String>,
}

/// Customer-initiated deposits are recorded as pending requests; money
/// only moves when the back office validates them.
#[derive(Clone)]
pub struct DepositService {
    pool: PgPool,
}

impl DepositService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn request(
        &self,
        identity: &CurrentIdentity,
        deposit: NewDeposit,
    ) -> Result<DepositRequest, AppError> {
        validate_positive_amount(&deposit.amount)?;
        validate_amount_scale(&deposit.amount)?;
        if let Some(reference) = &deposit.reference {
            validate_max_len("reference", reference, DESCRIPTION_MAX_LEN)?;
        }

        let account = queries::get_account(&self.pool, deposit.account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {}", deposit.account_id)))?;
        if account.customer_id != identity.customer_id {
            return Err(AppError::AccountNotEligible(
                "account is not owned by the caller".to_string(),
            ));
        }

        let inserted = queries::insert_deposit_request(
            &self.pool,
            &DepositRequest::new(
                account.id,
                identity.customer_id,
                deposit.amount,
                deposit.reference,
            ),
        )
        .await?;

        tracing::info!(deposit_id = %inserted.id, amount = %inserted.amount, "deposit requested");
        Ok(inserted)
    }

    pub async fn approve(
        &self,
        admin: &CurrentIdentity,
        deposit_id: Uuid,
    ) -> Result<DepositRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        let deposit = queries::get_deposit_for_update(&mut tx, deposit_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deposit {}", deposit_id)))?;
        if deposit.status != STATUS_PENDING {
            return Err(AppError::Validation(format!(
                "deposit is already {}",
                deposit.status
            )));
        }

        let locked = queries::lock_accounts(&mut tx, &[deposit.account_id]).await?;
        let account = locked
            .first()
            .ok_or_else(|| AppError::NotFound(format!("Account {}", deposit.account_id)))?;
        if !account.can_credit() {
            return Err(AppError::AccountNotEligible(format!(
                "account is {}",
                account.status
            )));
        }

        queries::update_account_balance(&mut tx, account.id, &(&account.balance + &deposit.amount))
            .await?;

        queries::insert_transaction_record(
            &mut tx,
            &TransactionRecord {
                id: Uuid::new_v4(),
                customer_id: deposit.customer_id,
                account_id: account.id,
                kind: TX_DEPOSIT.to_string(),
                amount: deposit.amount.clone(),
                from_account: BANK_COUNTERPARTY.to_string(),
                to_account: account.account_number.clone(),
                status: STATUS_COMPLETED.to_string(),
                description: deposit
                    .reference
                    .clone()
                    .unwrap_or_else(|| "deposit".to_string()),
                transfer_id: None,
                settlement_id: None,
                created_at: Utc::now(),
            },
        )
        .await?;

        let updated = queries::update_deposit_decision(
            &mut tx,
            deposit.id,
            "approved",
            &admin.customer_id.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(deposit_id = %updated.id, amount = %updated.amount, "deposit approved");
        Ok(updated)
    }

    pub async fn reject(
        &self,
        admin: &CurrentIdentity,
        deposit_id: Uuid,
    ) -> Result<DepositRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        let deposit = queries::get_deposit_for_update(&mut tx, deposit_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deposit {}", deposit_id)))?;
        if deposit.status != STATUS_PENDING {
            return Err(AppError::Validation(format!(
                "deposit is already {}",
                deposit.status
            )));
        }

        let updated = queries::update_deposit_decision(
            &mut tx,
            deposit.id,
            "rejected",
            &admin.customer_id.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(deposit_id = %updated.id, "deposit rejected");
        Ok(updated)
    }
}
