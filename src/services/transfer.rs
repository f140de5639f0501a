use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::audit::{AuditLog, ENTITY_TRANSFER};
use crate::db::models::{
    Account, STATUS_COMPLETED, STATUS_PENDING, TRANSFER_EXTERNAL, TRANSFER_INTERNAL,
    TX_PAYMENT, TX_TRANSFER_IN, TX_TRANSFER_OUT, TransactionRecord, Transfer,
};
use crate::db::queries;
use crate::error::AppError;
use crate::session::CurrentIdentity;
use crate::validation::{
    ALLOWED_TRANSFER_KINDS, DESCRIPTION_MAX_LEN, EXTERNAL_ACCOUNT_MAX_LEN, RECIPIENT_NAME_MAX_LEN,
    ValidationError, sanitize_string, validate_account_number, validate_amount_scale,
    validate_enum, validate_max_len, validate_positive_amount, validate_required,
};

#[derive(Debug)]
pub struct NewTransfer {
    pub from_account_id: Uuid,
    pub kind: String,
    pub to_account_number: String,
    pub recipient_name: Option<String>,
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Moves funds between accounts. Every execution runs as one database
/// transaction: the debit, the credit, the ledger rows and the audit
/// trail commit together or not at all.
#[derive(Clone)]
pub struct TransferService {
    pool: PgPool,
}

impl TransferService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn execute(
        &self,
        identity: &CurrentIdentity,
        mut request: NewTransfer,
    ) -> Result<Transfer, AppError> {
        validate_request(&request)?;
        request.to_account_number = sanitize_string(&request.to_account_number);

        // Replays with a known key return the recorded transfer without
        // touching any balance.
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = queries::get_transfer_by_idempotency_key(&self.pool, key).await?
            {
                tracing::info!(transfer_id = %existing.id, "idempotent replay of transfer");
                return Ok(existing);
            }
        }

        let result = match request.kind.as_str() {
            TRANSFER_INTERNAL => self.execute_internal(identity, &request).await,
            TRANSFER_EXTERNAL => self.execute_external(identity, &request).await,
            _ => unreachable!("kind validated above"),
        };

        match result {
            // A concurrent submission with the same key won the insert
            // race; return its transfer.
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                match request.idempotency_key.as_deref() {
                    Some(key) => queries::get_transfer_by_idempotency_key(&self.pool, key)
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal(
                                "duplicate transfer vanished after conflict".to_string(),
                            )
                        }),
                    None => Err(AppError::Database(err)),
                }
            }
            other => other,
        }
    }

    async fn execute_internal(
        &self,
        identity: &CurrentIdentity,
        request: &NewTransfer,
    ) -> Result<Transfer, AppError> {
        let mut tx = self.pool.begin().await?;

        let recipient_id = queries::resolve_account_id_by_number(&mut tx, &request.to_account_number)
            .await?
            .ok_or_else(|| AppError::RecipientNotFound(request.to_account_number.clone()))?;

        if recipient_id == request.from_account_id {
            return Err(AppError::SelfTransferRejected);
        }

        let locked = queries::lock_accounts(&mut tx, &[request.from_account_id, recipient_id]).await?;
        let source = find_account(&locked, request.from_account_id)
            .ok_or_else(|| AppError::NotFound(format!("Account {}", request.from_account_id)))?;
        let recipient = find_account(&locked, recipient_id)
            .ok_or_else(|| AppError::RecipientNotFound(request.to_account_number.clone()))?;

        check_source_eligibility(source, identity)?;
        if !recipient.can_credit() {
            return Err(AppError::AccountNotEligible(format!(
                "recipient account is {}",
                recipient.status
            )));
        }
        if source.balance < request.amount {
            return Err(AppError::InsufficientFunds);
        }

        let transfer = queries::insert_transfer(
            &mut tx,
            &build_transfer(request, STATUS_COMPLETED),
        )
        .await?;

        queries::update_account_balance(&mut tx, source.id, &(&source.balance - &request.amount))
            .await?;
        queries::update_account_balance(
            &mut tx,
            recipient.id,
            &(&recipient.balance + &request.amount),
        )
        .await?;

        let description = transfer.description.clone();
        queries::insert_transaction_record(
            &mut tx,
            &ledger_row(
                source,
                TX_TRANSFER_OUT,
                -request.amount.clone(),
                source,
                recipient,
                STATUS_COMPLETED,
                &description,
                transfer.id,
            ),
        )
        .await?;
        queries::insert_transaction_record(
            &mut tx,
            &ledger_row(
                recipient,
                TX_TRANSFER_IN,
                request.amount.clone(),
                source,
                recipient,
                STATUS_COMPLETED,
                &description,
                transfer.id,
            ),
        )
        .await?;

        AuditLog::log_creation(
            &mut tx,
            transfer.id,
            ENTITY_TRANSFER,
            serde_json::json!({
                "kind": transfer.kind,
                "from_account": source.account_number,
                "to_account": recipient.account_number,
                "amount": transfer.amount.to_string(),
                "status": transfer.status,
            }),
            &identity.customer_id.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            transfer_id = %transfer.id,
            amount = %transfer.amount,
            "internal transfer completed"
        );

        Ok(transfer)
    }

    async fn execute_external(
        &self,
        identity: &CurrentIdentity,
        request: &NewTransfer,
    ) -> Result<Transfer, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = queries::lock_accounts(&mut tx, &[request.from_account_id]).await?;
        let source = find_account(&locked, request.from_account_id)
            .ok_or_else(|| AppError::NotFound(format!("Account {}", request.from_account_id)))?;

        check_source_eligibility(source, identity)?;
        if source.balance < request.amount {
            return Err(AppError::InsufficientFunds);
        }

        // Only the sender side is reflected; the payment stays pending
        // until the back-office settlement sweep completes it.
        let transfer = queries::insert_transfer(
            &mut tx,
            &build_transfer(request, STATUS_PENDING),
        )
        .await?;

        queries::update_account_balance(&mut tx, source.id, &(&source.balance - &request.amount))
            .await?;

        let description = transfer.description.clone();
        queries::insert_transaction_record(
            &mut tx,
            &TransactionRecord {
                id: Uuid::new_v4(),
                customer_id: source.customer_id,
                account_id: source.id,
                kind: TX_PAYMENT.to_string(),
                amount: -request.amount.clone(),
                from_account: source.account_number.clone(),
                to_account: request.to_account_number.clone(),
                status: STATUS_PENDING.to_string(),
                description,
                transfer_id: Some(transfer.id),
                settlement_id: None,
                created_at: Utc::now(),
            },
        )
        .await?;

        AuditLog::log_creation(
            &mut tx,
            transfer.id,
            ENTITY_TRANSFER,
            serde_json::json!({
                "kind": transfer.kind,
                "from_account": source.account_number,
                "to_account": request.to_account_number,
                "recipient_name": transfer.recipient_name,
                "amount": transfer.amount.to_string(),
                "status": transfer.status,
            }),
            &identity.customer_id.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            transfer_id = %transfer.id,
            amount = %transfer.amount,
            "external payment recorded"
        );

        Ok(transfer)
    }
}

fn validate_request(request: &NewTransfer) -> Result<(), ValidationError> {
    validate_enum("kind", &request.kind, ALLOWED_TRANSFER_KINDS)?;

    if request.kind == TRANSFER_INTERNAL {
        validate_account_number("to_account_number", &request.to_account_number)?;
    } else {
        let number = sanitize_string(&request.to_account_number);
        validate_required("to_account_number", &number)?;
        validate_max_len("to_account_number", &number, EXTERNAL_ACCOUNT_MAX_LEN)?;

        let name = request.recipient_name.as_deref().unwrap_or("");
        validate_required("recipient_name", name)?;
        validate_max_len("recipient_name", name, RECIPIENT_NAME_MAX_LEN)?;
    }

    validate_positive_amount(&request.amount)?;
    validate_amount_scale(&request.amount)?;

    if let Some(description) = &request.description {
        validate_max_len("description", description, DESCRIPTION_MAX_LEN)?;
    }

    Ok(())
}

fn check_source_eligibility(source: &Account, identity: &CurrentIdentity) -> Result<(), AppError> {
    if source.customer_id != identity.customer_id {
        return Err(AppError::AccountNotEligible(
            "account is not owned by the caller".to_string(),
        ));
    }
    if !source.can_debit() {
        return Err(AppError::AccountNotEligible(format!(
            "account is {}",
            source.status
        )));
    }
    Ok(())
}

fn build_transfer(request: &NewTransfer, status: &str) -> Transfer {
    Transfer {
        id: Uuid::new_v4(),
        idempotency_key: request.idempotency_key.clone(),
        from_account_id: request.from_account_id,
        to_account_number: sanitize_string(&request.to_account_number),
        kind: request.kind.clone(),
        amount: request.amount.clone(),
        recipient_name: request.recipient_name.as_deref().map(sanitize_string),
        description: request
            .description
            .clone()
            .unwrap_or_else(|| format!("{} to {}", request.kind, request.to_account_number)),
        status: status.to_string(),
        created_at: Utc::now(),
    }
}

#[allow(clippy::too_many_arguments)]
fn ledger_row(
    owner: &Account,
    kind: &str,
    amount: BigDecimal,
    source: &Account,
    recipient: &Account,
    status: &str,
    description: &str,
    transfer_id: Uuid,
) -> TransactionRecord {
    TransactionRecord {
        id: Uuid::new_v4(),
        customer_id: owner.customer_id,
        account_id: owner.id,
        kind: kind.to_string(),
        amount,
        from_account: source.account_number.clone(),
        to_account: recipient.account_number.clone(),
        status: status.to_string(),
        description: description.to_string(),
        transfer_id: Some(transfer_id),
        settlement_id: None,
        created_at: Utc::now(),
    }
}

fn find_account(accounts: &[Account], id: Uuid) -> Option<&Account> {
    accounts.iter().find(|account| account.id == id)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request(kind: &str) -> NewTransfer {
        NewTransfer {
            from_account_id: Uuid::new_v4(),
            kind: kind.to_string(),
            to_account_number: "9876543210".to_string(),
            recipient_name: None,
            amount: BigDecimal::from_str("25.00").unwrap(),
            description: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn accepts_valid_internal_request() {
        assert!(validate_request(&request("internal")).is_ok());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(validate_request(&request("wire")).is_err());
    }

    #[test]
    fn rejects_malformed_internal_account_number() {
        let mut req = request("internal");
        req.to_account_number = "12AB".to_string();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn external_requires_recipient_name() {
        let mut req = request("external");
        req.to_account_number = "DE89370400440532013000".to_string();
        assert!(validate_request(&req).is_err());

        req.recipient_name = Some("Jordan Elm".to_string());
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let mut req = request("internal");
        req.amount = BigDecimal::from(0);
        assert!(validate_request(&req).is_err());

        req.amount = BigDecimal::from(-5);
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn rejects_sub_cent_amounts() {
        let mut req = request("internal");
        req.amount = BigDecimal::from_str("10.005").unwrap();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn synthesizes_description_when_absent() {
        let transfer = build_transfer(&request("internal"), STATUS_COMPLETED);
        assert_eq!(transfer.description, "internal to 9876543210");
    }

    #[test]
    fn keeps_caller_description() {
        let mut req = request("internal");
        req.description = Some("rent august".to_string());
        let transfer = build_transfer(&req, STATUS_COMPLETED);
        assert_eq!(transfer.description, "rent august");
    }

    #[test]
    fn eligibility_rejects_foreign_and_frozen_accounts() {
        let identity = CurrentIdentity {
            customer_id: Uuid::new_v4(),
            role: "customer".to_string(),
            approval_status: "approved".to_string(),
        };
        let mut account = Account::new(identity.customer_id, "Main".to_string(), "1111111111".to_string());
        account.status = "active".to_string();
        assert!(check_source_eligibility(&account, &identity).is_ok());

        account.status = "frozen".to_string();
        assert!(matches!(
            check_source_eligibility(&account, &identity),
            Err(AppError::AccountNotEligible(_))
        ));

        account.status = "active".to_string();
        account.customer_id = Uuid::new_v4();
        assert!(matches!(
            check_source_eligibility(&account, &identity),
            Err(AppError::AccountNotEligible(_))
        ));
    }
}
