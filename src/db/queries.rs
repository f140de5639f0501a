use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use crate::db::audit::{
    AuditLog, AuditLogEntry, ACTOR_SYSTEM, ENTITY_ACCOUNT, ENTITY_CUSTOMER, ENTITY_DEPOSIT,
    ENTITY_LOAN, ENTITY_SETTLEMENT,
};
use crate::db::models::{
    Account, Customer, DepositRequest, LoanApplication, Settlement, TransactionRecord, Transfer,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

// --- Customer Queries ---

pub async fn insert_customer(pool: &PgPool, customer: &Customer) -> Result<Customer> {
    let mut transaction = pool.begin().await?;

    let result = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (
            id, full_name, email, role, approval_status, token_digest, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(customer.id)
    .bind(&customer.full_name)
    .bind(&customer.email)
    .bind(&customer.role)
    .bind(&customer.approval_status)
    .bind(&customer.token_digest)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .fetch_one(&mut *transaction)
    .await?;

    AuditLog::log_creation(
        &mut transaction,
        result.id,
        ENTITY_CUSTOMER,
        json!({
            "full_name": result.full_name,
            "email": result.email,
            "role": result.role,
            "approval_status": result.approval_status,
        }),
        ACTOR_SYSTEM,
    )
    .await?;

    transaction.commit().await?;
    Ok(result)
}

pub async fn get_customer(pool: &PgPool, id: Uuid) -> Result<Customer> {
    sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn get_customer_by_token_digest(
    pool: &PgPool,
    token_digest: &str,
) -> Result<Option<Customer>> {
    sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE token_digest = $1")
        .bind(token_digest)
        .fetch_optional(pool)
        .await
}

pub async fn list_customers_by_approval(
    pool: &PgPool,
    approval_status: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Customer>> {
    sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE approval_status = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(approval_status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn update_customer_approval(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    new_status: &str,
    actor: &str,
) -> Result<Option<Customer>> {
    let old = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await?;

    let Some(old) = old else {
        return Ok(None);
    };

    let updated = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET approval_status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(new_status)
    .bind(id)
    .fetch_one(&mut **executor)
    .await?;

    AuditLog::log_field_update(
        executor,
        id,
        ENTITY_CUSTOMER,
        "approval_status",
        json!(old.approval_status),
        json!(new_status),
        actor,
    )
    .await?;

    Ok(Some(updated))
}

// --- Account Queries ---

pub async fn insert_account(pool: &PgPool, account: &Account) -> Result<Account> {
    let mut transaction = pool.begin().await?;

    let result = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (
            id, customer_id, name, account_number, balance, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(account.customer_id)
    .bind(&account.name)
    .bind(&account.account_number)
    .bind(&account.balance)
    .bind(&account.status)
    .bind(account.created_at)
    .bind(account.updated_at)
    .fetch_one(&mut *transaction)
    .await?;

    AuditLog::log_creation(
        &mut transaction,
        result.id,
        ENTITY_ACCOUNT,
        json!({
            "customer_id": result.customer_id,
            "name": result.name,
            "account_number": result.account_number,
            "status": result.status,
        }),
        ACTOR_SYSTEM,
    )
    .await?;

    transaction.commit().await?;
    Ok(result)
}

pub async fn get_account(pool: &PgPool, id: Uuid) -> Result<Option<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_account_by_number(pool: &PgPool, account_number: &str) -> Result<Option<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_number = $1")
        .bind(account_number)
        .fetch_optional(pool)
        .await
}

pub async fn list_accounts_for_customer(pool: &PgPool, customer_id: Uuid) -> Result<Vec<Account>> {
    sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE customer_id = $1 ORDER BY created_at",
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await
}

pub async fn resolve_account_id_by_number(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account_number: &str,
) -> Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM accounts WHERE account_number = $1")
        .bind(account_number)
        .fetch_optional(&mut **executor)
        .await
}

/// Lock account rows for the remainder of the surrounding transaction.
/// Rows are locked in ascending id order: two opposing transfers lock the
/// same pair in the same order, so they serialize instead of deadlocking.
pub async fn lock_accounts(
    executor: &mut SqlxTransaction<'_, Postgres>,
    ids: &[Uuid],
) -> Result<Vec<Account>> {
    sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut **executor)
    .await
}

pub async fn update_account_balance(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    balance: &BigDecimal,
) -> Result<()> {
    sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE id = $2")
        .bind(balance)
        .bind(id)
        .execute(&mut **executor)
        .await?;

    Ok(())
}

pub async fn update_account_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    new_status: &str,
    actor: &str,
) -> Result<Option<Account>> {
    let old = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await?;

    let Some(old) = old else {
        return Ok(None);
    };

    let updated = sqlx::query_as::<_, Account>(
        "UPDATE accounts SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(new_status)
    .bind(id)
    .fetch_one(&mut **executor)
    .await?;

    AuditLog::log_field_update(
        executor,
        id,
        ENTITY_ACCOUNT,
        "status",
        json!(old.status),
        json!(new_status),
        actor,
    )
    .await?;

    Ok(Some(updated))
}

// --- Transfer Queries ---

pub async fn insert_transfer(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transfer: &Transfer,
) -> Result<Transfer> {
    sqlx::query_as::<_, Transfer>(
        r#"
        INSERT INTO transfers (
            id, idempotency_key, from_account_id, to_account_number, kind,
            amount, recipient_name, description, status, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(transfer.id)
    .bind(&transfer.idempotency_key)
    .bind(transfer.from_account_id)
    .bind(&transfer.to_account_number)
    .bind(&transfer.kind)
    .bind(&transfer.amount)
    .bind(&transfer.recipient_name)
    .bind(&transfer.description)
    .bind(&transfer.status)
    .bind(transfer.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_transfer(pool: &PgPool, id: Uuid) -> Result<Option<Transfer>> {
    sqlx::query_as::<_, Transfer>("SELECT * FROM transfers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_transfer_by_idempotency_key(
    pool: &PgPool,
    idempotency_key: &str,
) -> Result<Option<Transfer>> {
    sqlx::query_as::<_, Transfer>("SELECT * FROM transfers WHERE idempotency_key = $1")
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await
}

pub async fn mark_transfers_completed(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transfer_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("UPDATE transfers SET status = 'completed' WHERE id = ANY($1)")
        .bind(transfer_ids)
        .execute(&mut **executor)
        .await?;

    Ok(())
}

// --- Transaction (ledger) Queries ---

pub async fn insert_transaction_record(
    executor: &mut SqlxTransaction<'_, Postgres>,
    record: &TransactionRecord,
) -> Result<TransactionRecord> {
    sqlx::query_as::<_, TransactionRecord>(
        r#"
        INSERT INTO transactions (
            id, customer_id, account_id, kind, amount, from_account, to_account,
            status, description, transfer_id, settlement_id, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(record.id)
    .bind(record.customer_id)
    .bind(record.account_id)
    .bind(&record.kind)
    .bind(&record.amount)
    .bind(&record.from_account)
    .bind(&record.to_account)
    .bind(&record.status)
    .bind(&record.description)
    .bind(record.transfer_id)
    .bind(record.settlement_id)
    .bind(record.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn list_transactions_for_customer(
    pool: &PgPool,
    customer_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<TransactionRecord>> {
    sqlx::query_as::<_, TransactionRecord>(
        "SELECT * FROM transactions WHERE customer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(customer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn get_pending_external_payments(
    executor: &mut SqlxTransaction<'_, Postgres>,
    end_time: DateTime<Utc>,
) -> Result<Vec<TransactionRecord>> {
    sqlx::query_as::<_, TransactionRecord>(
        r#"
        SELECT * FROM transactions
        WHERE kind = 'payment'
        AND status = 'pending'
        AND settlement_id IS NULL
        AND created_at <= $1
        FOR UPDATE
        "#,
    )
    .bind(end_time)
    .fetch_all(&mut **executor)
    .await
}

pub async fn mark_transactions_settled(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx_ids: &[Uuid],
    settlement_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "UPDATE transactions SET status = 'completed', settlement_id = $1 WHERE id = ANY($2)",
    )
    .bind(settlement_id)
    .bind(tx_ids)
    .execute(&mut **executor)
    .await?;

    Ok(())
}

// --- Deposit Queries ---

pub async fn insert_deposit_request(pool: &PgPool, deposit: &DepositRequest) -> Result<DepositRequest> {
    let mut transaction = pool.begin().await?;

    let result = sqlx::query_as::<_, DepositRequest>(
        r#"
        INSERT INTO deposit_requests (
            id, account_id, customer_id, amount, reference, status, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(deposit.id)
    .bind(deposit.account_id)
    .bind(deposit.customer_id)
    .bind(&deposit.amount)
    .bind(&deposit.reference)
    .bind(&deposit.status)
    .bind(deposit.created_at)
    .fetch_one(&mut *transaction)
    .await?;

    AuditLog::log_creation(
        &mut transaction,
        result.id,
        ENTITY_DEPOSIT,
        json!({
            "account_id": result.account_id,
            "amount": result.amount.to_string(),
            "status": result.status,
        }),
        ACTOR_SYSTEM,
    )
    .await?;

    transaction.commit().await?;
    Ok(result)
}

pub async fn get_deposit_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<DepositRequest>> {
    sqlx::query_as::<_, DepositRequest>("SELECT * FROM deposit_requests WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn list_deposits_for_customer(
    pool: &PgPool,
    customer_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<DepositRequest>> {
    sqlx::query_as::<_, DepositRequest>(
        "SELECT * FROM deposit_requests WHERE customer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(customer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_deposits_by_status(
    pool: &PgPool,
    status: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<DepositRequest>> {
    sqlx::query_as::<_, DepositRequest>(
        "SELECT * FROM deposit_requests WHERE status = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn update_deposit_decision(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    new_status: &str,
    decided_by: &str,
) -> Result<DepositRequest> {
    let updated = sqlx::query_as::<_, DepositRequest>(
        r#"
        UPDATE deposit_requests
        SET status = $1, decided_by = $2, decided_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(new_status)
    .bind(decided_by)
    .bind(id)
    .fetch_one(&mut **executor)
    .await?;

    AuditLog::log_field_update(
        executor,
        id,
        ENTITY_DEPOSIT,
        "status",
        json!("pending"),
        json!(new_status),
        decided_by,
    )
    .await?;

    Ok(updated)
}

// --- Loan Queries ---

pub async fn insert_loan_application(
    pool: &PgPool,
    loan: &LoanApplication,
) -> Result<LoanApplication> {
    let mut transaction = pool.begin().await?;

    let result = sqlx::query_as::<_, LoanApplication>(
        r#"
        INSERT INTO loan_applications (
            id, customer_id, account_id, principal, annual_rate_bps, term_months,
            monthly_payment, purpose, status, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(loan.id)
    .bind(loan.customer_id)
    .bind(loan.account_id)
    .bind(&loan.principal)
    .bind(loan.annual_rate_bps)
    .bind(loan.term_months)
    .bind(&loan.monthly_payment)
    .bind(&loan.purpose)
    .bind(&loan.status)
    .bind(loan.created_at)
    .fetch_one(&mut *transaction)
    .await?;

    AuditLog::log_creation(
        &mut transaction,
        result.id,
        ENTITY_LOAN,
        json!({
            "customer_id": result.customer_id,
            "account_id": result.account_id,
            "principal": result.principal.to_string(),
            "annual_rate_bps": result.annual_rate_bps,
            "term_months": result.term_months,
            "monthly_payment": result.monthly_payment.to_string(),
            "status": result.status,
        }),
        ACTOR_SYSTEM,
    )
    .await?;

    transaction.commit().await?;
    Ok(result)
}

pub async fn get_loan_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<LoanApplication>> {
    sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn list_loans_for_customer(
    pool: &PgPool,
    customer_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LoanApplication>> {
    sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM loan_applications WHERE customer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(customer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_loans_by_status(
    pool: &PgPool,
    status: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<LoanApplication>> {
    sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM loan_applications WHERE status = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn update_loan_decision(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    new_status: &str,
    decided_by: &str,
) -> Result<LoanApplication> {
    let updated = sqlx::query_as::<_, LoanApplication>(
        r#"
        UPDATE loan_applications
        SET status = $1, decided_by = $2, decided_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(new_status)
    .bind(decided_by)
    .bind(id)
    .fetch_one(&mut **executor)
    .await?;

    AuditLog::log_field_update(
        executor,
        id,
        ENTITY_LOAN,
        "status",
        json!("pending"),
        json!(new_status),
        decided_by,
    )
    .await?;

    Ok(updated)
}

// --- Settlement Queries ---

pub async fn insert_settlement(
    executor: &mut SqlxTransaction<'_, Postgres>,
    settlement: &Settlement,
) -> Result<Settlement> {
    let result = sqlx::query_as::<_, Settlement>(
        r#"
        INSERT INTO settlements (
            id, total_amount, tx_count, period_start, period_end, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(settlement.id)
    .bind(&settlement.total_amount)
    .bind(settlement.tx_count)
    .bind(settlement.period_start)
    .bind(settlement.period_end)
    .bind(&settlement.status)
    .bind(settlement.created_at)
    .bind(settlement.updated_at)
    .fetch_one(&mut **executor)
    .await?;

    AuditLog::log_creation(
        executor,
        result.id,
        ENTITY_SETTLEMENT,
        json!({
            "total_amount": result.total_amount.to_string(),
            "tx_count": result.tx_count,
            "period_start": result.period_start.to_rfc3339(),
            "period_end": result.period_end.to_rfc3339(),
            "status": result.status,
        }),
        ACTOR_SYSTEM,
    )
    .await?;

    Ok(result)
}

pub async fn get_settlement(pool: &PgPool, id: Uuid) -> Result<Settlement> {
    sqlx::query_as::<_, Settlement>("SELECT * FROM settlements WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn list_settlements(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Settlement>> {
    sqlx::query_as::<_, Settlement>(
        "SELECT * FROM settlements ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// --- Audit Log & Report Queries ---

pub async fn get_audit_logs(
    pool: &PgPool,
    entity_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<AuditLogEntry>> {
    sqlx::query_as::<_, AuditLogEntry>(
        r#"
        SELECT * FROM audit_logs
        WHERE entity_id = $1
        ORDER BY timestamp DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(entity_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn get_transaction_status_counts(
    pool: &PgPool,
) -> Result<std::collections::HashMap<String, i64>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM transactions GROUP BY status")
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().collect())
}

pub async fn get_transaction_totals_by_kind(
    pool: &PgPool,
) -> Result<Vec<(String, BigDecimal)>> {
    sqlx::query_as("SELECT kind, SUM(amount) FROM transactions GROUP BY kind ORDER BY kind")
        .fetch_all(pool)
        .await
}
