use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use uuid::Uuid;

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_ADMIN: &str = "admin";

pub const APPROVAL_PENDING: &str = "pending";
pub const APPROVAL_APPROVED: &str = "approved";
pub const APPROVAL_REJECTED: &str = "rejected";

pub const ACCOUNT_PENDING: &str = "pending";
pub const ACCOUNT_ACTIVE: &str = "active";
pub const ACCOUNT_FROZEN: &str = "frozen";
pub const ACCOUNT_CLOSED: &str = "closed";

pub const TX_TRANSFER_IN: &str = "transfer_in";
pub const TX_TRANSFER_OUT: &str = "transfer_out";
pub const TX_PAYMENT: &str = "payment";
pub const TX_DEPOSIT: &str = "deposit";
pub const TX_LOAN_DISBURSEMENT: &str = "loan_disbursement";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

pub const TRANSFER_INTERNAL: &str = "internal";
pub const TRANSFER_EXTERNAL: &str = "external";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub approval_status: String,
    #[serde(skip_serializing)]
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(full_name: String, email: String, token_digest: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_name,
            email,
            role: ROLE_CUSTOMER.to_string(),
            approval_status: APPROVAL_PENDING.to_string(),
            token_digest,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub account_number: String,
    pub balance: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(customer_id: Uuid, name: String, account_number: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            name,
            account_number,
            balance: BigDecimal::from(0),
            status: ACCOUNT_PENDING.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Debits require a fully open account.
    pub fn can_debit(&self) -> bool {
        self.status == ACCOUNT_ACTIVE
    }

    /// Frozen accounts still accept credits; pending and closed ones do not.
    pub fn can_credit(&self) -> bool {
        self.status == ACCOUNT_ACTIVE || self.status == ACCOUNT_FROZEN
    }
}

/// Persisted transfer intent. One row per submitted transfer; the
/// idempotency key (when the caller sends one) is unique, so a replayed
/// submission resolves to the original row instead of a second debit.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub idempotency_key: Option<String>,
    pub from_account_id: Uuid,
    pub to_account_number: String,
    pub kind: String,
    pub amount: BigDecimal,
    pub recipient_name: Option<String>,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger entry. Never updated after insert except when a
/// pending external payment is settled (status + settlement_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub amount: BigDecimal,
    pub from_account: String,
    pub to_account: String,
    pub status: String,
    pub description: String,
    pub transfer_id: Option<Uuid>,
    pub settlement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DepositRequest {
    pub id: Uuid,
    pub account_id: Uuid,
    pub customer_id: Uuid,
    pub amount: BigDecimal,
    pub reference: Option<String>,
    pub status: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DepositRequest {
    pub fn new(
        account_id: Uuid,
        customer_id: Uuid,
        amount: BigDecimal,
        reference: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            customer_id,
            amount,
            reference,
            status: STATUS_PENDING.to_string(),
            decided_by: None,
            decided_at: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub account_id: Uuid,
    pub principal: BigDecimal,
    pub annual_rate_bps: i32,
    pub term_months: i32,
    pub monthly_payment: BigDecimal,
    pub purpose: String,
    pub status: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub total_amount: BigDecimal,
    pub tx_count: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
