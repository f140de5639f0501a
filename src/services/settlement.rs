use sqlx::PgPool;
use crate::db::models::{STATUS_COMPLETED, Settlement};
use crate::db::queries;
use uuid::Uuid;
use chrono::Utc;

use crate::error::AppError;
use bigdecimal::BigDecimal;

/// Back-office sweep that completes pending external payments. Payments
/// sit in `pending` from the moment the Executor debits the sender until
/// an operator runs this sweep.
#[derive(Clone)]
pub struct SettlementService {
    pool: PgPool,
}

impl SettlementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Settle every pending external payment up to "now". Returns `None`
    /// when there is nothing to settle.
    pub async fn run(&self) -> Result<Option<Settlement>, AppError> {
        let mut tx = self.pool.begin().await?;

        let end_time = Utc::now();

        // Candidate rows are locked until commit so a concurrent sweep
        // cannot settle them twice.
        let pending = queries::get_pending_external_payments(&mut tx, end_time).await?;

        if pending.is_empty() {
            tx.rollback().await?;
            return Ok(None);
        }

        let tx_count = pending.len() as i32;
        // Payment ledger rows carry the signed debit; the settlement total
        // is the positive outflow.
        let total_amount: BigDecimal = pending
            .iter()
            .map(|t| -t.amount.clone())
            .fold(BigDecimal::from(0), |acc, x| acc + x);

        let period_start = pending.iter().map(|t| t.created_at).min().unwrap_or(end_time);
        let period_end = pending.iter().map(|t| t.created_at).max().unwrap_or(end_time);

        let settlement = Settlement {
            id: Uuid::new_v4(),
            total_amount,
            tx_count,
            period_start,
            period_end,
            status: STATUS_COMPLETED.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let saved_settlement = queries::insert_settlement(&mut tx, &settlement).await?;

        let tx_ids: Vec<Uuid> = pending.iter().map(|t| t.id).collect();
        queries::mark_transactions_settled(&mut tx, &tx_ids, saved_settlement.id).await?;

        let transfer_ids: Vec<Uuid> = pending.iter().filter_map(|t| t.transfer_id).collect();
        if !transfer_ids.is_empty() {
            queries::mark_transfers_completed(&mut tx, &transfer_ids).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Settled {} external payments (ID: {})",
            tx_count,
            saved_settlement.id
        );

        Ok(Some(saved_settlement))
    }
}
