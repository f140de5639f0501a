use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::Utc;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::models::{
    LoanApplication, STATUS_COMPLETED, STATUS_PENDING, TX_LOAN_DISBURSEMENT, TransactionRecord,
};
use crate::db::queries;
use crate::error::AppError;
use crate::services::deposit::BANK_COUNTERPARTY;
use crate::session::CurrentIdentity;
use crate::validation::{
    DESCRIPTION_MAX_LEN, ValidationError, validate_amount_scale, validate_max_len,
    validate_positive_amount, validate_required,
};

pub const MAX_ANNUAL_RATE_BPS: i32 = 5000;
pub const MAX_TERM_MONTHS: i32 = 480;

#[derive(Debug)]
pub struct NewLoan {
    pub account_id: Uuid,
    pub principal: BigDecimal,
    pub annual_rate_bps: i32,
    pub term_months: i32,
    pub purpose: String,
}

/// Loan applications carry a payment quote computed at application time;
/// approval disburses the principal to the chosen account.
#[derive(Clone)]
pub struct LoanService {
    pool: PgPool,
}

impl LoanService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn apply(
        &self,
        identity: &CurrentIdentity,
        loan: NewLoan,
    ) -> Result<LoanApplication, AppError> {
        validate_loan(&loan)?;

        let account = queries::get_account(&self.pool, loan.account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {}", loan.account_id)))?;
        if account.customer_id != identity.customer_id {
            return Err(AppError::AccountNotEligible(
                "account is not owned by the caller".to_string(),
            ));
        }

        let monthly_payment =
            monthly_payment(&loan.principal, loan.annual_rate_bps, loan.term_months)
                .ok_or_else(|| AppError::Validation("loan terms are out of range".to_string()))?;

        let now = Utc::now();
        let application = LoanApplication {
            id: Uuid::new_v4(),
            customer_id: identity.customer_id,
            account_id: account.id,
            principal: loan.principal,
            annual_rate_bps: loan.annual_rate_bps,
            term_months: loan.term_months,
            monthly_payment,
            purpose: loan.purpose,
            status: STATUS_PENDING.to_string(),
            decided_by: None,
            decided_at: None,
            created_at: now,
        };

        let inserted = queries::insert_loan_application(&self.pool, &application).await?;
        tracing::info!(
            loan_id = %inserted.id,
            principal = %inserted.principal,
            monthly_payment = %inserted.monthly_payment,
            "loan application submitted"
        );
        Ok(inserted)
    }

    pub async fn approve(
        &self,
        admin: &CurrentIdentity,
        loan_id: Uuid,
    ) -> Result<LoanApplication, AppError> {
        let mut tx = self.pool.begin().await?;

        let loan = queries::get_loan_for_update(&mut tx, loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {}", loan_id)))?;
        if loan.status != STATUS_PENDING {
            return Err(AppError::Validation(format!(
                "loan is already {}",
                loan.status
            )));
        }

        let locked = queries::lock_accounts(&mut tx, &[loan.account_id]).await?;
        let account = locked
            .first()
            .ok_or_else(|| AppError::NotFound(format!("Account {}", loan.account_id)))?;
        if !account.can_credit() {
            return Err(AppError::AccountNotEligible(format!(
                "account is {}",
                account.status
            )));
        }

        queries::update_account_balance(&mut tx, account.id, &(&account.balance + &loan.principal))
            .await?;

        queries::insert_transaction_record(
            &mut tx,
            &TransactionRecord {
                id: Uuid::new_v4(),
                customer_id: loan.customer_id,
                account_id: account.id,
                kind: TX_LOAN_DISBURSEMENT.to_string(),
                amount: loan.principal.clone(),
                from_account: BANK_COUNTERPARTY.to_string(),
                to_account: account.account_number.clone(),
                status: STATUS_COMPLETED.to_string(),
                description: format!("loan disbursement: {}", loan.purpose),
                transfer_id: None,
                settlement_id: None,
                created_at: Utc::now(),
            },
        )
        .await?;

        let updated = queries::update_loan_decision(
            &mut tx,
            loan.id,
            "approved",
            &admin.customer_id.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(loan_id = %updated.id, principal = %updated.principal, "loan approved");
        Ok(updated)
    }

    pub async fn reject(
        &self,
        admin: &CurrentIdentity,
        loan_id: Uuid,
    ) -> Result<LoanApplication, AppError> {
        let mut tx = self.pool.begin().await?;

        let loan = queries::get_loan_for_update(&mut tx, loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {}", loan_id)))?;
        if loan.status != STATUS_PENDING {
            return Err(AppError::Validation(format!(
                "loan is already {}",
                loan.status
            )));
        }

        let updated = queries::update_loan_decision(
            &mut tx,
            loan.id,
            "rejected",
            &admin.customer_id.to_string(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(loan_id = %updated.id, "loan rejected");
        Ok(updated)
    }
}

fn validate_loan(loan: &NewLoan) -> Result<(), ValidationError> {
    validate_positive_amount(&loan.principal)?;
    validate_amount_scale(&loan.principal)?;
    validate_required("purpose", &loan.purpose)?;
    validate_max_len("purpose", &loan.purpose, DESCRIPTION_MAX_LEN)?;

    if !(0..=MAX_ANNUAL_RATE_BPS).contains(&loan.annual_rate_bps) {
        return Err(ValidationError::new(
            "annual_rate_bps",
            format!("must be between 0 and {}", MAX_ANNUAL_RATE_BPS),
        ));
    }
    if !(1..=MAX_TERM_MONTHS).contains(&loan.term_months) {
        return Err(ValidationError::new(
            "term_months",
            format!("must be between 1 and {}", MAX_TERM_MONTHS),
        ));
    }

    Ok(())
}

/// Standard annuity formula `P * r(1+r)^n / ((1+r)^n - 1)` with `r` the
/// monthly rate. Computed in f64 and rounded to cents; a quote, not a
/// ledger amount.
pub fn monthly_payment(
    principal: &BigDecimal,
    annual_rate_bps: i32,
    term_months: i32,
) -> Option<BigDecimal> {
    let p = principal.to_f64()?;
    let n = term_months as f64;
    if n < 1.0 {
        return None;
    }

    let monthly_rate = annual_rate_bps as f64 / 10_000.0 / 12.0;
    let payment = if monthly_rate == 0.0 {
        p / n
    } else {
        let growth = (1.0 + monthly_rate).powf(n);
        p * monthly_rate * growth / (growth - 1.0)
    };

    if !payment.is_finite() {
        return None;
    }

    BigDecimal::from_str(&format!("{:.2}", payment)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan() -> NewLoan {
        NewLoan {
            account_id: Uuid::new_v4(),
            principal: BigDecimal::from(12000),
            annual_rate_bps: 600,
            term_months: 12,
            purpose: "car".to_string(),
        }
    }

    #[test]
    fn quotes_interest_free_loan_as_straight_division() {
        let payment = monthly_payment(&BigDecimal::from(1200), 0, 12).unwrap();
        assert_eq!(payment, BigDecimal::from(100));
    }

    #[test]
    fn quotes_annuity_payment() {
        // 12,000 at 6% over 12 months: 1,032.80/month
        let payment = monthly_payment(&BigDecimal::from(12000), 600, 12).unwrap();
        assert_eq!(payment, BigDecimal::from_str("1032.80").unwrap());
    }

    #[test]
    fn total_repayment_exceeds_principal_when_rate_positive() {
        let payment = monthly_payment(&BigDecimal::from(10000), 950, 24).unwrap();
        let total = payment * BigDecimal::from(24);
        assert!(total > BigDecimal::from(10000));
    }

    #[test]
    fn accepts_valid_application() {
        assert!(validate_loan(&loan()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_terms() {
        let mut bad = loan();
        bad.term_months = 0;
        assert!(validate_loan(&bad).is_err());

        let mut bad = loan();
        bad.annual_rate_bps = 9000;
        assert!(validate_loan(&bad).is_err());

        let mut bad = loan();
        bad.principal = BigDecimal::from(0);
        assert!(validate_loan(&bad).is_err());

        let mut bad = loan();
        bad.purpose = "  ".to_string();
        assert!(validate_loan(&bad).is_err());
    }
}
