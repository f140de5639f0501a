use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

pub const ENTITY_CUSTOMER: &str = "customer";
pub const ENTITY_ACCOUNT: &str = "account";
pub const ENTITY_TRANSFER: &str = "transfer";
pub const ENTITY_TRANSACTION: &str = "transaction";
pub const ENTITY_DEPOSIT: &str = "deposit";
pub const ENTITY_LOAN: &str = "loan";
pub const ENTITY_SETTLEMENT: &str = "settlement";

pub const ACTOR_SYSTEM: &str = "system";

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: String,
    pub action: String,
    pub old_val: Option<Value>,
    pub new_val: Option<Value>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

/// Audit writes always go through the caller's transaction so the trail
/// commits or rolls back together with the mutation it describes.
pub struct AuditLog;

impl AuditLog {
    pub async fn log_creation(
        executor: &mut SqlxTransaction<'_, Postgres>,
        entity_id: Uuid,
        entity_type: &str,
        new_val: Value,
        actor: &str,
    ) -> Result<()> {
        Self::insert(executor, entity_id, entity_type, "created", None, Some(new_val), actor).await
    }

    pub async fn log_field_update(
        executor: &mut SqlxTransaction<'_, Postgres>,
        entity_id: Uuid,
        entity_type: &str,
        field: &str,
        old_val: Value,
        new_val: Value,
        actor: &str,
    ) -> Result<()> {
        Self::insert(
            executor,
            entity_id,
            entity_type,
            &format!("updated:{}", field),
            Some(old_val),
            Some(new_val),
            actor,
        )
        .await
    }

    async fn insert(
        executor: &mut SqlxTransaction<'_, Postgres>,
        entity_id: Uuid,
        entity_type: &str,
        action: &str,
        old_val: Option<Value>,
        new_val: Option<Value>,
        actor: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, entity_id, entity_type, action, old_val, new_val, actor, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entity_id)
        .bind(entity_type)
        .bind(action)
        .bind(old_val)
        .bind(new_val)
        .bind(actor)
        .execute(&mut **executor)
        .await?;

        Ok(())
    }
}
