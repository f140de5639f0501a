use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{APPROVAL_APPROVED, ROLE_ADMIN};
use crate::db::queries;

/// Identity resolved for the current request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentIdentity {
    pub customer_id: Uuid,
    pub role: String,
    pub approval_status: String,
}

impl CurrentIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn is_approved(&self) -> bool {
        self.approval_status == APPROVAL_APPROVED || self.is_admin()
    }
}

pub fn generate_token() -> String {
    format!(
        "mc_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Only the digest is ever stored or used as a lookup key.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

struct CachedIdentity {
    identity: CurrentIdentity,
    resolved_at: Instant,
}

/// Session cache keyed by token digest. Entries live for `ttl` and are
/// re-resolved from the database on miss; `refresh` re-resolves
/// imperatively and `expire` drops the entry (logout, approval changes).
pub struct SessionCache {
    entries: RwLock<HashMap<String, CachedIdentity>>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    pub async fn get(&self, token_digest: &str) -> Option<CurrentIdentity> {
        let entries = self.entries.read().await;
        let cached = entries.get(token_digest)?;
        if cached.resolved_at.elapsed() >= self.ttl {
            return None;
        }
        Some(cached.identity.clone())
    }

    /// Resolve from the database and cache the result. Returns `None` for
    /// an unknown token; a previously cached entry for it is dropped.
    pub async fn refresh(
        &self,
        pool: &PgPool,
        token_digest: &str,
    ) -> Result<Option<CurrentIdentity>, sqlx::Error> {
        let customer = queries::get_customer_by_token_digest(pool, token_digest).await?;

        let mut entries = self.entries.write().await;
        match customer {
            Some(customer) => {
                let identity = CurrentIdentity {
                    customer_id: customer.id,
                    role: customer.role,
                    approval_status: customer.approval_status,
                };
                entries.insert(
                    token_digest.to_string(),
                    CachedIdentity {
                        identity: identity.clone(),
                        resolved_at: Instant::now(),
                    },
                );
                Ok(Some(identity))
            }
            None => {
                entries.remove(token_digest);
                Ok(None)
            }
        }
    }

    pub async fn expire(&self, token_digest: &str) {
        self.entries.write().await.remove(token_digest);
    }
}
