use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::DispatchError;
use crate::dossier::{Role, UserId};

/// Resolves "every user holding role X" when a notification is dispatched.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AudienceResolver: Send + Sync {
    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>, DispatchError>;
}

/// Role assignments held in memory, editable at runtime.
#[derive(Debug, Default)]
pub struct StaticAudience {
    assignments: RwLock<HashMap<Role, Vec<UserId>>>,
}

impl StaticAudience {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, user: UserId, role: Role) {
        let mut assignments = self.assignments.write().await;
        let users = assignments.entry(role).or_default();
        if !users.contains(&user) {
            users.push(user);
        }
    }

    pub async fn revoke(&self, user: &UserId, role: Role) {
        if let Some(users) = self.assignments.write().await.get_mut(&role) {
            users.retain(|u| u != user);
        }
    }
}

#[async_trait]
impl AudienceResolver for StaticAudience {
    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>, DispatchError> {
        Ok(self
            .assignments
            .read()
            .await
            .get(&role)
            .cloned()
            .unwrap_or_default())
    }
}

/// Caches another resolver's answers for a short time.
pub struct CachedAudience {
    inner: Arc<dyn AudienceResolver>,
    cache: Cache<Role, Arc<Vec<UserId>>>,
}

impl CachedAudience {
    pub fn new(inner: Arc<dyn AudienceResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(64).time_to_live(ttl).build(),
        }
    }
}

impl std::fmt::Debug for CachedAudience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAudience")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl AudienceResolver for CachedAudience {
    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>, DispatchError> {
        if let Some(users) = self.cache.get(&role).await {
            debug!(role = %role, "Audience cache hit");
            return Ok(users.as_ref().clone());
        }
        let users = self.inner.users_with_role(role).await?;
        self.cache.insert(role, Arc::new(users.clone())).await;
        Ok(users)
    }
}
