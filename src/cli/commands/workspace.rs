use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::seed::SeedFixture;
use crate::config::DossierFlowConfig;
use crate::notifications::{
    AudienceResolver, CachedAudience, DeliveryRetryHandler, NotificationDispatcher,
    NotificationSink, RetryConfig, StaticAudience, TracingSink,
};
use crate::shutdown::ShutdownCoordinator;
use crate::store::{InMemoryStore, WorkflowStore};
use crate::workflows::WorkflowEngine;

#[cfg(feature = "database")]
use crate::config::DatabaseConfig;
#[cfg(feature = "database")]
use crate::database::DatabaseManager;

/// A wired engine with its dispatcher, ready for one CLI command.
pub struct Workspace {
    engine: WorkflowEngine,
    shutdown: ShutdownCoordinator,
    #[cfg(feature = "database")]
    database: Option<DatabaseManager>,
}

impl Workspace {
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Process-local workspace seeded from an optional fixture.
    pub async fn in_memory(settings: &DossierFlowConfig, seed: Option<&Path>) -> Result<Self> {
        let fixture = seed.map(SeedFixture::load).transpose()?.unwrap_or_default();
        let store = Arc::new(InMemoryStore::new());
        let audience = Arc::new(StaticAudience::new());

        fixture.apply_reference(store.as_ref()).await?;
        for assignment in &fixture.roles {
            audience.assign(assignment.user_id.clone(), assignment.role).await;
        }

        let workspace = Self::wire(settings, store.clone(), audience, Arc::new(TracingSink));
        fixture.apply_workflow(store.as_ref(), &workspace.engine).await?;
        info!("In-memory workspace ready");
        Ok(workspace)
    }

    /// SQLite-backed workspace. Notifications and role assignments live in the database.
    #[cfg(feature = "database")]
    pub async fn sqlite(
        settings: &DossierFlowConfig,
        database_url: &str,
        seed: Option<&Path>,
    ) -> Result<Self> {
        let db_config = DatabaseConfig {
            url: database_url.to_string(),
            ..settings.database.clone().unwrap_or(DatabaseConfig {
                url: String::new(),
                max_connections: 5,
                auto_migrate: true,
            })
        };
        let manager = DatabaseManager::new(&db_config).await?;
        let store = Arc::new(manager.store());

        let fixture = seed.map(SeedFixture::load).transpose()?.unwrap_or_default();
        fixture.apply_reference(store.as_ref()).await?;
        for assignment in &fixture.roles {
            store.assign_role(&assignment.user_id, assignment.role).await?;
        }

        let mut workspace = Self::wire(settings, store.clone(), store.clone(), store.clone());
        fixture.apply_workflow(store.as_ref(), &workspace.engine).await?;
        workspace.database = Some(manager);
        info!(url = %database_url, "SQLite workspace ready");
        Ok(workspace)
    }

    fn wire(
        settings: &DossierFlowConfig,
        store: Arc<dyn WorkflowStore>,
        audience: Arc<dyn AudienceResolver>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let notifications = &settings.notifications;
        let audience = Arc::new(CachedAudience::new(audience, notifications.audience_cache_ttl()));
        let (handle, task) = NotificationDispatcher::new(audience, sink)
            .with_retry(DeliveryRetryHandler::new(RetryConfig::from(notifications)))
            .spawn(notifications.queue_capacity);

        Self {
            engine: WorkflowEngine::new(store).with_dispatcher(handle),
            shutdown: ShutdownCoordinator::new(settings.workflow.shutdown_timeout())
                .track_dispatcher(task),
            #[cfg(feature = "database")]
            database: None,
        }
    }

    /// Drains pending notifications and releases the store.
    pub async fn close(self) -> Result<()> {
        let stats = self.shutdown.shutdown(self.engine).await?;
        debug!(
            outcomes = stats.outcomes,
            delivered = stats.delivered,
            failed = stats.failed,
            "Workspace closed"
        );
        #[cfg(feature = "database")]
        if let Some(database) = self.database {
            database.shutdown().await;
        }
        Ok(())
    }
}
