use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, FromRow, Sqlite, SqliteConnection, SqlitePool};
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, info};

use crate::checklist::{ChecklistCategory, ChecklistItem, ChecklistValidation, ValidationSynthesis};
use crate::config::DatabaseConfig;
use crate::dossier::{Checkpoint, Dossier, DossierId, RejectionRecord, Role, UserId};
use crate::notifications::{AudienceResolver, DispatchError, Notification, NotificationSink};
use crate::store::{CheckpointCommit, ReferenceData, ResubmissionCommit, StoreError, WorkflowStore};

/// Database manager owning the SQLite pool
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Initialize database with automatic migrations
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(&config.url).await? {
            info!("Creating database at {}", config.url);
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect(&config.url)
            .await?;

        if config.auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Duplicate(db.message().to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn corrupt(column: &str, value: &str, err: impl Display) -> StoreError {
    StoreError::Backend(format!("invalid {column} '{value}' in database: {err}"))
}

fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| corrupt(column, value, e))
}

fn parse_time(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(column, value, e))
}

fn parse_opt_time(column: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|v| parse_time(column, v)).transpose()
}

fn count(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|e| corrupt(column, &value.to_string(), e))
}

const DOSSIER_COLUMNS: &str = "id, case_number, status, amount, nature_id, budget_line_id, creator_id, \
     rejection_checkpoint, rejection_reason, rejection_detail, rejection_at, version, \
     created_at, updated_at, last_transition_at";

#[derive(Debug, FromRow)]
struct DossierRow {
    id: String,
    case_number: String,
    status: String,
    amount: i64,
    nature_id: Option<i64>,
    budget_line_id: Option<i64>,
    creator_id: String,
    rejection_checkpoint: Option<String>,
    rejection_reason: Option<String>,
    rejection_detail: Option<String>,
    rejection_at: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
    last_transition_at: Option<String>,
}

impl TryFrom<DossierRow> for Dossier {
    type Error = StoreError;

    fn try_from(row: DossierRow) -> Result<Self, Self::Error> {
        let rejection = match (row.rejection_checkpoint, row.rejection_reason, row.rejection_at) {
            (Some(checkpoint), Some(reason), Some(at)) => Some(RejectionRecord {
                checkpoint: parse_column("rejection_checkpoint", &checkpoint)?,
                reason,
                detail: row.rejection_detail,
                rejected_at: parse_time("rejection_at", &at)?,
            }),
            _ => None,
        };
        Ok(Dossier {
            id: parse_column("dossier id", &row.id)?,
            case_number: row.case_number,
            status: parse_column("status", &row.status)?,
            amount: row.amount,
            nature_id: row.nature_id,
            budget_line_id: row.budget_line_id,
            creator_id: UserId::new(row.creator_id),
            rejection,
            version: row.version,
            created_at: parse_time("created_at", &row.created_at)?,
            updated_at: parse_time("updated_at", &row.updated_at)?,
            last_transition_at: parse_opt_time("last_transition_at", row.last_transition_at.as_deref())?,
        })
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    checkpoint_type: String,
    name: String,
    display_order: i32,
    active: bool,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    category_id: i64,
    name: String,
    mandatory: bool,
    display_order: i32,
    active: bool,
}

#[derive(Debug, FromRow)]
struct ValidationRow {
    dossier_id: String,
    checkpoint: String,
    item_id: i64,
    valid: bool,
    comment: Option<String>,
    evidence_ref: Option<String>,
    actor_id: String,
    created_at: String,
}

impl TryFrom<ValidationRow> for ChecklistValidation {
    type Error = StoreError;

    fn try_from(row: ValidationRow) -> Result<Self, Self::Error> {
        Ok(ChecklistValidation {
            dossier_id: parse_column("dossier id", &row.dossier_id)?,
            checkpoint: parse_column("checkpoint", &row.checkpoint)?,
            item_id: row.item_id,
            valid: row.valid,
            comment: row.comment,
            evidence_ref: row.evidence_ref,
            actor_id: UserId::new(row.actor_id),
            created_at: parse_time("created_at", &row.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SynthesisRow {
    dossier_id: String,
    checkpoint: String,
    total: i64,
    validated: i64,
    rejected: i64,
    verdict: String,
    general_comment: Option<String>,
    actor_id: String,
    created_at: String,
}

impl TryFrom<SynthesisRow> for ValidationSynthesis {
    type Error = StoreError;

    fn try_from(row: SynthesisRow) -> Result<Self, Self::Error> {
        Ok(ValidationSynthesis {
            dossier_id: parse_column("dossier id", &row.dossier_id)?,
            checkpoint: parse_column("checkpoint", &row.checkpoint)?,
            total: count("total", row.total)?,
            validated: count("validated", row.validated)?,
            rejected: count("rejected", row.rejected)?,
            verdict: parse_column("verdict", &row.verdict)?,
            general_comment: row.general_comment,
            actor_id: UserId::new(row.actor_id),
            created_at: parse_time("created_at", &row.created_at)?,
        })
    }
}

/// SQLite-backed workflow store. Each commit runs in one transaction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn assign_role(&self, user: &UserId, role: Role) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO role_assignments (user_id, role) VALUES (?1, ?2)")
            .bind(user.as_str())
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    pub async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, recipient, title, message, notification_type, priority, read, read_at,
                   action_ref, metadata, created_at
            FROM notifications
            WHERE recipient = ?1
            ORDER BY created_at ASC
            "#,
        )
        .bind(recipient.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn fetch_dossier(
        conn: &mut SqliteConnection,
        id: DossierId,
    ) -> Result<Option<Dossier>, StoreError> {
        let row: Option<DossierRow> =
            sqlx::query_as(&format!("SELECT {DOSSIER_COLUMNS} FROM dossiers WHERE id = ?1"))
                .bind(id.to_string())
                .fetch_optional(conn)
                .await
                .map_err(backend)?;
        row.map(Dossier::try_from).transpose()
    }

    /// Turns a zero-row versioned UPDATE into the matching error.
    async fn missed_update(
        conn: &mut SqliteConnection,
        id: DossierId,
        expected: i64,
    ) -> StoreError {
        let found: Result<Option<i64>, sqlx::Error> =
            sqlx::query_scalar("SELECT version FROM dossiers WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(conn)
                .await;
        match found {
            Ok(Some(found)) => StoreError::VersionConflict {
                dossier_id: id,
                expected,
                found,
            },
            Ok(None) => StoreError::DossierNotFound(id),
            Err(e) => backend(e),
        }
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn insert_dossier(&self, dossier: &Dossier) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO dossiers (id, case_number, status, amount, nature_id, budget_line_id,
                                  creator_id, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(dossier.id.to_string())
        .bind(&dossier.case_number)
        .bind(dossier.status.as_str())
        .bind(dossier.amount)
        .bind(dossier.nature_id)
        .bind(dossier.budget_line_id)
        .bind(dossier.creator_id.as_str())
        .bind(dossier.version)
        .bind(dossier.created_at.to_rfc3339())
        .bind(dossier.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match backend(e) {
            StoreError::Duplicate(_) => {
                StoreError::Duplicate(format!("case number {}", dossier.case_number))
            }
            other => other,
        })?;
        Ok(())
    }

    async fn load_dossier(&self, id: DossierId) -> Result<Option<Dossier>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        Self::fetch_dossier(&mut conn, id).await
    }

    async fn catalog_rows(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<(Vec<ChecklistCategory>, Vec<ChecklistItem>), StoreError> {
        let categories: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, checkpoint_type, name, display_order, active FROM checklist_categories WHERE checkpoint_type = ?1",
        )
        .bind(checkpoint.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let items: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.category_id, i.name, i.mandatory, i.display_order, i.active
            FROM checklist_items i
            JOIN checklist_categories c ON c.id = i.category_id
            WHERE c.checkpoint_type = ?1
            "#,
        )
        .bind(checkpoint.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let categories = categories
            .into_iter()
            .map(|row| {
                Ok(ChecklistCategory {
                    id: row.id,
                    checkpoint: parse_column("checkpoint_type", &row.checkpoint_type)?,
                    name: row.name,
                    display_order: row.display_order,
                    active: row.active,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        let items = items
            .into_iter()
            .map(|row| ChecklistItem {
                id: row.id,
                category_id: row.category_id,
                name: row.name,
                mandatory: row.mandatory,
                display_order: row.display_order,
                active: row.active,
            })
            .collect();
        Ok((categories, items))
    }

    async fn load_validations(
        &self,
        id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<Vec<ChecklistValidation>, StoreError> {
        let rows: Vec<ValidationRow> = sqlx::query_as(
            r#"
            SELECT dossier_id, checkpoint, item_id, valid, comment, evidence_ref, actor_id, created_at
            FROM checklist_validations
            WHERE dossier_id = ?1 AND checkpoint = ?2
            ORDER BY rowid ASC
            "#,
        )
        .bind(id.to_string())
        .bind(checkpoint.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(ChecklistValidation::try_from).collect()
    }

    async fn load_synthesis(
        &self,
        id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<Option<ValidationSynthesis>, StoreError> {
        let row: Option<SynthesisRow> = sqlx::query_as(
            r#"
            SELECT dossier_id, checkpoint, total, validated, rejected, verdict, general_comment,
                   actor_id, created_at
            FROM validation_synthesis
            WHERE dossier_id = ?1 AND checkpoint = ?2
            "#,
        )
        .bind(id.to_string())
        .bind(checkpoint.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(ValidationSynthesis::try_from).transpose()
    }

    async fn load_syntheses(&self, id: DossierId) -> Result<Vec<ValidationSynthesis>, StoreError> {
        let rows: Vec<SynthesisRow> = sqlx::query_as(
            r#"
            SELECT dossier_id, checkpoint, total, validated, rejected, verdict, general_comment,
                   actor_id, created_at
            FROM validation_synthesis
            WHERE dossier_id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut syntheses = rows
            .into_iter()
            .map(ValidationSynthesis::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        syntheses.sort_by_key(|s| s.checkpoint);
        Ok(syntheses)
    }

    async fn commit_checkpoint(&self, commit: CheckpointCommit) -> Result<Dossier, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let id = commit.dossier_id.to_string();
        let at = commit.committed_at.to_rfc3339();

        let updated = match &commit.rejection {
            Some(rejection) => sqlx::query(
                r#"
                UPDATE dossiers
                SET status = ?1, rejection_checkpoint = ?2, rejection_reason = ?3,
                    rejection_detail = ?4, rejection_at = ?5,
                    version = version + 1, updated_at = ?6, last_transition_at = ?6
                WHERE id = ?7 AND version = ?8
                "#,
            )
            .bind(commit.new_status.as_str())
            .bind(rejection.checkpoint.as_str())
            .bind(&rejection.reason)
            .bind(rejection.detail.as_deref())
            .bind(rejection.rejected_at.to_rfc3339())
            .bind(&at)
            .bind(&id)
            .bind(commit.expected_version),
            None => sqlx::query(
                r#"
                UPDATE dossiers
                SET status = ?1, version = version + 1, updated_at = ?2, last_transition_at = ?2
                WHERE id = ?3 AND version = ?4
                "#,
            )
            .bind(commit.new_status.as_str())
            .bind(&at)
            .bind(&id)
            .bind(commit.expected_version),
        }
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 0 {
            let err = Self::missed_update(&mut *tx, commit.dossier_id, commit.expected_version).await;
            tx.rollback().await.map_err(backend)?;
            return Err(err);
        }

        sqlx::query("DELETE FROM checklist_validations WHERE dossier_id = ?1 AND checkpoint = ?2")
            .bind(&id)
            .bind(commit.checkpoint.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        for validation in &commit.validations {
            sqlx::query(
                r#"
                INSERT INTO checklist_validations
                    (dossier_id, checkpoint, item_id, valid, comment, evidence_ref, actor_id, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&id)
            .bind(validation.checkpoint.as_str())
            .bind(validation.item_id)
            .bind(validation.valid)
            .bind(validation.comment.as_deref())
            .bind(validation.evidence_ref.as_deref())
            .bind(validation.actor_id.as_str())
            .bind(validation.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        let synthesis = &commit.synthesis;
        sqlx::query(
            r#"
            INSERT INTO validation_synthesis
                (dossier_id, checkpoint, total, validated, rejected, verdict, general_comment, actor_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (dossier_id, checkpoint) DO UPDATE SET
                total = excluded.total,
                validated = excluded.validated,
                rejected = excluded.rejected,
                verdict = excluded.verdict,
                general_comment = excluded.general_comment,
                actor_id = excluded.actor_id,
                created_at = excluded.created_at
            "#,
        )
        .bind(&id)
        .bind(synthesis.checkpoint.as_str())
        .bind(i64::from(synthesis.total))
        .bind(i64::from(synthesis.validated))
        .bind(i64::from(synthesis.rejected))
        .bind(synthesis.verdict.as_str())
        .bind(synthesis.general_comment.as_deref())
        .bind(synthesis.actor_id.as_str())
        .bind(synthesis.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        let dossier = Self::fetch_dossier(&mut *tx, commit.dossier_id)
            .await?
            .ok_or(StoreError::DossierNotFound(commit.dossier_id))?;
        tx.commit().await.map_err(backend)?;

        debug!(
            dossier_id = %dossier.id,
            checkpoint = %commit.checkpoint,
            status = %dossier.status,
            version = dossier.version,
            "Committed checkpoint to SQLite"
        );
        Ok(dossier)
    }

    async fn commit_resubmission(&self, commit: ResubmissionCommit) -> Result<Dossier, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let at = commit.committed_at.to_rfc3339();

        let updated = sqlx::query(
            r#"
            UPDATE dossiers
            SET status = ?1, rejection_checkpoint = NULL, rejection_reason = NULL,
                rejection_detail = NULL, rejection_at = NULL,
                version = version + 1, updated_at = ?2, last_transition_at = ?2
            WHERE id = ?3 AND version = ?4
            "#,
        )
        .bind(commit.new_status.as_str())
        .bind(&at)
        .bind(commit.dossier_id.to_string())
        .bind(commit.expected_version)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 0 {
            let err = Self::missed_update(&mut *tx, commit.dossier_id, commit.expected_version).await;
            tx.rollback().await.map_err(backend)?;
            return Err(err);
        }

        let dossier = Self::fetch_dossier(&mut *tx, commit.dossier_id)
            .await?
            .ok_or(StoreError::DossierNotFound(commit.dossier_id))?;
        tx.commit().await.map_err(backend)?;
        Ok(dossier)
    }
}

#[async_trait]
impl ReferenceData for SqliteStore {
    async fn put_category(&self, category: ChecklistCategory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO checklist_categories (id, checkpoint_type, name, display_order, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(category.id)
        .bind(category.checkpoint.as_str())
        .bind(&category.name)
        .bind(category.display_order)
        .bind(category.active)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn put_item(&self, item: ChecklistItem) -> Result<(), StoreError> {
        let known: Option<i64> = sqlx::query_scalar("SELECT id FROM checklist_categories WHERE id = ?1")
            .bind(item.category_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        if known.is_none() {
            return Err(StoreError::Backend(format!(
                "item {} references unknown category {}",
                item.id, item.category_id
            )));
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO checklist_items (id, category_id, name, mandatory, display_order, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(item.id)
        .bind(item.category_id)
        .bind(&item.name)
        .bind(item.mandatory)
        .bind(item.display_order)
        .bind(item.active)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl AudienceResolver for SqliteStore {
    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>, DispatchError> {
        let users: Vec<String> =
            sqlx::query_scalar("SELECT user_id FROM role_assignments WHERE role = ?1 ORDER BY user_id")
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DispatchError::Audience(e.to_string()))?;
        Ok(users.into_iter().map(UserId::new).collect())
    }
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: String,
    recipient: String,
    title: String,
    message: String,
    notification_type: String,
    priority: String,
    read: bool,
    read_at: Option<String>,
    action_ref: Option<String>,
    metadata: String,
    created_at: String,
}

fn enum_value<T: serde::de::DeserializeOwned>(column: &str, value: String) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(value.clone()))
        .map_err(|e| corrupt(column, &value, e))
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: parse_column("notification id", &row.id)?,
            recipient: UserId::new(row.recipient),
            title: row.title,
            message: row.message,
            notification_type: enum_value("notification_type", row.notification_type)?,
            priority: enum_value("priority", row.priority)?,
            read: row.read,
            read_at: parse_opt_time("read_at", row.read_at.as_deref())?,
            action_ref: row.action_ref,
            metadata: serde_json::from_str(&row.metadata)
                .map_err(|e| corrupt("metadata", &row.metadata, e))?,
            created_at: parse_time("created_at", &row.created_at)?,
        })
    }
}

#[async_trait]
impl NotificationSink for SqliteStore {
    async fn deliver(&self, notification: &Notification) -> Result<(), DispatchError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient, title, message, notification_type, priority,
                                       read, read_at, action_ref, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.recipient.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.notification_type.as_str())
        .bind(notification.priority.as_str())
        .bind(notification.read)
        .bind(notification.read_at.map(|t| t.to_rfc3339()))
        .bind(notification.action_ref.as_deref())
        .bind(notification.metadata.to_string())
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DispatchError::Delivery {
            recipient: notification.recipient.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
