//! PostgreSQL policy store for the content gateway.
//!
//! Holds access rules, allow-list entries, and the access/build audit logs.
//! Uses sqlx with hand-written queries.

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{normalize_email, AccessLog, AccessRule, BuildKind, BuildLog, BuildTrigger};

const MAX_PAGE_SIZE: i64 = 500;
const DEFAULT_PAGE_SIZE: i64 = 50;

/// Clamp caller-supplied pagination bounds rather than trusting them.
pub(crate) fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and build a pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to PostgreSQL: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))
            })?;
        Ok(Self { pool })
    }

    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    /// Create the schema if it does not exist. Safe to run on every start.
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS access_rules (
                id UUID PRIMARY KEY,
                content_type TEXT NOT NULL,
                slug TEXT NOT NULL,
                access_mode TEXT NOT NULL
                    CHECK (access_mode IN ('open', 'shared-secret', 'allow-list')),
                description TEXT,
                secret_hash TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (content_type, slug)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_allowlist (
                id UUID PRIMARY KEY,
                rule_id UUID NOT NULL REFERENCES access_rules(id) ON DELETE CASCADE,
                email TEXT NOT NULL,
                added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (rule_id, email)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS access_logs (
                id UUID PRIMARY KEY,
                rule_id UUID,
                content_type TEXT NOT NULL,
                slug TEXT NOT NULL,
                granted BOOLEAN NOT NULL,
                credential_type TEXT NOT NULL
                    CHECK (credential_type IN ('none', 'secret', 'email')),
                credential_value TEXT,
                client_ip TEXT,
                user_agent TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_access_logs_document ON access_logs (content_type, slug)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_access_logs_created ON access_logs (created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS build_logs (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL CHECK (kind IN ('content', 'full')),
                status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed')),
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                duration_seconds INTEGER,
                log TEXT,
                error_message TEXT,
                triggered_by TEXT NOT NULL CHECK (triggered_by IN ('manual', 'automated')),
                source_revision TEXT,
                source_branch TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_build_logs_started ON build_logs (started_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        tracing::info!("Database schema is up to date");
        Ok(())
    }

    // ==================== Access Rule Operations ====================

    /// Find the rule for one document. Absence is a distinct outcome from
    /// open access.
    pub async fn find_rule(
        &self,
        content_type: &str,
        slug: &str,
    ) -> Result<Option<AccessRule>, AppError> {
        sqlx::query_as::<_, AccessRule>(
            "SELECT * FROM access_rules WHERE content_type = $1 AND slug = $2",
        )
        .bind(content_type)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// List rules, optionally filtered by content type and access mode.
    pub async fn list_rules(
        &self,
        content_type: Option<&str>,
        access_mode: Option<&str>,
    ) -> Result<Vec<AccessRule>, AppError> {
        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if content_type.is_some() {
            conditions.push(format!("content_type = ${}", param_idx));
            param_idx += 1;
        }
        if access_mode.is_some() {
            conditions.push(format!("access_mode = ${}", param_idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT * FROM access_rules{} ORDER BY content_type, slug",
            where_clause
        );

        let mut q = sqlx::query_as::<_, AccessRule>(&query);
        if let Some(ct) = content_type {
            q = q.bind(ct);
        }
        if let Some(mode) = access_mode {
            q = q.bind(mode);
        }

        q.fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// Insert a new rule with its initial allow-list in one transaction.
    /// A duplicate (content_type, slug) maps to a conflict.
    pub async fn insert_rule(
        &self,
        rule: &AccessRule,
        allowed_emails: &[String],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO access_rules (id, content_type, slug, access_mode, description, secret_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(rule.id)
        .bind(&rule.content_type)
        .bind(&rule.slug)
        .bind(&rule.access_mode)
        .bind(&rule.description)
        .bind(&rule.secret_hash)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &rule.content_type, &rule.slug))?;

        insert_allowlist_entries(&mut tx, rule.id, allowed_emails).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    /// Update a rule and, when requested, replace its allow-list. Both happen
    /// in one transaction; the caller never observes a partial update.
    /// Moving a rule off allow-list mode drops its entries.
    pub async fn update_rule(
        &self,
        content_type: &str,
        slug: &str,
        access_mode: Option<&str>,
        description: Option<&str>,
        secret_hash: Option<&str>,
        allowed_emails: Option<&[String]>,
    ) -> Result<Option<AccessRule>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let updated = sqlx::query_as::<_, AccessRule>(
            r#"
            UPDATE access_rules
            SET access_mode = COALESCE($3, access_mode),
                description = COALESCE($4, description),
                secret_hash = COALESCE($5, secret_hash),
                updated_at = NOW()
            WHERE content_type = $1 AND slug = $2
            RETURNING *
            "#,
        )
        .bind(content_type)
        .bind(slug)
        .bind(access_mode)
        .bind(description)
        .bind(secret_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let Some(mut rule) = updated else {
            tx.rollback()
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            return Ok(None);
        };

        // secret_hash exists iff the rule is shared-secret
        if rule.access_mode != "shared-secret" && rule.secret_hash.is_some() {
            sqlx::query("UPDATE access_rules SET secret_hash = NULL WHERE id = $1")
                .bind(rule.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            rule.secret_hash = None;
        }

        if rule.access_mode != "allow-list" {
            sqlx::query("DELETE FROM email_allowlist WHERE rule_id = $1")
                .bind(rule.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        } else if let Some(emails) = allowed_emails {
            sqlx::query("DELETE FROM email_allowlist WHERE rule_id = $1")
                .bind(rule.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            insert_allowlist_entries(&mut tx, rule.id, emails).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(Some(rule))
    }

    /// Delete a rule. Allow-list entries go with it via the FK cascade.
    pub async fn delete_rule(&self, content_type: &str, slug: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM access_rules WHERE content_type = $1 AND slug = $2")
            .bind(content_type)
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Allow-list Operations ====================

    /// Emails for one rule, normalized at insert time.
    pub async fn list_allowlist(&self, rule_id: Uuid) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT email FROM email_allowlist WHERE rule_id = $1 ORDER BY added_at",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }

    pub async fn add_allowlist_email(&self, rule_id: Uuid, email: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO email_allowlist (id, rule_id, email, added_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (rule_id, email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rule_id)
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    pub async fn remove_allowlist_email(
        &self,
        rule_id: Uuid,
        email: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM email_allowlist WHERE rule_id = $1 AND email = $2")
            .bind(rule_id)
            .bind(normalize_email(email))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(result.rows_affected() > 0)
    }

    /// Membership check against the normalized allow-list.
    pub async fn allowlist_contains(&self, rule_id: Uuid, email: &str) -> Result<bool, AppError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM email_allowlist WHERE rule_id = $1 AND email = $2",
        )
        .bind(rule_id)
        .bind(normalize_email(email))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(row.0 > 0)
    }

    // ==================== Composite Reads ====================

    /// One rule together with its allow-list.
    pub async fn rule_with_allowlist(
        &self,
        content_type: &str,
        slug: &str,
    ) -> Result<Option<(AccessRule, Vec<String>)>, AppError> {
        let Some(rule) = self.find_rule(content_type, slug).await? else {
            return Ok(None);
        };
        let emails = self.list_allowlist(rule.id).await?;
        Ok(Some((rule, emails)))
    }

    /// Every rule with its allow-list; the authoritative visibility map for
    /// a sync run.
    pub async fn all_rules_with_allowlists(
        &self,
    ) -> Result<Vec<(AccessRule, Vec<String>)>, AppError> {
        let rules = self.list_rules(None, None).await?;

        let entries: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT rule_id, email FROM email_allowlist ORDER BY added_at")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let mut by_rule: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (rule_id, email) in entries {
            by_rule.entry(rule_id).or_default().push(email);
        }

        Ok(rules
            .into_iter()
            .map(|rule| {
                let emails = by_rule.remove(&rule.id).unwrap_or_default();
                (rule, emails)
            })
            .collect())
    }

    // ==================== Access Log Operations ====================

    /// Append one audit row. Rows are never updated or deleted here.
    pub async fn insert_access_log(&self, log: &AccessLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO access_logs (id, rule_id, content_type, slug, granted, credential_type, credential_value, client_ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(log.rule_id)
        .bind(&log.content_type)
        .bind(&log.slug)
        .bind(log.granted)
        .bind(&log.credential_type)
        .bind(&log.credential_value)
        .bind(&log.client_ip)
        .bind(&log.user_agent)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    /// Filtered, paginated access-log listing.
    pub async fn find_access_logs(
        &self,
        failed_only: bool,
        content_type: Option<&str>,
        slug: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<AccessLog>, i64), AppError> {
        let (limit, offset) = clamp_page(limit, offset);

        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if failed_only {
            conditions.push("granted = false".to_string());
        }
        if content_type.is_some() {
            conditions.push(format!("content_type = ${}", param_idx));
            param_idx += 1;
        }
        if slug.is_some() {
            conditions.push(format!("slug = ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM access_logs{}", where_clause);
        let data_query = format!(
            "SELECT * FROM access_logs{} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            where_clause,
            param_idx,
            param_idx + 1
        );

        let mut count_q = sqlx::query_as::<_, (i64,)>(&count_query);
        if let Some(ct) = content_type {
            count_q = count_q.bind(ct);
        }
        if let Some(s) = slug {
            count_q = count_q.bind(s);
        }
        let (total,) = count_q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let mut data_q = sqlx::query_as::<_, AccessLog>(&data_query);
        if let Some(ct) = content_type {
            data_q = data_q.bind(ct);
        }
        if let Some(s) = slug {
            data_q = data_q.bind(s);
        }
        let logs = data_q
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok((logs, total))
    }

    /// Count-by-outcome and count-by-type summaries over an optional window.
    pub async fn access_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<AccessStats, AppError> {
        let start = start.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = end.unwrap_or_else(Utc::now);

        let (total, granted): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE granted)
            FROM access_logs
            WHERE created_at >= $1 AND created_at <= $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let by_credential_type: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT credential_type, COUNT(*)
            FROM access_logs
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY credential_type
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let by_document: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT content_type, slug, COUNT(*), COUNT(*) FILTER (WHERE NOT granted)
            FROM access_logs
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY content_type, slug
            ORDER BY COUNT(*) DESC
            LIMIT 20
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(AccessStats {
            total,
            granted,
            denied: total - granted,
            by_credential_type,
            by_document,
        })
    }

    // ==================== Build Log Operations ====================

    /// Open a build record in `running` state and return its id.
    pub async fn open_build_log(
        &self,
        kind: BuildKind,
        trigger: BuildTrigger,
        source_revision: Option<&str>,
        source_branch: Option<&str>,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO build_logs (id, kind, status, started_at, triggered_by, source_revision, source_branch)
            VALUES ($1, $2, 'running', NOW(), $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(trigger.as_str())
        .bind(source_revision)
        .bind(source_branch)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(id)
    }

    /// Finalize a build record exactly once. Only `running` rows transition.
    pub async fn finalize_build_log(
        &self,
        id: Uuid,
        success: bool,
        log: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE build_logs
            SET status = $2,
                completed_at = NOW(),
                duration_seconds = EXTRACT(EPOCH FROM (NOW() - started_at))::INTEGER,
                log = $3,
                error_message = $4
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(if success { "success" } else { "failed" })
        .bind(log)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    pub async fn find_build_log_by_id(&self, id: Uuid) -> Result<Option<BuildLog>, AppError> {
        sqlx::query_as::<_, BuildLog>("SELECT * FROM build_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    pub async fn latest_build_log(&self) -> Result<Option<BuildLog>, AppError> {
        sqlx::query_as::<_, BuildLog>(
            "SELECT * FROM build_logs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    /// Filtered, paginated build-log listing.
    pub async fn find_build_logs(
        &self,
        status: Option<&str>,
        kind: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<BuildLog>, i64), AppError> {
        let (limit, offset) = clamp_page(limit, offset);

        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if status.is_some() {
            conditions.push(format!("status = ${}", param_idx));
            param_idx += 1;
        }
        if kind.is_some() {
            conditions.push(format!("kind = ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM build_logs{}", where_clause);
        let data_query = format!(
            "SELECT * FROM build_logs{} ORDER BY started_at DESC LIMIT ${} OFFSET ${}",
            where_clause,
            param_idx,
            param_idx + 1
        );

        let mut count_q = sqlx::query_as::<_, (i64,)>(&count_query);
        if let Some(s) = status {
            count_q = count_q.bind(s);
        }
        if let Some(k) = kind {
            count_q = count_q.bind(k);
        }
        let (total,) = count_q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let mut data_q = sqlx::query_as::<_, BuildLog>(&data_query);
        if let Some(s) = status {
            data_q = data_q.bind(s);
        }
        if let Some(k) = kind {
            data_q = data_q.bind(k);
        }
        let builds = data_q
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok((builds, total))
    }
}

/// Aggregated access-log summary.
#[derive(Debug, Clone)]
pub struct AccessStats {
    pub total: i64,
    pub granted: i64,
    pub denied: i64,
    pub by_credential_type: Vec<(String, i64)>,
    pub by_document: Vec<(String, String, i64, i64)>,
}

async fn insert_allowlist_entries(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rule_id: Uuid,
    emails: &[String],
) -> Result<(), AppError> {
    for email in emails {
        sqlx::query(
            r#"
            INSERT INTO email_allowlist (id, rule_id, email, added_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (rule_id, email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rule_id)
        .bind(normalize_email(email))
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    }
    Ok(())
}

fn map_unique_violation(e: sqlx::Error, content_type: &str, slug: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => AppError::Conflict(
            anyhow::anyhow!("An access rule already exists for {}/{}", content_type, slug),
        ),
        _ => AppError::DatabaseError(anyhow::anyhow!(e)),
    }
}
