use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use gateway_model::DecodeOptions;
use gateway_model::Job;
use gateway_model::JobFilter;
use gateway_model::JobId;
use gateway_model::JobPatch;
use gateway_model::JobSource;
use gateway_model::JobSpec;
use gateway_model::JobStatus;
use gateway_model::Priority;
use gateway_model::TaskType;
use gateway_model::TranscriptResult;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::QueryBuilder;
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;

use crate::StoreError;
use crate::store::JobStore;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// The PostgreSQL-backed [`JobStore`]: the choice for multi-process
/// deployments, where `claim_next` needs `SELECT ... FOR UPDATE SKIP LOCKED`
/// rather than SQLite's single-writer serialization to avoid two processes
/// claiming the same row.
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(StoreError::from)?;
        MIGRATOR.run(&pool).await.map_err(|err| StoreError::Terminal(err.to_string()))?;
        Ok(Self { pool })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    status: String,
    priority: String,
    engine_name: String,
    task_type: String,
    source_kind: String,
    source_value: String,
    file_url: Option<String>,
    file_name: Option<String>,
    file_size_bytes: Option<i64>,
    file_duration_seconds: Option<f64>,
    platform: Option<String>,
    language: Option<String>,
    decode_options_json: serde_json::Value,
    result_json: Option<serde_json::Value>,
    error_message: Option<String>,
    task_processing_time_seconds: Option<f64>,
    callback_url: Option<String>,
    callback_status_code: Option<i32>,
    callback_message: Option<String>,
    callback_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let source = match row.source_kind.as_str() {
            "localpath" => JobSource::LocalPath { path: row.source_value },
            "remoteurl" => JobSource::RemoteUrl { url: row.source_value },
            other => return Err(StoreError::Terminal(format!("invalid source kind: {other}"))),
        };
        let decode_options: DecodeOptions = serde_json::from_value(row.decode_options_json)
            .map_err(|err| StoreError::Terminal(format!("corrupt decode_options: {err}")))?;
        let result: Option<TranscriptResult> = row
            .result_json
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| StoreError::Terminal(format!("corrupt result_json: {err}")))?;
        Ok(Job {
            id: row.id,
            status: JobStatus::parse(&row.status).map_err(|err| StoreError::Terminal(err.to_string()))?,
            priority: Priority::parse(&row.priority).map_err(|err| StoreError::Terminal(err.to_string()))?,
            engine_name: row.engine_name,
            task_type: TaskType::parse(&row.task_type).map_err(|err| StoreError::Terminal(err.to_string()))?,
            source,
            file_url: row.file_url,
            file_name: row.file_name,
            file_size_bytes: row.file_size_bytes,
            file_duration_seconds: row.file_duration_seconds,
            platform: row.platform,
            language: row.language,
            decode_options,
            result,
            error_message: row.error_message,
            task_processing_time_seconds: row.task_processing_time_seconds,
            callback_url: row.callback_url,
            callback_status_code: row.callback_status_code,
            callback_message: row.callback_message,
            callback_time: row.callback_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn source_kind_and_value(source: &JobSource) -> (&'static str, &str) {
    match source {
        JobSource::LocalPath { path } => ("localpath", path.as_str()),
        JobSource::RemoteUrl { url } => ("remoteurl", url.as_str()),
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn create(&self, spec: &JobSpec) -> Result<Job, StoreError> {
        let now = Utc::now();
        let (source_kind, source_value) = source_kind_and_value(&spec.source);
        let decode_options_json =
            serde_json::to_value(&spec.decode_options).map_err(|err| StoreError::Terminal(err.to_string()))?;
        let callback_url = spec.normalized_callback_url();
        let row = sqlx::query_as::<_, JobRow>(
            r#"
INSERT INTO jobs (
    status, priority, engine_name, task_type, source_kind, source_value,
    file_url, platform, decode_options_json, callback_url, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
RETURNING *
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(spec.priority.as_str())
        .bind(spec.engine_name.as_str())
        .bind(spec.task_type.as_str())
        .bind(source_kind)
        .bind(source_value)
        .bind(spec.file_url.as_deref())
        .bind(spec.platform.as_deref())
        .bind(decode_options_json)
        .bind(callback_url.as_deref())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Job::try_from(row)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.map(Job::try_from).transpose()
    }

    async fn query(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM jobs WHERE 1 = 1");
        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            builder.push(" AND priority = ");
            builder.push_bind(priority.as_str());
        }
        if let Some(engine_name) = filter.engine_name.as_deref() {
            builder.push(" AND engine_name = ");
            builder.push_bind(engine_name.to_owned());
        }
        if let Some(language) = filter.language.as_deref() {
            builder.push(" AND language = ");
            builder.push_bind(language.to_owned());
        }
        if let Some(after) = filter.created_after {
            builder.push(" AND created_at >= ");
            builder.push_bind(after);
        }
        if let Some(before) = filter.created_before {
            builder.push(" AND created_at < ");
            builder.push_bind(before);
        }
        builder.push(" ORDER BY created_at DESC, id DESC");
        if filter.limit > 0 {
            builder.push(" LIMIT ");
            builder.push_bind(filter.limit);
            builder.push(" OFFSET ");
            builder.push_bind(filter.offset.max(0));
        }
        let rows: Vec<JobRow> = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<(), StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE jobs SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(file_name) = patch.file_name.as_deref() {
            builder.push(", file_name = ");
            builder.push_bind(file_name.to_owned());
        }
        if let Some(file_size_bytes) = patch.file_size_bytes {
            builder.push(", file_size_bytes = ");
            builder.push_bind(file_size_bytes);
        }
        if let Some(file_duration_seconds) = patch.file_duration_seconds {
            builder.push(", file_duration_seconds = ");
            builder.push_bind(file_duration_seconds);
        }
        if let Some(language) = patch.language.as_deref() {
            builder.push(", language = ");
            builder.push_bind(language.to_owned());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Unlike the SQLite backend's single-statement claim, Postgres allows
    /// concurrent writers, so the candidate row is selected and locked with
    /// `FOR UPDATE SKIP LOCKED` inside an explicit transaction before the
    /// update, matching the corpus's pattern for multi-worker queues.
    async fn claim_next(&self, engine_name: &str) -> Result<Option<Job>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        let candidate: Option<(i64,)> = sqlx::query_as(
            r#"
SELECT id FROM jobs
WHERE status = $1 AND engine_name = $2
ORDER BY
    CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 WHEN 'low' THEN 2 END ASC,
    created_at ASC,
    id ASC
LIMIT 1
FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(engine_name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let Some((id,)) = candidate else {
            tx.commit().await.map_err(StoreError::from)?;
            return Ok(None);
        };

        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE jobs SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(JobStatus::Processing.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Job::try_from(row).map(Some)
    }

    async fn mark_completed(
        &self,
        id: JobId,
        result: &TranscriptResult,
        language: Option<&str>,
        duration_s: f64,
    ) -> Result<(), StoreError> {
        let result_json = serde_json::to_value(result).map_err(|err| StoreError::Terminal(err.to_string()))?;
        sqlx::query(
            r#"
UPDATE jobs
SET status = $1, result_json = $2, language = COALESCE($3, language),
    task_processing_time_seconds = $4, updated_at = $5
WHERE id = $6 AND status = $7
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(result_json)
        .bind(language)
        .bind(duration_s)
        .bind(Utc::now())
        .bind(id)
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, error_message: &str, duration_s: f64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
UPDATE jobs
SET status = $1, error_message = $2, task_processing_time_seconds = $3, updated_at = $4
WHERE id = $5 AND status = $6
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error_message)
        .bind(duration_s)
        .bind(Utc::now())
        .bind(id)
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn record_callback(
        &self,
        id: JobId,
        status_code: Option<i32>,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
UPDATE jobs
SET callback_status_code = $1, callback_message = $2, callback_time = $3, updated_at = $4
WHERE id = $5
  AND (callback_status_code IS NULL OR NOT (callback_status_code >= 200 AND callback_status_code < 300))
            "#,
        )
        .bind(status_code)
        .bind(message)
        .bind(timestamp)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn reclaim_orphans(&self, older_than: Duration) -> Result<Vec<JobId>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let rows = sqlx::query(
            r#"
UPDATE jobs
SET status = $1, updated_at = $2
WHERE status = $3 AND updated_at < $4
RETURNING id
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(Utc::now())
        .bind(JobStatus::Processing.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(|row| row.get::<i64, _>("id")).collect())
    }

    async fn pending_callbacks(&self) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
SELECT * FROM jobs
WHERE status IN ($1, $2)
  AND callback_url IS NOT NULL AND callback_url != ''
  AND (callback_status_code IS NULL OR NOT (callback_status_code >= 200 AND callback_status_code < 300))
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(JobStatus::Failed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;
        rows.into_iter().map(Job::try_from).collect()
    }
}
