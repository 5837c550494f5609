use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::TimeZone;
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
use gateway_model::Segment;
use gateway_model::TaskType;
use gateway_model::TranscriptResult;
use sqlx::ConnectOptions;
use sqlx::QueryBuilder;
use sqlx::Row;
use sqlx::Sqlite;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::sqlite::SqliteSynchronous;
use tracing::log::LevelFilter;

use crate::StoreError;
use crate::store::JobStore;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// The SQLite-backed [`JobStore`]. Single-process
/// deployments get exclusive atomic claims from the WAL journal plus the
/// single-statement `UPDATE ... RETURNING` below; no external lock manager is
/// needed.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Off);
        Self::connect_with_options(options, 5).await
    }

    /// A single-connection pool so the in-memory database survives across
    /// pooled checkouts (each `:memory:` connection is otherwise its own
    /// empty database). Not gated to `#[cfg(test)]`: every other crate's
    /// test suite depends on it as an ordinary library function, since
    /// `cfg(test)` does not cross a crate boundary.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true)
            .log_statements(LevelFilter::Off);
        Self::connect_with_options(options, 1).await
    }

    async fn connect_with_options(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
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
    decode_options_json: String,
    result_json: Option<String>,
    error_message: Option<String>,
    task_processing_time_seconds: Option<f64>,
    callback_url: Option<String>,
    callback_status_code: Option<i32>,
    callback_message: Option<String>,
    callback_time: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn epoch_to_datetime(seconds: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| StoreError::Terminal(format!("invalid timestamp: {seconds}")))
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let source = match row.source_kind.as_str() {
            "localpath" => JobSource::LocalPath { path: row.source_value },
            "remoteurl" => JobSource::RemoteUrl { url: row.source_value },
            other => return Err(StoreError::Terminal(format!("invalid source kind: {other}"))),
        };
        let decode_options: DecodeOptions = serde_json::from_str(&row.decode_options_json)
            .map_err(|err| StoreError::Terminal(format!("corrupt decode_options: {err}")))?;
        let result: Option<TranscriptResult> = row
            .result_json
            .as_deref()
            .map(serde_json::from_str)
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
            callback_time: row.callback_time.map(epoch_to_datetime).transpose()?,
            created_at: epoch_to_datetime(row.created_at)?,
            updated_at: epoch_to_datetime(row.updated_at)?,
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
impl JobStore for SqliteJobStore {
    async fn create(&self, spec: &JobSpec) -> Result<Job, StoreError> {
        let now = Utc::now().timestamp();
        let (source_kind, source_value) = source_kind_and_value(&spec.source);
        let decode_options_json = serde_json::to_string(&spec.decode_options)
            .map_err(|err| StoreError::Terminal(err.to_string()))?;
        let callback_url = spec.normalized_callback_url();
        let id = sqlx::query(
            r#"
INSERT INTO jobs (
    status, priority, engine_name, task_type, source_kind, source_value,
    file_url, file_name, file_size_bytes, file_duration_seconds, platform,
    language, decode_options_json, result_json, error_message,
    task_processing_time_seconds, callback_url, callback_status_code,
    callback_message, callback_time, created_at, updated_at
) VALUES (
    ?, ?, ?, ?, ?, ?,
    ?, NULL, NULL, NULL, ?,
    NULL, ?, NULL, NULL,
    NULL, ?, NULL,
    NULL, NULL, ?, ?
)
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
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?
        .last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| StoreError::Terminal(format!("failed to load created job {id}")))
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.map(Job::try_from).transpose()
    }

    async fn query(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs WHERE 1 = 1");
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
            builder.push_bind(after.timestamp());
        }
        if let Some(before) = filter.created_before {
            builder.push(" AND created_at < ");
            builder.push_bind(before.timestamp());
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
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<(), StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE jobs SET updated_at = ");
        builder.push_bind(Utc::now().timestamp());
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

    async fn claim_next(&self, engine_name: &str) -> Result<Option<Job>, StoreError> {
        let now = Utc::now().timestamp();
        let row = sqlx::query_as::<_, JobRow>(
            r#"
UPDATE jobs
SET status = ?, updated_at = ?
WHERE id = (
    SELECT id FROM jobs
    WHERE status = ? AND engine_name = ?
    ORDER BY
        CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 WHEN 'low' THEN 2 END ASC,
        created_at ASC,
        id ASC
    LIMIT 1
)
RETURNING *
            "#,
        )
        .bind(JobStatus::Processing.as_str())
        .bind(now)
        .bind(JobStatus::Queued.as_str())
        .bind(engine_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;
        row.map(Job::try_from).transpose()
    }

    async fn mark_completed(
        &self,
        id: JobId,
        result: &TranscriptResult,
        language: Option<&str>,
        duration_s: f64,
    ) -> Result<(), StoreError> {
        let result_json = serde_json::to_string(result).map_err(|err| StoreError::Terminal(err.to_string()))?;
        sqlx::query(
            r#"
UPDATE jobs
SET status = ?, result_json = ?, language = COALESCE(?, language),
    task_processing_time_seconds = ?, updated_at = ?
WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(result_json)
        .bind(language)
        .bind(duration_s)
        .bind(Utc::now().timestamp())
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
SET status = ?, error_message = ?, task_processing_time_seconds = ?, updated_at = ?
WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error_message)
        .bind(duration_s)
        .bind(Utc::now().timestamp())
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
SET callback_status_code = ?, callback_message = ?, callback_time = ?, updated_at = ?
WHERE id = ?
  AND (callback_status_code IS NULL OR NOT (callback_status_code >= 200 AND callback_status_code < 300))
            "#,
        )
        .bind(status_code)
        .bind(message)
        .bind(timestamp.timestamp())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn reclaim_orphans(&self, older_than: Duration) -> Result<Vec<JobId>, StoreError> {
        let cutoff = Utc::now().timestamp() - older_than.as_secs() as i64;
        let rows = sqlx::query(
            r#"
UPDATE jobs
SET status = ?, updated_at = ?
WHERE status = ? AND updated_at < ?
RETURNING id
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(Utc::now().timestamp())
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
WHERE status IN (?, ?)
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
