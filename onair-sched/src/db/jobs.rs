//! Persisted job results
//!
//! The in-memory registry answers status queries for live jobs; `job_runs`
//! keeps terminal outcomes (with attempt history) across restarts.

use super::{corrupt, parse_ts, parse_uuid};
use crate::error::Result;
use crate::tasks::{JobKind, JobRecord, JobStatus};
use onair_common::time;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// Insert or replace the stored state of a job
pub async fn save_job_run(db: &Pool<Sqlite>, record: &JobRecord) -> Result<()> {
    let kind_json = serde_json::to_string(&record.kind).map_err(|e| corrupt("job_runs.kind", &e.to_string()))?;
    let result_json = record.result.as_ref().map(|v| v.to_string());
    let history_json = serde_json::to_string(&record.history).map_err(|e| corrupt("job_runs.attempt_history_json", &e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO job_runs (id, kind, lane, status, attempts, result_json, last_error,
                              attempt_history_json, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            attempts = excluded.attempts,
            result_json = excluded.result_json,
            last_error = excluded.last_error,
            attempt_history_json = excluded.attempt_history_json,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(record.id.to_string())
    .bind(kind_json)
    .bind(record.lane.as_str())
    .bind(record.status.as_str())
    .bind(record.attempts as i64)
    .bind(result_json)
    .bind(&record.last_error)
    .bind(history_json)
    .bind(time::to_db(record.created_at))
    .bind(time::to_db(record.updated_at))
    .execute(db)
    .await?;

    Ok(())
}

pub async fn get_job_run(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<JobRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, kind, status, attempts, result_json, last_error, attempt_history_json, created_at, updated_at
        FROM job_runs
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let kind_json: String = row.get("kind");
    let kind: JobKind = serde_json::from_str(&kind_json).map_err(|_| corrupt("job_runs.kind", &kind_json))?;
    let status_str: String = row.get("status");
    let status = JobStatus::from_str(&status_str).ok_or_else(|| corrupt("job_runs.status", &status_str))?;

    let result = row
        .get::<Option<String>, _>("result_json")
        .and_then(|s| serde_json::from_str(&s).ok());
    let history = row
        .get::<Option<String>, _>("attempt_history_json")
        .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default();

    Ok(Some(JobRecord {
        id: parse_uuid(&row.get::<String, _>("id"), "job_runs.id")?,
        lane: kind.lane(),
        kind,
        status,
        attempts: row.get::<i64, _>("attempts").max(0) as u32,
        result,
        last_error: row.get("last_error"),
        history,
        created_at: parse_ts(&row.get::<String, _>("created_at"), "job_runs.created_at")?,
        updated_at: parse_ts(&row.get::<String, _>("updated_at"), "job_runs.updated_at")?,
    }))
}

/// Jobs left non-terminal by a previous run
///
/// Marked failed on startup; their workers no longer exist.
pub async fn fail_orphaned_runs(db: &Pool<Sqlite>) -> Result<u64> {
    let affected = sqlx::query(
        "UPDATE job_runs SET status = 'failed', last_error = 'Interrupted by restart', updated_at = ? \
         WHERE status IN ('queued', 'running')",
    )
    .bind(time::to_db(time::now()))
    .execute(db)
    .await?
    .rows_affected();
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Lane;
    use onair_common::db::init_database;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failed_job_keeps_history() {
        let dir = TempDir::new().unwrap();
        let db = init_database(&dir.path().join("onair.db")).await.unwrap();

        let mut record = JobRecord::queued(JobKind::GenerateSegment { content_item_id: Uuid::new_v4() });
        save_job_run(&db, &record).await.unwrap();

        record.status = JobStatus::Failed;
        record.attempts = 2;
        record.history = vec!["timeout".into(), "refused".into()];
        record.last_error = Some("gave up".into());
        save_job_run(&db, &record).await.unwrap();

        let loaded = get_job_run(&db, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.history, vec!["timeout".to_string(), "refused".to_string()]);
        assert_eq!(loaded.kind, record.kind);
        assert_eq!(loaded.lane, Lane::Narration);
    }

    #[tokio::test]
    async fn test_orphaned_runs_marked_failed() {
        let dir = TempDir::new().unwrap();
        let db = init_database(&dir.path().join("onair.db")).await.unwrap();

        let record = JobRecord::queued(JobKind::Cleanup);
        save_job_run(&db, &record).await.unwrap();

        assert_eq!(fail_orphaned_runs(&db).await.unwrap(), 1);
        let loaded = get_job_run(&db, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
    }
}
