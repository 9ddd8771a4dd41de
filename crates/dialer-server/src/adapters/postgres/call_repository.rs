//! PostgreSQL implementation of CallRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use dialer::{
    Call, CallPatch, CallRepository, CallStatus, DomainError, StatusCounts, ABANDONED_DISPATCH,
};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct CallRow {
    id: Uuid,
    destination: String,
    script_id: String,
    metadata: serde_json::Value,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    external_call_id: Option<String>,
    next_attempt_at: Option<DateTime<Utc>>,
    duration_sec: Option<i32>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CallRow> for Call {
    type Error = DomainError;

    fn try_from(row: CallRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<CallStatus>()
            .map_err(DomainError::Repository)?;

        Ok(Self {
            id: row.id,
            destination: row.destination,
            script_id: row.script_id,
            metadata: row.metadata,
            status,
            attempts: row.attempts,
            last_error: row.last_error,
            external_call_id: row.external_call_id,
            next_attempt_at: row.next_attempt_at,
            duration_sec: row.duration_sec,
            created_at: row.created_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            updated_at: row.updated_at,
        })
    }
}

fn repo_err(e: sqlx::Error) -> DomainError {
    DomainError::Repository(e.to_string())
}

/// Build `UPDATE calls SET ... WHERE id = $n [AND status = $m] RETURNING *`
///
/// Terminal records never match, whatever the guard.
fn build_update(
    id: Uuid,
    expected: Option<CallStatus>,
    patch: &CallPatch,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE calls SET updated_at = ");
    qb.push_bind(now);

    if let Some(status) = patch.status {
        qb.push(", status = ").push_bind(status.as_str());
    }
    if let Some(script_id) = &patch.script_id {
        qb.push(", script_id = ").push_bind(script_id.clone());
    }
    if let Some(metadata) = &patch.metadata {
        qb.push(", metadata = ").push_bind(metadata.clone());
    }
    if let Some(attempts) = patch.attempts {
        qb.push(", attempts = ").push_bind(attempts);
    }
    if let Some(error) = &patch.last_error {
        qb.push(", last_error = ").push_bind(error.clone());
    }
    if let Some(external_call_id) = &patch.external_call_id {
        qb.push(", external_call_id = ")
            .push_bind(external_call_id.clone());
    }
    if let Some(next_attempt_at) = patch.next_attempt_at {
        qb.push(", next_attempt_at = ").push_bind(next_attempt_at);
    }
    if let Some(duration_sec) = patch.duration_sec {
        qb.push(", duration_sec = ").push_bind(duration_sec);
    }
    if let Some(started_at) = patch.started_at {
        qb.push(", started_at = ").push_bind(started_at);
    }
    if let Some(ended_at) = patch.ended_at {
        qb.push(", ended_at = ").push_bind(ended_at);
    }

    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" AND status NOT IN ('COMPLETED', 'FAILED', 'EXPIRED')");
    if let Some(expected) = expected {
        qb.push(" AND status = ").push_bind(expected.as_str());
    }
    qb.push(" RETURNING *");
    qb
}

#[async_trait]
impl CallRepository for PgCallRepository {
    async fn insert(&self, call: &Call) -> Result<Call, DomainError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            INSERT INTO calls (id, destination, script_id, metadata, status, attempts,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(call.id)
        .bind(&call.destination)
        .bind(&call.script_id)
        .bind(&call.metadata)
        .bind(call.status.as_str())
        .bind(call.attempts)
        .bind(call.created_at)
        .bind(call.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // idx_calls_active_destination
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::Conflict(
                format!("destination {} already has an active call", call.destination),
            ),
            _ => repo_err(e),
        })?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        let row = sqlx::query_as::<_, CallRow>("SELECT * FROM calls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(repo_err)?;

        row.map(Call::try_from).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Call>, DomainError> {
        let row = sqlx::query_as::<_, CallRow>("SELECT * FROM calls WHERE external_call_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(repo_err)?;

        row.map(Call::try_from).transpose()
    }

    async fn find_active_by_destination(
        &self,
        destination: &str,
    ) -> Result<Option<Call>, DomainError> {
        let row = sqlx::query_as::<_, CallRow>(
            "SELECT * FROM calls WHERE destination = $1 AND status IN ('PENDING', 'IN_PROGRESS')",
        )
        .bind(destination)
        .fetch_optional(&self.pool)
        .await
        .map_err(repo_err)?;

        row.map(Call::try_from).transpose()
    }

    async fn update(&self, id: Uuid, patch: &CallPatch) -> Result<Option<Call>, DomainError> {
        let row = build_update(id, None, patch, Utc::now())
            .build_query_as::<CallRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(repo_err)?;

        row.map(Call::try_from).transpose()
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: CallStatus,
        patch: &CallPatch,
    ) -> Result<Option<Call>, DomainError> {
        let row = build_update(id, Some(expected), patch, Utc::now())
            .build_query_as::<CallRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(repo_err)?;

        row.map(Call::try_from).transpose()
    }

    async fn claim_oldest_pending(&self, now: DateTime<Utc>) -> Result<Option<Call>, DomainError> {
        // One statement: the status guard on the outer UPDATE makes a lost
        // race affect zero rows instead of double-assigning the call.
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE calls
            SET status = 'IN_PROGRESS',
                started_at = $1,
                updated_at = $1
            WHERE id = (
                SELECT id
                FROM calls
                WHERE status = 'PENDING'
                  AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
              AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(repo_err)?;

        row.map(Call::try_from).transpose()
    }

    async fn count_in_status(&self, status: CallStatus) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM calls WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(repo_err)
    }

    async fn count_by_status(&self) -> Result<StatusCounts, DomainError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM calls GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(repo_err)?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let status = status
                .parse::<CallStatus>()
                .map_err(DomainError::Repository)?;
            counts.add(status, count);
        }

        Ok(counts)
    }

    async fn list(
        &self,
        status: Option<CallStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Call>, i64), DomainError> {
        let status = status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT * FROM calls
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(repo_err)?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM calls WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(repo_err)?;

        let calls = rows
            .into_iter()
            .map(Call::try_from)
            .collect::<Result<Vec<Call>, _>>()?;

        Ok((calls, total))
    }

    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET status = 'EXPIRED',
                ended_at = $2,
                updated_at = $2
            WHERE status = 'PENDING'
              AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(repo_err)?;

        Ok(result.rows_affected())
    }

    async fn reclaim_unaccepted_before(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET status = 'PENDING',
                started_at = NULL,
                next_attempt_at = NULL,
                last_error = $3,
                updated_at = $2
            WHERE status = 'IN_PROGRESS'
              AND external_call_id IS NULL
              AND started_at < $1
            "#,
        )
        .bind(started_before)
        .bind(now)
        .bind(ABANDONED_DISPATCH)
        .execute(&self.pool)
        .await
        .map_err(repo_err)?;

        Ok(result.rows_affected())
    }
}
