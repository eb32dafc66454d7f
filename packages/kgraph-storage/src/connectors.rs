use kgraph_domain::connector::{ConnectorConfig, ConnectorCursor, ConnectorStatus};
use serde_json::Value as JsonValue;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Db;
use crate::models::{ConnectorConfigRow, ConnectorCursorRow, ConnectorQueueJobRow};
use crate::{Error, Result};

fn status_label(status: ConnectorStatus) -> &'static str {
	match status {
		ConnectorStatus::Active => "active",
		ConnectorStatus::Paused => "paused",
		ConnectorStatus::Failed => "failed",
	}
}

fn connector_from_row(row: ConnectorConfigRow) -> ConnectorConfig {
	let status = match row.status.as_str() {
		"paused" => ConnectorStatus::Paused,
		"failed" => ConnectorStatus::Failed,
		_ => ConnectorStatus::Active,
	};
	ConnectorConfig {
		connector_id: row.connector_id,
		tenant_id: row.tenant_id,
		provider: row.provider,
		encrypted_secret: row.encrypted_secret,
		key_version: row.key_version.max(0) as u32,
		webhook_scheme: row.webhook_scheme,
		topic_allowlist: row.topic_allowlist,
		status,
		created_at: row.created_at,
		updated_at: row.updated_at,
	}
}

pub async fn upsert_connector(
	db: &Db,
	tenant_id: &str,
	provider: &str,
	encrypted_secret: &[u8],
	key_version: u32,
	webhook_scheme: Option<&str>,
	topic_allowlist: &[String],
) -> Result<ConnectorConfig> {
	let now = OffsetDateTime::now_utc();
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;

	let row = sqlx::query_as::<_, ConnectorConfigRow>(
		"INSERT INTO connector_configs \
		 (tenant_id, provider, encrypted_secret, key_version, webhook_scheme, topic_allowlist, updated_at) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7) \
		 ON CONFLICT (tenant_id, provider) DO UPDATE SET \
		 encrypted_secret = EXCLUDED.encrypted_secret, key_version = EXCLUDED.key_version, \
		 webhook_scheme = EXCLUDED.webhook_scheme, topic_allowlist = EXCLUDED.topic_allowlist, \
		 updated_at = EXCLUDED.updated_at \
		 RETURNING connector_id, tenant_id, provider, encrypted_secret, key_version, webhook_scheme, \
		 topic_allowlist, status, created_at, updated_at",
	)
	.bind(tenant_id)
	.bind(provider)
	.bind(encrypted_secret)
	.bind(key_version as i32)
	.bind(webhook_scheme)
	.bind(topic_allowlist)
	.bind(now)
	.fetch_one(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(connector_from_row(row))
}

pub async fn get_connector(db: &Db, tenant_id: &str, provider: &str) -> Result<Option<ConnectorConfig>> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let row = sqlx::query_as::<_, ConnectorConfigRow>(
		"SELECT connector_id, tenant_id, provider, encrypted_secret, key_version, webhook_scheme, \
		 topic_allowlist, status, created_at, updated_at FROM connector_configs \
		 WHERE provider = $1",
	)
	.bind(provider)
	.fetch_optional(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(row.map(connector_from_row))
}

pub async fn get_cursor(db: &Db, tenant_id: &str, connector_id: Uuid) -> Result<Option<ConnectorCursor>> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let row = sqlx::query_as::<_, ConnectorCursorRow>(
		"SELECT connector_id, tenant_id, cursor, updated_at FROM connector_cursors WHERE connector_id = $1",
	)
	.bind(connector_id)
	.fetch_optional(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(row.map(|row| ConnectorCursor {
		connector_id: row.connector_id,
		tenant_id: row.tenant_id,
		cursor: row.cursor,
		updated_at: row.updated_at,
	}))
}

pub async fn set_cursor(db: &Db, tenant_id: &str, connector_id: Uuid, cursor: Option<&str>) -> Result<()> {
	let now = OffsetDateTime::now_utc();
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	sqlx::query(
		"INSERT INTO connector_cursors (connector_id, tenant_id, cursor, updated_at) VALUES ($1,$2,$3,$4) \
		 ON CONFLICT (connector_id) DO UPDATE SET cursor = EXCLUDED.cursor, updated_at = EXCLUDED.updated_at",
	)
	.bind(connector_id)
	.bind(tenant_id)
	.bind(cursor)
	.bind(now)
	.execute(&mut *tx)
	.await?;
	tx.commit().await?;
	Ok(())
}

/// Enqueues an ingestion job. The `(tenant_id, provider)` pair is carried
/// redundantly on the job row (alongside `connector_id`) so the worker pool
/// can group jobs into per-(tenant, provider) queues without a join.
pub async fn enqueue_job(
	db: &Db,
	tenant_id: &str,
	provider: &str,
	connector_id: Uuid,
	payload: JsonValue,
) -> Result<Uuid> {
	let row = sqlx::query(
		"INSERT INTO connector_queue (tenant_id, provider, connector_id, payload) VALUES ($1,$2,$3,$4) \
		 RETURNING job_id",
	)
	.bind(tenant_id)
	.bind(provider)
	.bind(connector_id)
	.bind(&payload)
	.fetch_one(&db.pool)
	.await?;

	Ok(row.try_get::<Uuid, _>("job_id").map_err(Error::Sqlx)?)
}

/// Claims the oldest pending/failed job whose `available_at` has passed,
/// across every tenant. `FOR UPDATE SKIP LOCKED` lets multiple worker
/// threads claim distinct jobs concurrently without blocking on each other.
pub async fn claim_next_job(db: &Db, now: OffsetDateTime, lease: time::Duration) -> Result<Option<ConnectorQueueJobRow>> {
	let mut tx = db.pool.begin().await?;
	let row = sqlx::query_as::<_, ConnectorQueueJobRow>(
		"SELECT job_id, tenant_id, provider, connector_id, payload, status, attempts, last_error, \
		 available_at, created_at, updated_at FROM connector_queue \
		 WHERE status IN ('pending', 'failed') AND available_at <= $1 \
		 ORDER BY available_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;

	let job = if let Some(row) = row {
		sqlx::query("UPDATE connector_queue SET status = 'processing', available_at = $1, updated_at = $2 WHERE job_id = $3")
			.bind(now + lease)
			.bind(now)
			.bind(row.job_id)
			.execute(&mut *tx)
			.await?;
		Some(row)
	} else {
		None
	};

	tx.commit().await?;
	Ok(job)
}

pub async fn mark_job_done(db: &Db, job_id: Uuid) -> Result<()> {
	sqlx::query("UPDATE connector_queue SET status = 'done', updated_at = $1 WHERE job_id = $2")
		.bind(OffsetDateTime::now_utc())
		.bind(job_id)
		.execute(&db.pool)
		.await?;
	Ok(())
}

pub async fn mark_job_failed(
	db: &Db,
	job_id: Uuid,
	next_attempts: i32,
	available_at: OffsetDateTime,
	error: &str,
) -> Result<()> {
	sqlx::query(
		"UPDATE connector_queue SET status = 'failed', attempts = $1, last_error = $2, \
		 available_at = $3, updated_at = $4 WHERE job_id = $5",
	)
	.bind(next_attempts)
	.bind(error)
	.bind(available_at)
	.bind(OffsetDateTime::now_utc())
	.bind(job_id)
	.execute(&db.pool)
	.await?;
	Ok(())
}

pub async fn move_to_dlq(db: &Db, job: &ConnectorQueueJobRow, error: &str) -> Result<()> {
	let mut tx = db.pool.begin().await?;
	sqlx::query(
		"INSERT INTO connector_dlq (job_id, tenant_id, provider, connector_id, payload, error, attempts) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7)",
	)
	.bind(job.job_id)
	.bind(&job.tenant_id)
	.bind(&job.provider)
	.bind(job.connector_id)
	.bind(&job.payload)
	.bind(error)
	.bind(job.attempts)
	.execute(&mut *tx)
	.await?;
	sqlx::query("DELETE FROM connector_queue WHERE job_id = $1").bind(job.job_id).execute(&mut *tx).await?;
	tx.commit().await?;
	Ok(())
}

pub async fn queue_depth(db: &Db, provider: &str) -> Result<i64> {
	let row = sqlx::query(
		"SELECT count(*) AS depth FROM connector_queue WHERE provider = $1 AND status IN ('pending', 'failed')",
	)
	.bind(provider)
	.fetch_one(&db.pool)
	.await?;
	Ok(row.try_get("depth")?)
}
