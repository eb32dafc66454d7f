use kgraph_domain::node::Node;
use kgraph_domain::value::PropValue;
use serde_json::Value as JsonValue;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::convert::{format_vector_text, node_from_row, parse_vector_text};
use crate::db::Db;
use crate::models::NodeRow;
use crate::{Error, Result};

const NODE_COLUMNS: &str = "node_id, tenant_id, classes, props, payload_ref, refresh_interval_seconds, \
	refresh_cron, drift_threshold, triggers, created_at, updated_at, last_refreshed, deleted_at, \
	purge_after, embedding_status, embedding_attempts, embedding_error, embedding_updated_at, \
	content_hash, etag, version";

pub struct NewNode {
	pub tenant_id: String,
	pub classes: Vec<String>,
	pub props: std::collections::BTreeMap<String, PropValue>,
	pub payload_ref: Option<String>,
	pub refresh_interval_seconds: Option<i64>,
	pub refresh_cron: Option<String>,
	pub drift_threshold: Option<f32>,
	pub content_hash: Option<String>,
	pub etag: Option<String>,
}

pub async fn create_node(db: &Db, tenant_id: &str, new_node: NewNode) -> Result<Node> {
	let now = OffsetDateTime::now_utc();
	let props_json: JsonValue = PropValue::Object(new_node.props).into();

	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let row = sqlx::query_as::<_, NodeRow>(&format!(
		"INSERT INTO nodes (tenant_id, classes, props, payload_ref, refresh_interval_seconds, \
		 refresh_cron, drift_threshold, created_at, updated_at, content_hash, etag) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11) RETURNING {NODE_COLUMNS}"
	))
	.bind(&new_node.tenant_id)
	.bind(&new_node.classes)
	.bind(&props_json)
	.bind(&new_node.payload_ref)
	.bind(new_node.refresh_interval_seconds)
	.bind(&new_node.refresh_cron)
	.bind(new_node.drift_threshold)
	.bind(now)
	.bind(now)
	.bind(&new_node.content_hash)
	.bind(&new_node.etag)
	.fetch_one(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(node_from_row(row))
}

pub async fn get_node(db: &Db, tenant_id: &str, node_id: Uuid) -> Result<Option<Node>> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let row = sqlx::query_as::<_, NodeRow>(&format!(
		"SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = $1 AND deleted_at IS NULL"
	))
	.bind(node_id)
	.fetch_optional(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(row.map(node_from_row))
}

pub struct NodeUpdate {
	pub classes: Option<Vec<String>>,
	pub props: Option<std::collections::BTreeMap<String, PropValue>>,
	pub payload_ref: Option<String>,
	pub content_hash: Option<String>,
	pub etag: Option<String>,
	pub expected_version: i64,
}

/// Optimistic-concurrency update: fails with [`Error::VersionConflict`] if
/// `expected_version` doesn't match the stored row, and snapshots the prior
/// classes/props into `node_versions` before applying the change.
pub async fn update_node(db: &Db, tenant_id: &str, node_id: Uuid, update: NodeUpdate) -> Result<Node> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;

	let current = sqlx::query_as::<_, NodeRow>(&format!(
		"SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = $1 AND deleted_at IS NULL FOR UPDATE"
	))
	.bind(node_id)
	.fetch_optional(&mut *tx)
	.await?
	.ok_or_else(|| Error::NotFound(format!("node {node_id} not found")))?;

	if current.version != update.expected_version {
		return Err(Error::VersionConflict {
			node_id,
			expected: update.expected_version,
			found: current.version,
		});
	}

	sqlx::query(
		"INSERT INTO node_versions (node_id, tenant_id, version, classes, props, content_hash) \
		 VALUES ($1,$2,$3,$4,$5,$6)",
	)
	.bind(node_id)
	.bind(tenant_id)
	.bind(current.version)
	.bind(&current.classes)
	.bind(&current.props)
	.bind(&current.content_hash)
	.execute(&mut *tx)
	.await?;

	let new_classes = update.classes.unwrap_or(current.classes);
	let new_props: JsonValue = match update.props {
		Some(props) => PropValue::Object(props).into(),
		None => current.props,
	};
	let new_payload_ref = update.payload_ref.or(current.payload_ref);
	let new_content_hash = update.content_hash.or(current.content_hash);
	let new_etag = update.etag.or(current.etag);
	let now = OffsetDateTime::now_utc();

	let row = sqlx::query_as::<_, NodeRow>(&format!(
		"UPDATE nodes SET classes = $1, props = $2, payload_ref = $3, content_hash = $4, etag = $5, \
		 updated_at = $6, version = version + 1 WHERE node_id = $7 RETURNING {NODE_COLUMNS}"
	))
	.bind(&new_classes)
	.bind(&new_props)
	.bind(&new_payload_ref)
	.bind(&new_content_hash)
	.bind(&new_etag)
	.bind(now)
	.bind(node_id)
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(node_from_row(row))
}

pub async fn soft_delete_node(db: &Db, tenant_id: &str, node_id: Uuid, purge_after: OffsetDateTime) -> Result<()> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let now = OffsetDateTime::now_utc();
	let result = sqlx::query(
		"UPDATE nodes SET deleted_at = $1, purge_after = $2, updated_at = $1 WHERE node_id = $3 AND deleted_at IS NULL",
	)
	.bind(now)
	.bind(purge_after)
	.bind(node_id)
	.execute(&mut *tx)
	.await?;
	tx.commit().await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("node {node_id} not found")));
	}
	Ok(())
}

pub async fn hard_delete_node(db: &Db, tenant_id: &str, node_id: Uuid) -> Result<()> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	sqlx::query("DELETE FROM nodes WHERE node_id = $1").bind(node_id).execute(&mut *tx).await?;
	tx.commit().await?;
	Ok(())
}

/// Purges every node whose `purge_after` has elapsed, across all tenants.
/// Runs outside a tenant-scoped transaction because the purge loop is an
/// internal maintenance job, not a tenant-facing request.
pub async fn purge_expired(db: &Db, now: OffsetDateTime, batch_size: u32) -> Result<Vec<Uuid>> {
	let rows = sqlx::query(
		"DELETE FROM nodes WHERE node_id IN \
		 (SELECT node_id FROM nodes WHERE purge_after IS NOT NULL AND purge_after <= $1 LIMIT $2) \
		 RETURNING node_id",
	)
	.bind(now)
	.bind(batch_size as i64)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(|row| row.get("node_id")).collect())
}

/// Nodes across all tenants whose refresh schedule is due. The scheduler
/// resolves `cron`/`interval_seconds` precedence itself via
/// `kgraph_domain::schedule::next_due`; this query only returns candidates
/// whose `last_refreshed` is old enough that *some* policy might be due.
pub async fn due_for_refresh(db: &Db, now: OffsetDateTime, batch_size: u32) -> Result<Vec<Node>> {
	let rows = sqlx::query_as::<_, NodeRow>(&format!(
		"SELECT {NODE_COLUMNS} FROM nodes \
		 WHERE deleted_at IS NULL AND (refresh_interval_seconds IS NOT NULL OR refresh_cron IS NOT NULL) \
		 AND (last_refreshed IS NULL OR last_refreshed <= $1) \
		 ORDER BY last_refreshed ASC NULLS FIRST LIMIT $2"
	))
	.bind(now)
	.bind(batch_size as i64)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(node_from_row).collect())
}

/// Nodes across all tenants still waiting for their first embedding.
/// Disjoint from [`due_for_refresh`]: a node with no refresh policy is
/// embedded exactly once here and never revisited by the refresh loop.
pub async fn queued_for_embedding(db: &Db, batch_size: u32) -> Result<Vec<Node>> {
	let rows = sqlx::query_as::<_, NodeRow>(&format!(
		"SELECT {NODE_COLUMNS} FROM nodes \
		 WHERE deleted_at IS NULL AND embedding_status = 'queued' \
		 ORDER BY created_at ASC LIMIT $1"
	))
	.bind(batch_size as i64)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(node_from_row).collect())
}

pub async fn mark_refreshed(db: &Db, node_id: Uuid, at: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE nodes SET last_refreshed = $1, updated_at = $1 WHERE node_id = $2")
		.bind(at)
		.bind(node_id)
		.execute(&db.pool)
		.await?;
	Ok(())
}

/// The version the next embedding write for this node should use. Versions
/// are a plain per-node counter (`embedding_history`'s PK), not a global
/// sequence, so a brand-new node always starts at 1.
pub async fn next_embedding_version(db: &Db, node_id: Uuid) -> Result<i64> {
	let row = sqlx::query(
		"SELECT coalesce(max(embedding_version), 0) + 1 AS next_version FROM embedding_history WHERE node_id = $1",
	)
	.bind(node_id)
	.fetch_one(&db.pool)
	.await?;
	Ok(row.get("next_version"))
}

/// `drift` is `1 − cosine(prev_embedding, new_embedding)` against whatever
/// embedding this node held before the call, or `0.0` for a node's first
/// embedding — the caller (`refresh_node`, the connector ingest pipeline, the
/// scheduler's initial-embed tick) has already computed it before writing.
pub async fn upsert_embedding(
	db: &Db,
	node_id: Uuid,
	embedding_version: i64,
	vector: &[f32],
	drift: f32,
) -> Result<()> {
	let vec_text = format_vector_text(vector);
	let now = OffsetDateTime::now_utc();
	let mut tx = db.pool.begin().await?;

	sqlx::query(
		"UPDATE nodes SET embedding = $1::vector, embedding_status = 'ready', embedding_error = NULL, \
		 embedding_updated_at = $2 WHERE node_id = $3",
	)
	.bind(&vec_text)
	.bind(now)
	.bind(node_id)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"INSERT INTO embedding_history (node_id, tenant_id, embedding_version, embedding, drift_from_previous) \
		 SELECT node_id, tenant_id, $1, $2::vector, $3 FROM nodes WHERE node_id = $4 \
		 ON CONFLICT (node_id, embedding_version) DO UPDATE SET \
		 embedding = EXCLUDED.embedding, drift_from_previous = EXCLUDED.drift_from_previous",
	)
	.bind(embedding_version)
	.bind(&vec_text)
	.bind(drift as f64)
	.bind(node_id)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;
	Ok(())
}

/// The most recently recorded measured drift for a node, or `0.0` if it has
/// never been embedded more than once. This is the node's actual
/// `1 − cosine(prev,new)` reading, distinct from `RefreshPolicy.drift_threshold`
/// (the level at which a `drift_high` event fires).
pub async fn latest_drift(db: &Db, node_id: Uuid) -> Result<f32> {
	let row = sqlx::query(
		"SELECT drift_from_previous FROM embedding_history WHERE node_id = $1 \
		 ORDER BY embedding_version DESC LIMIT 1",
	)
	.bind(node_id)
	.fetch_optional(&db.pool)
	.await?;
	Ok(row.and_then(|row| row.try_get::<Option<f64>, _>("drift_from_previous").ok().flatten()).unwrap_or(0.0) as f32)
}

/// The embedding as it stood before the in-progress re-embed, used to
/// compute drift. `None` for a node embedded for the first time.
pub async fn get_embedding(db: &Db, node_id: Uuid) -> Result<Option<Vec<f32>>> {
	let row = sqlx::query("SELECT embedding::text AS embedding FROM nodes WHERE node_id = $1")
		.bind(node_id)
		.fetch_optional(&db.pool)
		.await?;
	Ok(row.and_then(|row| row.try_get::<Option<String>, _>("embedding").ok().flatten()).map(|text| parse_vector_text(&text)))
}

pub async fn mark_embedding_failed(db: &Db, node_id: Uuid, attempts: i32, error: &str) -> Result<()> {
	sqlx::query(
		"UPDATE nodes SET embedding_status = 'failed', embedding_attempts = $1, embedding_error = $2 \
		 WHERE node_id = $3",
	)
	.bind(attempts)
	.bind(error)
	.bind(node_id)
	.execute(&db.pool)
	.await?;
	Ok(())
}
