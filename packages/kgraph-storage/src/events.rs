use kgraph_domain::event::{Event, EventKind};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::db::Db;
use crate::models::EventRow;
use crate::Result;

fn event_kind_label(kind: EventKind) -> &'static str {
	match kind {
		EventKind::Created => "created",
		EventKind::Updated => "updated",
		EventKind::Refreshed => "refreshed",
		EventKind::TriggerFired => "trigger_fired",
		EventKind::Deleted => "deleted",
		EventKind::Purged => "purged",
		EventKind::AccessViolation => "access_violation",
		EventKind::DriftHigh => "drift_high",
		EventKind::IngestSkipped => "ingest_skipped",
		EventKind::IngestMetadataOnly => "ingest_metadata_only",
	}
}

fn event_from_row(row: EventRow) -> Event {
	let kind = match row.kind.as_str() {
		"updated" => EventKind::Updated,
		"refreshed" => EventKind::Refreshed,
		"trigger_fired" => EventKind::TriggerFired,
		"deleted" => EventKind::Deleted,
		"purged" => EventKind::Purged,
		"access_violation" => EventKind::AccessViolation,
		"drift_high" => EventKind::DriftHigh,
		"ingest_skipped" => EventKind::IngestSkipped,
		"ingest_metadata_only" => EventKind::IngestMetadataOnly,
		_ => EventKind::Created,
	};

	Event {
		event_id: row.event_id,
		tenant_id: Some(row.tenant_id),
		node_id: row.node_id,
		kind,
		detail: row.detail,
		occurred_at: row.occurred_at,
	}
}

pub async fn append_event(
	db: &Db,
	tenant_id: &str,
	node_id: Option<Uuid>,
	kind: EventKind,
	detail: JsonValue,
) -> Result<Event> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let row = sqlx::query_as::<_, EventRow>(
		"INSERT INTO events (tenant_id, node_id, kind, detail) VALUES ($1,$2,$3,$4) \
		 RETURNING event_id, tenant_id, node_id, kind, detail, occurred_at",
	)
	.bind(tenant_id)
	.bind(node_id)
	.bind(event_kind_label(kind))
	.bind(&detail)
	.fetch_one(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(event_from_row(row))
}

pub async fn list_events(db: &Db, tenant_id: &str, node_id: Uuid, limit: i64) -> Result<Vec<Event>> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let rows = sqlx::query_as::<_, EventRow>(
		"SELECT event_id, tenant_id, node_id, kind, detail, occurred_at FROM events \
		 WHERE node_id = $1 ORDER BY occurred_at DESC LIMIT $2",
	)
	.bind(node_id)
	.bind(limit)
	.fetch_all(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(rows.into_iter().map(event_from_row).collect())
}
