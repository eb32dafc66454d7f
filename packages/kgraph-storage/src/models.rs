use serde_json::Value as JsonValue;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct NodeRow {
	pub node_id: Uuid,
	pub tenant_id: String,
	pub classes: Vec<String>,
	pub props: JsonValue,
	pub payload_ref: Option<String>,
	pub refresh_interval_seconds: Option<i64>,
	pub refresh_cron: Option<String>,
	pub drift_threshold: Option<f32>,
	pub triggers: JsonValue,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub last_refreshed: Option<OffsetDateTime>,
	pub deleted_at: Option<OffsetDateTime>,
	pub purge_after: Option<OffsetDateTime>,
	pub embedding_status: String,
	pub embedding_attempts: i32,
	pub embedding_error: Option<String>,
	pub embedding_updated_at: Option<OffsetDateTime>,
	pub content_hash: Option<String>,
	pub etag: Option<String>,
	pub version: i64,
}

#[derive(Debug, FromRow)]
pub struct NodeVersionRow {
	pub version_id: Uuid,
	pub node_id: Uuid,
	pub tenant_id: String,
	pub version: i64,
	pub classes: Vec<String>,
	pub props: JsonValue,
	pub content_hash: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct EdgeRow {
	pub edge_id: Uuid,
	pub tenant_id: String,
	pub src_node_id: Uuid,
	pub dst_node_id: Uuid,
	pub relation: String,
	pub props: JsonValue,
	pub created_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, FromRow)]
pub struct EventRow {
	pub event_id: Uuid,
	pub tenant_id: String,
	pub node_id: Option<Uuid>,
	pub kind: String,
	pub detail: JsonValue,
	pub occurred_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct PatternRow {
	pub pattern_id: Uuid,
	pub tenant_id: String,
	pub name: String,
	pub node_class: String,
	pub threshold: f32,
	pub webhook_url: Option<String>,
	pub enabled: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ConnectorConfigRow {
	pub connector_id: Uuid,
	pub tenant_id: String,
	pub provider: String,
	pub encrypted_secret: Vec<u8>,
	pub key_version: i32,
	pub webhook_scheme: Option<String>,
	pub topic_allowlist: Vec<String>,
	pub status: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ConnectorCursorRow {
	pub connector_id: Uuid,
	pub tenant_id: String,
	pub cursor: Option<String>,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ConnectorQueueJobRow {
	pub job_id: Uuid,
	pub tenant_id: String,
	pub provider: String,
	pub connector_id: Uuid,
	pub payload: JsonValue,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
