use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Registered trigger definition (§3 Pattern, C5 Trigger Engine). A pattern
/// fires at most once per `(pattern_id, node embedding_version)` pair; the
/// service layer tracks that via `last_fired_version`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pattern {
	pub pattern_id: Uuid,
	pub tenant_id: Option<String>,
	pub name: String,
	pub node_class: String,
	pub reference_embedding: Vec<f32>,
	pub threshold: f32,
	pub webhook_url: Option<String>,
	pub enabled: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternFireRecord {
	pub pattern_id: Uuid,
	pub node_id: Uuid,
	pub embedding_version: i64,
	pub fired_at: OffsetDateTime,
}
