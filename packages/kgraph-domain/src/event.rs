use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	Created,
	Updated,
	Refreshed,
	TriggerFired,
	Deleted,
	Purged,
	AccessViolation,
	DriftHigh,
	IngestSkipped,
	IngestMetadataOnly,
}

/// Append-only audit entry (§3 Event). Storage enforces append/list-only
/// access; nothing in this crate exposes a mutator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
	pub event_id: Uuid,
	pub tenant_id: Option<String>,
	pub node_id: Option<Uuid>,
	pub kind: EventKind,
	pub detail: JsonValue,
	pub occurred_at: OffsetDateTime,
}
