use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

/// Point-in-time snapshot of a node's props/classes, written on every update
/// (§3 NodeVersion). Used to reconstruct history and to diff for drift.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeVersion {
	pub version_id: Uuid,
	pub node_id: Uuid,
	pub tenant_id: Option<String>,
	pub version: i64,
	pub classes: Vec<String>,
	pub props: JsonValue,
	pub content_hash: Option<String>,
	pub created_at: OffsetDateTime,
}
