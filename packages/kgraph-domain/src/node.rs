use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::value::PropValue;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
	Queued,
	Processing,
	Ready,
	Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingLifecycle {
	pub status: EmbeddingStatus,
	pub attempts: u32,
	pub error: Option<String>,
	pub embedding_updated_at: Option<OffsetDateTime>,
}

impl Default for EmbeddingLifecycle {
	fn default() -> Self {
		Self { status: EmbeddingStatus::Queued, attempts: 0, error: None, embedding_updated_at: None }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerRef {
	pub name: String,
	pub threshold: f32,
}

/// `cron` takes precedence over `interval` on conflict (§3 invariant).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RefreshPolicy {
	pub interval_seconds: Option<i64>,
	pub cron: Option<String>,
	pub drift_threshold: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
	pub node_id: Uuid,
	pub tenant_id: Option<String>,
	pub classes: Vec<String>,
	pub props: BTreeMap<String, PropValue>,
	pub payload_ref: Option<String>,
	pub embedding: Option<Vec<f32>>,
	pub refresh_policy: RefreshPolicy,
	pub triggers: Vec<TriggerRef>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub last_refreshed: Option<OffsetDateTime>,
	pub deleted_at: Option<OffsetDateTime>,
	pub purge_after: Option<OffsetDateTime>,
	pub embedding_lifecycle: EmbeddingLifecycle,
	pub content_hash: Option<String>,
	pub etag: Option<String>,
	pub version: i64,
}

impl Node {
	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}

	pub fn has_class(&self, class: &str) -> bool {
		self.classes.iter().any(|c| c == class)
	}
}

/// Result payload kind tagged on every retrieval hit. Dispatch on this only
/// at the API boundary (design note on polymorphic retrieval results).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
	VectorCosine,
	VectorL2,
	VectorIp,
	Lexical,
	RrfFused,
	WeightedFusion,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorMetric {
	Cosine,
	L2,
	InnerProduct,
}
