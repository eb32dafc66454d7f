use kgraph_domain::node::{EmbeddingLifecycle, EmbeddingStatus, Node, RefreshPolicy, TriggerRef};
use kgraph_domain::value::PropValue;

use crate::models::NodeRow;

pub(crate) fn node_from_row(row: NodeRow) -> Node {
	let status = match row.embedding_status.as_str() {
		"processing" => EmbeddingStatus::Processing,
		"ready" => EmbeddingStatus::Ready,
		"failed" => EmbeddingStatus::Failed,
		_ => EmbeddingStatus::Queued,
	};
	let triggers: Vec<TriggerRef> = serde_json::from_value(row.triggers).unwrap_or_default();
	let props = match PropValue::from(row.props) {
		PropValue::Object(map) => map,
		_ => Default::default(),
	};

	Node {
		node_id: row.node_id,
		tenant_id: Some(row.tenant_id),
		classes: row.classes,
		props,
		payload_ref: row.payload_ref,
		embedding: None,
		refresh_policy: RefreshPolicy {
			interval_seconds: row.refresh_interval_seconds,
			cron: row.refresh_cron,
			drift_threshold: row.drift_threshold,
		},
		triggers,
		created_at: row.created_at,
		updated_at: row.updated_at,
		last_refreshed: row.last_refreshed,
		deleted_at: row.deleted_at,
		purge_after: row.purge_after,
		embedding_lifecycle: EmbeddingLifecycle {
			status,
			attempts: row.embedding_attempts.max(0) as u32,
			error: row.embedding_error,
			embedding_updated_at: row.embedding_updated_at,
		},
		content_hash: row.content_hash,
		etag: row.etag,
		version: row.version,
	}
}

pub(crate) fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");
	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}
	out.push(']');
	out
}

pub(crate) fn parse_vector_text(text: &str) -> Vec<f32> {
	text.trim_matches(['[', ']']).split(',').filter(|s| !s.is_empty()).filter_map(|s| s.parse::<f32>().ok()).collect()
}
