use kgraph_domain::embedding_history::cosine_distance;
use kgraph_domain::event::EventKind;
use kgraph_storage::db::Db;
use serde_json::json;
use uuid::Uuid;

use crate::Result;

#[derive(Clone, Debug)]
pub struct FiredTrigger {
	pub pattern_id: Uuid,
	pub pattern_name: String,
	pub similarity: f32,
	pub webhook_url: Option<String>,
}

/// Evaluates every enabled pattern registered on `node_class` against
/// `node_embedding`, fires at most once per `(node_id, pattern_id,
/// embedding_version)` (the version is the fire-once key), and appends a
/// `trigger_fired` event for each fresh fire. Returns the patterns that
/// fired so the caller can dispatch their webhooks (an external
/// collaborator this module does not itself call).
pub async fn evaluate_triggers(
	db: &Db,
	tenant_id: &str,
	node_class: &str,
	node_id: Uuid,
	node_embedding: &[f32],
	embedding_version: i64,
) -> Result<Vec<FiredTrigger>> {
	let patterns = kgraph_storage::patterns::enabled_patterns_for_class(db, node_class).await?;
	let mut fired = Vec::new();

	for pattern in patterns {
		if pattern.tenant_id.as_deref() != Some(tenant_id) {
			continue;
		}

		let Some(similarity) = cosine_distance(node_embedding, &pattern.reference_embedding)
			.map(|distance| 1.0 - distance)
		else {
			continue;
		};

		if similarity < pattern.threshold {
			continue;
		}

		if kgraph_storage::patterns::has_fired(db, pattern.pattern_id, node_id, embedding_version).await? {
			continue;
		}

		kgraph_storage::patterns::record_fire(db, pattern.pattern_id, node_id, embedding_version).await?;
		kgraph_storage::events::append_event(
			db,
			tenant_id,
			Some(node_id),
			EventKind::TriggerFired,
			json!({ "pattern_id": pattern.pattern_id, "pattern_name": pattern.name, "similarity": similarity }),
		)
		.await?;

		fired.push(FiredTrigger {
			pattern_id: pattern.pattern_id,
			pattern_name: pattern.name,
			similarity,
			webhook_url: pattern.webhook_url,
		});
	}

	Ok(fired)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn similarity_derives_from_cosine_distance() {
		let a = vec![1.0_f32, 0.0];
		let b = vec![1.0_f32, 0.0];
		let distance = cosine_distance(&a, &b).unwrap();
		assert_eq!(1.0 - distance, 1.0);
	}
}
