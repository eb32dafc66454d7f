use kgraph_domain::embedding_history::cosine_distance;
use kgraph_domain::event::EventKind;
use kgraph_domain::node::Node;
use kgraph_storage::db::Db;
use serde_json::json;
use time::OffsetDateTime;

use crate::embedding::{EmbedOutcome, EmbeddingBackend};
use crate::trigger::{self, FiredTrigger};
use crate::{Error, Result};

/// Result of re-embedding one node: the caller (scheduler loop or the
/// force-refresh route) only needs to know what to log/report, the write
/// itself already landed.
pub struct RefreshOutcome {
	pub drift: f32,
	pub drift_high: bool,
	pub fired: Vec<FiredTrigger>,
}

/// Re-embeds `node`'s text, computes drift against whatever embedding was
/// stored before this call, and runs the trigger registry against the new
/// vector. Shared by the scheduler's refresh loop and the `POST
/// /nodes/{id}/refresh` route so both apply the exact same drift/trigger
/// semantics.
pub async fn refresh_node<B: EmbeddingBackend>(db: &Db, tenant_id: &str, backend: &B, node: &Node) -> Result<RefreshOutcome> {
	let embedding_version = kgraph_storage::nodes::next_embedding_version(db, node.node_id).await?;
	let text = crate::node_text(node);
	let vector = match backend.embed(&[text]).await?.into_iter().next() {
		Some(EmbedOutcome::Vector(v)) => v,
		Some(EmbedOutcome::Error(message)) => {
			kgraph_storage::nodes::mark_embedding_failed(
				db,
				node.node_id,
				node.embedding_lifecycle.attempts as i32 + 1,
				&message,
			)
			.await?;
			return Err(Error::Provider { message });
		},
		None => return Err(Error::Provider { message: "embedding backend returned no vector".to_string() }),
	};

	let previous = kgraph_storage::nodes::get_embedding(db, node.node_id).await?;
	let drift = previous.as_deref().and_then(|prev| cosine_distance(prev, &vector)).unwrap_or(0.0);

	kgraph_storage::nodes::upsert_embedding(db, node.node_id, embedding_version, &vector, drift).await?;
	kgraph_storage::nodes::mark_refreshed(db, node.node_id, OffsetDateTime::now_utc()).await?;
	kgraph_storage::events::append_event(
		db,
		tenant_id,
		Some(node.node_id),
		EventKind::Refreshed,
		json!({ "drift": drift, "embedding_version": embedding_version }),
	)
	.await?;

	let drift_high = node.refresh_policy.drift_threshold.map(|threshold| drift >= threshold).unwrap_or(false);
	if drift_high {
		kgraph_storage::events::append_event(
			db,
			tenant_id,
			Some(node.node_id),
			EventKind::DriftHigh,
			json!({ "drift": drift }),
		)
		.await?;
	}

	let mut fired = Vec::new();
	let mut seen_classes = std::collections::HashSet::new();
	for class in &node.classes {
		if !seen_classes.insert(class.clone()) {
			continue;
		}
		fired.extend(
			trigger::evaluate_triggers(db, tenant_id, class, node.node_id, &vector, embedding_version).await?,
		);
	}

	Ok(RefreshOutcome { drift, drift_high, fired })
}
