use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use kgraph_config::Scheduler as SchedulerConfig;
use kgraph_service::embedding::{EmbedOutcome, EmbeddingBackend};
use kgraph_service::trigger::{self, FiredTrigger};
use kgraph_service::{node_text, refresh};
use kgraph_storage::db::Db;
use time::{Duration, OffsetDateTime};
use tracing::{error, warn};

const POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);
const REFRESH_BATCH_SIZE: u32 = 50;
const EMBED_BATCH_SIZE: u32 = 50;

/// Nodes with no tenant (shared across every tenant, per the node model)
/// refresh and fire triggers under this synthetic tenant id rather than
/// being excluded from the cycle entirely.
const SHARED_TENANT: &str = "shared";

/// Runs the refresh, initial-embed, and purge cycles on their own
/// independent timers inside one loop, mirroring the tick-and-sleep shape of
/// the connector ingestion worker's poll loop.
pub async fn run_scheduler<B: EmbeddingBackend>(db: Arc<Db>, backend: Arc<B>, cfg: SchedulerConfig) -> color_eyre::Result<()> {
	let mut last_refresh = OffsetDateTime::UNIX_EPOCH;
	let mut last_embed = OffsetDateTime::UNIX_EPOCH;
	let mut last_purge = OffsetDateTime::UNIX_EPOCH;

	loop {
		let now = OffsetDateTime::now_utc();

		if now - last_refresh >= Duration::seconds(cfg.refresh_interval_seconds as i64) {
			if let Err(err) = refresh_tick(&db, backend.as_ref()).await {
				error!(error = %err, "Refresh tick failed.");
			}
			last_refresh = now;
		}

		if now - last_embed >= Duration::seconds(cfg.trigger_interval_seconds as i64) {
			if let Err(err) = initial_embed_tick(&db, backend.as_ref()).await {
				error!(error = %err, "Initial-embed tick failed.");
			}
			last_embed = now;
		}

		if now - last_purge >= Duration::seconds(cfg.purge_interval_seconds as i64) {
			if let Err(err) = purge_tick(&db, cfg.purge_batch_size).await {
				error!(error = %err, "Purge tick failed.");
			}
			last_purge = now;
		}

		tokio::time::sleep(POLL_INTERVAL).await;
	}
}

/// Re-embeds every node whose refresh policy is actually due, resolving true
/// due-ness with `kgraph_domain::schedule::next_due` since the storage query
/// only narrows to nodes a policy *might* apply to.
async fn refresh_tick<B: EmbeddingBackend>(db: &Db, backend: &B) -> color_eyre::Result<()> {
	let now = OffsetDateTime::now_utc();
	let candidates = kgraph_storage::nodes::due_for_refresh(db, now, REFRESH_BATCH_SIZE).await?;

	let mut refreshed = 0usize;
	let mut failed = 0usize;
	for node in &candidates {
		let since = node.last_refreshed.unwrap_or(node.created_at);
		let due_at = match kgraph_domain::schedule::next_due(&node.refresh_policy, since) {
			Ok(Some(due_at)) => due_at,
			Ok(None) => continue,
			Err(err) => {
				warn!(node_id = %node.node_id, error = %err, "Skipping node with an invalid refresh policy.");
				continue;
			},
		};
		if due_at > now {
			continue;
		}

		let tenant_id = node.tenant_id.clone().unwrap_or_else(|| SHARED_TENANT.to_string());
		match refresh::refresh_node(db, &tenant_id, backend, node).await {
			Ok(outcome) => {
				refreshed += 1;
				dispatch_fired_triggers(&outcome.fired).await;
			},
			Err(err) => {
				failed += 1;
				error!(node_id = %node.node_id, error = %err, "Node refresh failed.");
			},
		}
	}

	kgraph_observability::scheduler::record_refresh_tick(candidates.len(), refreshed, failed);
	Ok(())
}

/// Embeds every node still waiting on its first embedding and runs the
/// trigger registry against the freshly computed vector — the "on node
/// create" trigger-evaluation case the pattern registry describes, deferred
/// here until the node actually has something to compare.
async fn initial_embed_tick<B: EmbeddingBackend>(db: &Db, backend: &B) -> color_eyre::Result<()> {
	let nodes = kgraph_storage::nodes::queued_for_embedding(db, EMBED_BATCH_SIZE).await?;

	let mut evaluated = 0usize;
	let mut fired_total = 0usize;
	for node in &nodes {
		let tenant_id = node.tenant_id.clone().unwrap_or_else(|| SHARED_TENANT.to_string());
		let text = node_text(node);

		let vector = match backend.embed(&[text]).await {
			Ok(outcomes) => match outcomes.into_iter().next() {
				Some(EmbedOutcome::Vector(vector)) => vector,
				Some(EmbedOutcome::Error(message)) => {
					let _ = kgraph_storage::nodes::mark_embedding_failed(
						db,
						node.node_id,
						node.embedding_lifecycle.attempts as i32 + 1,
						&message,
					)
					.await;
					continue;
				},
				None => continue,
			},
			Err(err) => {
				error!(node_id = %node.node_id, error = %err, "Initial embedding call failed.");
				continue;
			},
		};

		if let Err(err) = kgraph_storage::nodes::upsert_embedding(db, node.node_id, 1, &vector, 0.0).await {
			error!(node_id = %node.node_id, error = %err, "Failed to store initial embedding.");
			continue;
		}
		evaluated += 1;

		let mut seen_classes = HashSet::new();
		for class in &node.classes {
			if !seen_classes.insert(class.clone()) {
				continue;
			}
			match trigger::evaluate_triggers(db, &tenant_id, class, node.node_id, &vector, 1).await {
				Ok(fired) => {
					fired_total += fired.len();
					dispatch_fired_triggers(&fired).await;
				},
				Err(err) => error!(node_id = %node.node_id, error = %err, "Trigger evaluation failed."),
			}
		}
	}

	kgraph_observability::scheduler::record_trigger_tick(evaluated, fired_total);
	Ok(())
}

async fn purge_tick(db: &Db, batch_size: u32) -> color_eyre::Result<()> {
	let purged = kgraph_storage::nodes::purge_expired(db, OffsetDateTime::now_utc(), batch_size).await?;
	kgraph_observability::scheduler::record_purge_tick(purged.len());
	Ok(())
}

/// Dispatches a fired pattern's webhook, best-effort — the registry
/// deliberately treats webhook delivery as an external collaborator it does
/// not call itself, so the scheduler does it here instead.
async fn dispatch_fired_triggers(fired: &[FiredTrigger]) {
	for trigger in fired {
		let Some(url) = &trigger.webhook_url else { continue };
		let payload = serde_json::json!({
			"pattern_id": trigger.pattern_id,
			"pattern_name": trigger.pattern_name,
			"similarity": trigger.similarity,
		});
		let client = reqwest::Client::new();
		if let Err(err) = client.post(url).json(&payload).send().await {
			warn!(pattern_id = %trigger.pattern_id, error = %err, "Trigger webhook dispatch failed.");
		}
	}
}
