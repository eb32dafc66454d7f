use std::future::Future;

use kgraph_chunking::{Chunk, ChunkingConfig};
use kgraph_domain::connector::IngestDecision;
use kgraph_domain::event::EventKind;
use kgraph_domain::value::PropValue;
use kgraph_storage::db::Db;
use kgraph_storage::models::ConnectorQueueJobRow;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::registry::QueueRegistry;
use crate::{Error, Result};

const CLAIM_LEASE_SECONDS: i64 = 30;

/// Exponential backoff: base delay doubling per attempt, capped after the
/// 6th retry.
pub fn backoff_for_attempt(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
	let exp = attempt.saturating_sub(1).min(6);
	let backoff_ms = base_ms.saturating_mul(1u64 << exp).min(max_ms);
	Duration::milliseconds(backoff_ms as i64)
}

/// Provider-side fetch surface the ingestion decision needs. Each connector
/// provider implements this against its own API; the worker pool is
/// provider-agnostic.
pub trait ProviderFetcher: Send + Sync {
	fn fetch_metadata(
		&self,
		payload: &serde_json::Value,
	) -> impl Future<Output = Result<FetchedMetadata>> + Send;

	fn fetch_body(&self, payload: &serde_json::Value) -> impl Future<Output = Result<String>> + Send;
}

pub struct FetchedMetadata {
	pub etag: Option<String>,
	pub external_node_id: Option<Uuid>,
}

/// Embedding entry point the worker calls once per chunk after a re-embed
/// decision. Kept as a narrow trait (rather than depending on
/// `kgraph-service`) so the connector runtime doesn't need the retrieval
/// engine's full surface.
pub trait ChunkEmbedder: Send + Sync {
	fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

pub struct WorkerConfig {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub chunking: ChunkingConfig,
}

/// Drains one claimed job to completion: fetch metadata, decide
/// skip/metadata-only/re-embed, act, and report the outcome back onto the
/// queue (done / failed-with-backoff / DLQ).
pub async fn process_next<F: ProviderFetcher, E: ChunkEmbedder>(
	db: &Db,
	registry: &QueueRegistry,
	fetcher: &F,
	embedder: &E,
	cfg: &WorkerConfig,
) -> Result<bool> {
	let now = OffsetDateTime::now_utc();
	let Some(job) = kgraph_storage::connectors::claim_next_job(db, now, Duration::seconds(CLAIM_LEASE_SECONDS))
		.await
		.map_err(Error::Storage)?
	else {
		return Ok(false);
	};

	registry.mark_active(&job.tenant_id, &job.provider);
	let result = handle_job(db, &job, fetcher, embedder, cfg).await;

	match result {
		Ok(()) => {
			kgraph_storage::connectors::mark_job_done(db, job.job_id).await.map_err(Error::Storage)?;
		},
		Err(err) if err.is_permanent() => {
			warn!(job_id = %job.job_id, error = %err, "Connector job failed permanently, moving to DLQ.");
			kgraph_storage::connectors::move_to_dlq(db, &job, &err.to_string()).await.map_err(Error::Storage)?;
		},
		Err(err) => {
			let next_attempts = job.attempts + 1;
			if next_attempts as u32 >= cfg.max_attempts {
				warn!(job_id = %job.job_id, error = %err, "Connector job exhausted retries, moving to DLQ.");
				kgraph_storage::connectors::move_to_dlq(db, &job, &err.to_string())
					.await
					.map_err(Error::Storage)?;
			} else {
				let backoff = backoff_for_attempt(next_attempts as u32, cfg.base_backoff_ms, cfg.max_backoff_ms);
				error!(job_id = %job.job_id, error = %err, attempt = next_attempts, "Connector job failed, retrying.");
				kgraph_storage::connectors::mark_job_failed(
					db,
					job.job_id,
					next_attempts,
					OffsetDateTime::now_utc() + backoff,
					&err.to_string(),
				)
				.await
				.map_err(Error::Storage)?;
			}
		},
	}

	Ok(true)
}

async fn handle_job<F: ProviderFetcher, E: ChunkEmbedder>(
	db: &Db,
	job: &ConnectorQueueJobRow,
	fetcher: &F,
	embedder: &E,
	cfg: &WorkerConfig,
) -> Result<()> {
	let metadata = fetcher.fetch_metadata(&job.payload).await?;

	let existing = match metadata.external_node_id {
		Some(node_id) => kgraph_storage::nodes::get_node(db, &job.tenant_id, node_id).await.map_err(Error::Storage)?,
		None => None,
	};

	let incoming_etag = metadata.etag.as_deref();
	let stored_etag = existing.as_ref().and_then(|n| n.etag.as_deref());

	// Step 2 of the ingestion decision: an unchanged ETag skips before the
	// body is ever fetched.
	if let Some(node) = &existing {
		if stored_etag.is_some() && stored_etag == incoming_etag {
			kgraph_storage::events::append_event(
				db,
				&job.tenant_id,
				Some(node.node_id),
				EventKind::IngestSkipped,
				json!({ "provider": job.provider, "reason": "etag_unchanged" }),
			)
			.await
			.map_err(Error::Storage)?;
			return Ok(());
		}
	}

	let body = fetcher.fetch_body(&job.payload).await?;
	let content_hash = kgraph_providers::hashing::content_hash(&body);

	let decision = kgraph_domain::connector::decide_ingest(
		stored_etag,
		existing.as_ref().and_then(|n| n.content_hash.as_deref()),
		incoming_etag,
		content_hash.as_str(),
	);

	match decision {
		IngestDecision::Skip => {
			if let Some(node) = &existing {
				kgraph_storage::events::append_event(
					db,
					&job.tenant_id,
					Some(node.node_id),
					EventKind::IngestSkipped,
					json!({ "provider": job.provider }),
				)
				.await
				.map_err(Error::Storage)?;
			}
			Ok(())
		},
		IngestDecision::MetadataOnly => {
			if let Some(node) = &existing {
				kgraph_storage::nodes::update_node(
					db,
					&job.tenant_id,
					node.node_id,
					kgraph_storage::nodes::NodeUpdate {
						classes: None,
						props: None,
						payload_ref: None,
						content_hash: None,
						etag: Some(incoming_etag.unwrap_or_default().to_string()),
						expected_version: node.version,
					},
				)
				.await
				.map_err(Error::Storage)?;
				kgraph_storage::events::append_event(
					db,
					&job.tenant_id,
					Some(node.node_id),
					EventKind::IngestMetadataOnly,
					json!({ "provider": job.provider }),
				)
				.await
				.map_err(Error::Storage)?;
			}
			Ok(())
		},
		IngestDecision::ReEmbed => {
			ingest_and_embed(db, job, &existing, &body, &content_hash, incoming_etag, embedder, cfg).await
		},
	}
}

async fn ingest_and_embed<E: ChunkEmbedder>(
	db: &Db,
	job: &ConnectorQueueJobRow,
	existing: &Option<kgraph_domain::node::Node>,
	body: &str,
	content_hash: &str,
	incoming_etag: Option<&str>,
	embedder: &E,
	cfg: &WorkerConfig,
) -> Result<()> {
	let parent_id = match existing {
		Some(node) => {
			kgraph_storage::nodes::update_node(
				db,
				&job.tenant_id,
				node.node_id,
				kgraph_storage::nodes::NodeUpdate {
					classes: None,
					props: None,
					payload_ref: None,
					content_hash: Some(content_hash.to_string()),
					etag: incoming_etag.map(str::to_string),
					expected_version: node.version,
				},
			)
			.await
			.map_err(Error::Storage)?;
			node.node_id
		},
		None => {
			let node = kgraph_storage::nodes::create_node(
				db,
				&job.tenant_id,
				kgraph_storage::nodes::NewNode {
					tenant_id: job.tenant_id.clone(),
					classes: vec!["document".to_string()],
					props: std::collections::BTreeMap::from([(
						"source_provider".to_string(),
						PropValue::String(job.provider.clone()),
					)]),
					payload_ref: None,
					refresh_interval_seconds: None,
					refresh_cron: None,
					drift_threshold: None,
					content_hash: Some(content_hash.to_string()),
					etag: incoming_etag.map(str::to_string),
				},
			)
			.await
			.map_err(Error::Storage)?;
			node.node_id
		},
	};

	kgraph_storage::search::reindex_lexical(db, &job.tenant_id, parent_id, body).await.map_err(Error::Storage)?;

	let chunks: Vec<Chunk> = kgraph_chunking::split_text(body, &cfg.chunking);
	info!(node_id = %parent_id, chunk_count = chunks.len(), "Chunked ingested document.");

	for chunk in chunks {
		let chunk_node = kgraph_storage::nodes::create_node(
			db,
			&job.tenant_id,
			kgraph_storage::nodes::NewNode {
				tenant_id: job.tenant_id.clone(),
				classes: vec!["chunk".to_string()],
				props: std::collections::BTreeMap::from([
					("parent_node_id".to_string(), PropValue::String(parent_id.to_string())),
					("chunk_index".to_string(), PropValue::Number(chunk.chunk_index as f64)),
					("text".to_string(), PropValue::String(chunk.text.clone())),
				]),
				payload_ref: None,
				refresh_interval_seconds: None,
				refresh_cron: None,
				drift_threshold: None,
				content_hash: None,
				etag: None,
			},
		)
		.await
		.map_err(Error::Storage)?;

		let vector = embedder.embed(&chunk.text).await?;
		kgraph_storage::nodes::upsert_embedding(db, chunk_node.node_id, 1, &vector, 0.0)
			.await
			.map_err(Error::Storage)?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_up_to_cap() {
		assert_eq!(backoff_for_attempt(1, 500, 30_000), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(2, 500, 30_000), Duration::milliseconds(1000));
		assert_eq!(backoff_for_attempt(10, 500, 30_000), Duration::milliseconds(30_000));
	}
}
