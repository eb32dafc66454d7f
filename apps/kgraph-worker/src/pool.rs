use std::sync::Arc;
use std::time::Duration;

use kgraph_connectors::registry::QueueRegistry;
use kgraph_connectors::worker::{ChunkEmbedder, ProviderFetcher, WorkerConfig, process_next};
use kgraph_storage::db::Db;
use tokio::task::JoinSet;
use tracing::error;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs `concurrency` workers, each repeatedly draining the connector queue
/// one job at a time via `process_next`. A worker that finds no claimable
/// job backs off for `IDLE_POLL_INTERVAL` instead of spinning; this is the
/// `N` concurrent workers the connector runtime design calls for, generalized
/// from the single-job-at-a-time logic `kgraph_connectors::worker` already
/// implements.
pub async fn run_pool<F, E>(
	db: Arc<Db>,
	registry: Arc<QueueRegistry>,
	fetcher: Arc<F>,
	embedder: Arc<E>,
	cfg: Arc<WorkerConfig>,
	concurrency: usize,
) -> color_eyre::Result<()>
where
	F: ProviderFetcher + 'static,
	E: ChunkEmbedder + 'static,
{
	let mut tasks = JoinSet::new();
	for worker_id in 0..concurrency {
		let db = db.clone();
		let registry = registry.clone();
		let fetcher = fetcher.clone();
		let embedder = embedder.clone();
		let cfg = cfg.clone();
		tasks.spawn(async move {
			loop {
				match process_next(&db, &registry, fetcher.as_ref(), embedder.as_ref(), &cfg).await {
					Ok(true) => continue,
					Ok(false) => tokio::time::sleep(IDLE_POLL_INTERVAL).await,
					Err(err) => {
						error!(worker_id, error = %err, "Connector worker iteration failed.");
						tokio::time::sleep(IDLE_POLL_INTERVAL).await;
					},
				}
			}
		});
	}

	while let Some(result) = tasks.join_next().await {
		if let Err(err) = result {
			error!(error = %err, "Connector worker task panicked.");
		}
	}
	Ok(())
}
