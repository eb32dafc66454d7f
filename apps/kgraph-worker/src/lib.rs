pub mod embedder;
pub mod fetcher;
pub mod pool;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kgraph_connectors::registry::QueueRegistry;
use kgraph_connectors::worker::WorkerConfig;
use kgraph_service::embedding::HttpEmbeddingBackend;
use kgraph_storage::db::Db;
use tracing_subscriber::EnvFilter;

use crate::embedder::ServiceEmbedder;
use crate::fetcher::HttpProviderFetcher;

/// Outbound connector fetches get a generous budget since providers are
/// often slow; inbound webhook verification uses a much tighter one.
const CONNECTOR_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = kgraph_config::load(&args.config)?;
	init_tracing(&config)?;

	let db = Arc::new(Db::connect(&config.storage.postgres).await?);
	db.ensure_schema(config.storage.postgres.vector_dim).await?;

	let kgraph_config::Providers { embedding, .. } = config.providers;
	let scheduler_backend = Arc::new(HttpEmbeddingBackend::new(embedding.clone()));
	let pool_embedder = Arc::new(ServiceEmbedder::new(HttpEmbeddingBackend::new(embedding)));

	let pool_fetcher = Arc::new(HttpProviderFetcher::new(CONNECTOR_FETCH_TIMEOUT)?);
	let queue_registry = Arc::new(QueueRegistry::new());
	let worker_cfg = Arc::new(WorkerConfig {
		max_attempts: config.connectors.max_attempts,
		base_backoff_ms: config.connectors.base_backoff_ms,
		max_backoff_ms: config.connectors.max_backoff_ms,
		chunking: kgraph_chunking::ChunkingConfig {
			max_chars: config.chunking.max_chars,
			overlap_chars: config.chunking.overlap_chars,
		},
	});
	let worker_concurrency = config.connectors.worker_concurrency;

	tracing::info!(worker_concurrency, "Connector worker pool and scheduler starting.");

	tokio::try_join!(
		scheduler::run_scheduler(db.clone(), scheduler_backend, config.scheduler),
		pool::run_pool(db, queue_registry, pool_fetcher, pool_embedder, worker_cfg, worker_concurrency),
	)?;
	Ok(())
}

fn init_tracing(config: &kgraph_config::Config) -> color_eyre::Result<()> {
	let filter = EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
	Ok(())
}
