use std::collections::HashMap;
use std::sync::Arc;

use kgraph_config::{Auth as AuthConfig, Config, LlmProviderConfig, Ranking};
use kgraph_connectors::registry::QueueRegistry;
use kgraph_crypto::KeyRing;
use kgraph_service::auth::{ConcurrencyGate, RateLimiter, TenantBinder};
use kgraph_service::embedding::HttpEmbeddingBackend;
use kgraph_service::reranker::HttpReranker;
use kgraph_storage::db::Db;

/// Endpoint names used as the second half of the `(tenant, endpoint)`
/// rate-limit/concurrency keys. Kept as a fixed list rather than discovered
/// from the router so every endpoint gets a bound even if a handler forgets
/// to name itself consistently.
const ENDPOINTS: &[&str] =
	&["search", "explain", "ask", "nodes", "edges", "events", "patterns", "connectors"];

struct Inner {
	db: Db,
	keys: KeyRing,
	embedding_backend: HttpEmbeddingBackend,
	reranker: HttpReranker,
	ranking: Ranking,
	llm_cfg: LlmProviderConfig,
	auth_cfg: AuthConfig,
	tenant_binder: TenantBinder,
	rate_limiter: RateLimiter,
	concurrency_gate: ConcurrencyGate,
	queue_registry: QueueRegistry,
}

#[derive(Clone)]
pub struct AppState {
	inner: Arc<Inner>,
}

impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;
		db.ensure_schema(config.storage.postgres.vector_dim).await?;

		let keys = KeyRing::new(
			config.crypto.active_key_version,
			config.crypto.keys.iter().map(|k| (k.version, k.base64_key.clone())).collect(),
		)?;

		let dev_tenant = (config.auth.mode == "off").then(|| "dev-tenant".to_string());
		let tenant_binder = TenantBinder::new(&config.auth, dev_tenant);

		let rate_limiter = RateLimiter::new(&config.rate_limit);
		let limits: HashMap<String, u32> =
			ENDPOINTS.iter().map(|e| (e.to_string(), config.rate_limit.max_concurrent_per_tenant)).collect();
		let concurrency_gate = ConcurrencyGate::new(limits);

		let kgraph_config::Providers { embedding, rerank, llm } = config.providers;
		let embedding_backend = HttpEmbeddingBackend::new(embedding);
		let reranker = HttpReranker::new(rerank);

		Ok(Self {
			inner: Arc::new(Inner {
				db,
				keys,
				embedding_backend,
				reranker,
				ranking: config.ranking,
				llm_cfg: llm,
				auth_cfg: config.auth,
				tenant_binder,
				rate_limiter,
				concurrency_gate,
				queue_registry: QueueRegistry::new(),
			}),
		})
	}

	pub fn db(&self) -> &Db {
		&self.inner.db
	}

	pub fn keys(&self) -> &KeyRing {
		&self.inner.keys
	}

	pub fn embedding_backend(&self) -> &HttpEmbeddingBackend {
		&self.inner.embedding_backend
	}

	pub fn reranker(&self) -> &HttpReranker {
		&self.inner.reranker
	}

	pub fn ranking(&self) -> &Ranking {
		&self.inner.ranking
	}

	pub fn llm_cfg(&self) -> &LlmProviderConfig {
		&self.inner.llm_cfg
	}

	pub fn auth_cfg(&self) -> &AuthConfig {
		&self.inner.auth_cfg
	}

	pub fn tenant_binder(&self) -> &TenantBinder {
		&self.inner.tenant_binder
	}

	pub fn rate_limiter(&self) -> &RateLimiter {
		&self.inner.rate_limiter
	}

	pub fn concurrency_gate(&self) -> &ConcurrencyGate {
		&self.inner.concurrency_gate
	}

	pub fn queue_registry(&self) -> &QueueRegistry {
		&self.inner.queue_registry
	}
}
