use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub auth: Auth,
	pub rate_limit: RateLimit,
	pub chunking: Chunking,
	pub ranking: Ranking,
	pub scheduler: Scheduler,
	pub connectors: Connectors,
	pub crypto: Crypto,
	pub observability: Observability,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
	pub mode: String,
	pub jwt: Option<JwtConfig>,
}

#[derive(Debug, Deserialize)]
pub struct JwtConfig {
	pub algorithm: String,
	pub hmac_secret: Option<String>,
	/// PEM-encoded public key (RSA for `RS256`, EC for `ES256`), required
	/// when `algorithm` is asymmetric.
	pub public_key: Option<String>,
	pub issuer: String,
	pub audience: String,
	#[serde(default = "default_clock_skew_seconds")]
	pub clock_skew_seconds: u64,
}

fn default_clock_skew_seconds() -> u64 {
	60
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
	pub requests_per_minute: u32,
	pub burst: u32,
	pub max_concurrent_per_tenant: u32,
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	pub max_chars: usize,
	pub overlap_chars: usize,
}

#[derive(Debug, Deserialize)]
pub struct Ranking {
	pub rrf_k: f32,
	pub vector_weight: f32,
	pub lexical_weight: f32,
	pub freshness_weight: f32,
	pub freshness_half_life_days: f32,
	pub drift_weight: f32,
	pub default_top_k: u32,
	pub candidate_k: u32,
	pub rerank: RerankSettings,
}

#[derive(Debug, Deserialize)]
pub struct RerankSettings {
	pub enabled: bool,
	pub top_n: u32,
}

#[derive(Debug, Deserialize)]
pub struct Scheduler {
	pub refresh_interval_seconds: u64,
	pub trigger_interval_seconds: u64,
	pub purge_interval_seconds: u64,
	pub purge_batch_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct Connectors {
	pub queue_capacity: usize,
	pub worker_concurrency: usize,
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Crypto {
	pub active_key_version: u32,
	pub keys: Vec<KekEntry>,
}

#[derive(Debug, Deserialize)]
pub struct KekEntry {
	pub version: u32,
	/// Base64-encoded 32-byte AES-256-GCM key.
	pub base64_key: String,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
	pub metrics_bind: String,
}
