mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Auth, Chunking, Config, Connectors, Crypto, EmbeddingProviderConfig, JwtConfig, KekEntry,
	LlmProviderConfig, Observability, Postgres, ProviderConfig, Providers, RateLimit, Ranking,
	RerankSettings, Scheduler, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	validate_service(cfg)?;
	validate_providers(cfg)?;
	validate_auth(cfg)?;
	validate_rate_limit(cfg)?;
	validate_chunking(cfg)?;
	validate_ranking(cfg)?;
	validate_scheduler(cfg)?;
	validate_connectors(cfg)?;
	validate_crypto(cfg)?;

	Ok(())
}

fn validate_service(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation { message: "service.http_bind must be non-empty.".to_string() });
	}

	Ok(())
}

fn validate_providers(cfg: &Config) -> Result<()> {
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.postgres.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.postgres.vector_dim."
				.to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("llm", &cfg.providers.llm.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_auth(cfg: &Config) -> Result<()> {
	match cfg.auth.mode.as_str() {
		"off" => Ok(()),
		"jwt" => {
			let Some(jwt) = cfg.auth.jwt.as_ref() else {
				return Err(Error::Validation {
					message: "auth.jwt must be set when auth.mode is jwt.".to_string(),
				});
			};
			if !matches!(jwt.algorithm.as_str(), "HS256" | "RS256" | "ES256") {
				return Err(Error::Validation {
					message: "auth.jwt.algorithm must be one of HS256, RS256, or ES256.".to_string(),
				});
			}
			if jwt.algorithm == "HS256" && jwt.hmac_secret.as_deref().unwrap_or_default().is_empty() {
				return Err(Error::Validation {
					message: "auth.jwt.hmac_secret is required for HS256.".to_string(),
				});
			}
			if matches!(jwt.algorithm.as_str(), "RS256" | "ES256")
				&& jwt.public_key.as_deref().unwrap_or_default().is_empty()
			{
				return Err(Error::Validation {
					message: "auth.jwt.public_key is required for RS256 and ES256.".to_string(),
				});
			}
			if jwt.issuer.trim().is_empty() {
				return Err(Error::Validation {
					message: "auth.jwt.issuer must be non-empty.".to_string(),
				});
			}
			if jwt.audience.trim().is_empty() {
				return Err(Error::Validation {
					message: "auth.jwt.audience must be non-empty.".to_string(),
				});
			}

			Ok(())
		},
		other => Err(Error::Validation {
			message: format!("auth.mode must be one of off or jwt. Got {other}."),
		}),
	}
}

fn validate_rate_limit(cfg: &Config) -> Result<()> {
	if cfg.rate_limit.requests_per_minute == 0 {
		return Err(Error::Validation {
			message: "rate_limit.requests_per_minute must be greater than zero.".to_string(),
		});
	}
	if cfg.rate_limit.max_concurrent_per_tenant == 0 {
		return Err(Error::Validation {
			message: "rate_limit.max_concurrent_per_tenant must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_chunking(cfg: &Config) -> Result<()> {
	if cfg.chunking.max_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap_chars >= cfg.chunking.max_chars {
		return Err(Error::Validation {
			message: "chunking.overlap_chars must be less than chunking.max_chars.".to_string(),
		});
	}

	Ok(())
}

fn validate_ranking(cfg: &Config) -> Result<()> {
	if cfg.ranking.rrf_k <= 0.0 {
		return Err(Error::Validation { message: "ranking.rrf_k must be greater than zero.".to_string() });
	}
	for (path, value) in [
		("ranking.vector_weight", cfg.ranking.vector_weight),
		("ranking.lexical_weight", cfg.ranking.lexical_weight),
		("ranking.freshness_weight", cfg.ranking.freshness_weight),
		("ranking.drift_weight", cfg.ranking.drift_weight),
	] {
		if !value.is_finite() || value < 0.0 {
			return Err(Error::Validation { message: format!("{path} must be zero or greater.") });
		}
	}
	if cfg.ranking.default_top_k == 0 {
		return Err(Error::Validation {
			message: "ranking.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.candidate_k < cfg.ranking.default_top_k {
		return Err(Error::Validation {
			message: "ranking.candidate_k must be greater than or equal to ranking.default_top_k."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_scheduler(cfg: &Config) -> Result<()> {
	for (path, value) in [
		("scheduler.refresh_interval_seconds", cfg.scheduler.refresh_interval_seconds),
		("scheduler.trigger_interval_seconds", cfg.scheduler.trigger_interval_seconds),
		("scheduler.purge_interval_seconds", cfg.scheduler.purge_interval_seconds),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{path} must be greater than zero.") });
		}
	}

	Ok(())
}

fn validate_connectors(cfg: &Config) -> Result<()> {
	if cfg.connectors.queue_capacity == 0 {
		return Err(Error::Validation {
			message: "connectors.queue_capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.connectors.worker_concurrency == 0 {
		return Err(Error::Validation {
			message: "connectors.worker_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.connectors.max_backoff_ms < cfg.connectors.base_backoff_ms {
		return Err(Error::Validation {
			message: "connectors.max_backoff_ms must be greater than or equal to connectors.base_backoff_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_crypto(cfg: &Config) -> Result<()> {
	if cfg.crypto.keys.is_empty() {
		return Err(Error::Validation { message: "crypto.keys must be non-empty.".to_string() });
	}
	if !cfg.crypto.keys.iter().any(|k| k.version == cfg.crypto.active_key_version) {
		return Err(Error::Validation {
			message: "crypto.active_key_version must reference an entry in crypto.keys.".to_string(),
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const VALID_TOML: &str = r#"
		[service]
		http_bind = "127.0.0.1:8080"
		log_level = "info"

		[storage.postgres]
		dsn = "postgres://localhost/kgraph"
		pool_max_conns = 10
		vector_dim = 8

		[providers.embedding]
		provider_id = "test"
		api_base = "http://127.0.0.1"
		api_key = "key"
		path = "/embed"
		model = "test-embed"
		dimensions = 8
		timeout_ms = 1000

		[providers.rerank]
		provider_id = "test"
		api_base = "http://127.0.0.1"
		api_key = "key"
		path = "/rerank"
		model = "test-rerank"
		timeout_ms = 1000

		[providers.llm]
		provider_id = "test"
		api_base = "http://127.0.0.1"
		api_key = "key"
		path = "/chat"
		model = "test-llm"
		temperature = 0.0
		timeout_ms = 1000

		[auth]
		mode = "off"

		[rate_limit]
		requests_per_minute = 600
		burst = 100
		max_concurrent_per_tenant = 16

		[chunking]
		max_chars = 1000
		overlap_chars = 100

		[ranking]
		rrf_k = 60.0
		vector_weight = 1.0
		lexical_weight = 1.0
		freshness_weight = 0.1
		freshness_half_life_days = 30.0
		drift_weight = 0.1
		default_top_k = 10
		candidate_k = 50

		[ranking.rerank]
		enabled = false
		top_n = 10

		[scheduler]
		refresh_interval_seconds = 300
		trigger_interval_seconds = 300
		purge_interval_seconds = 3600
		purge_batch_size = 100

		[connectors]
		queue_capacity = 1000
		worker_concurrency = 4
		max_attempts = 5
		base_backoff_ms = 1000
		max_backoff_ms = 60000

		[crypto]
		active_key_version = 1

		[[crypto.keys]]
		version = 1
		base64_key = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE="

		[observability]
		metrics_bind = "127.0.0.1:9090"
	"#;

	fn parse(toml_str: &str) -> Config {
		toml::from_str(toml_str).expect("Failed to parse test config TOML.")
	}

	#[test]
	fn a_well_formed_config_validates() {
		validate(&parse(VALID_TOML)).expect("Well-formed config should validate.");
	}

	#[test]
	fn embedding_dimensions_must_match_vector_dim() {
		let mut cfg = parse(VALID_TOML);
		cfg.storage.postgres.vector_dim = 16;
		let err = validate(&cfg).unwrap_err();
		assert!(matches!(err, Error::Validation { .. }));
	}

	#[test]
	fn jwt_auth_mode_requires_a_jwt_block() {
		let mut cfg = parse(VALID_TOML);
		cfg.auth.mode = "jwt".to_string();
		cfg.auth.jwt = None;
		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn unknown_auth_mode_is_rejected() {
		let mut cfg = parse(VALID_TOML);
		cfg.auth.mode = "basic".to_string();
		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn crypto_active_version_must_reference_a_known_key() {
		let mut cfg = parse(VALID_TOML);
		cfg.crypto.active_key_version = 9;
		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn candidate_k_below_default_top_k_is_rejected() {
		let mut cfg = parse(VALID_TOML);
		cfg.ranking.candidate_k = 1;
		cfg.ranking.default_top_k = 10;
		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn chunking_overlap_must_be_smaller_than_max_chars() {
		let mut cfg = parse(VALID_TOML);
		cfg.chunking.overlap_chars = cfg.chunking.max_chars;
		assert!(validate(&cfg).is_err());
	}
}
