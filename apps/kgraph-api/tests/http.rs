#[path = "../src/dto.rs"]
mod dto;
#[path = "../src/error.rs"]
mod error;
#[path = "../src/routes.rs"]
mod routes;
#[path = "../src/state.rs"]
mod state;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use kgraph_config::*;
use tower::ServiceExt;

use state::AppState;

/// Base64-encoded 32-byte AES-256-GCM key, one all-`1`s byte pattern. Not a
/// real secret — this config is only ever pointed at a throwaway test
/// database.
fn test_key(_version: u32) -> String {
	"AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=".to_string()
}

fn test_config(dsn: &str) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage { postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 1, vector_dim: 8 } },
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "unused".to_string(),
				path: "/embed".to_string(),
				model: "test-embed".to_string(),
				dimensions: 8,
				timeout_ms: 1_000,
			},
			rerank: ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "unused".to_string(),
				path: "/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 1_000,
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "unused".to_string(),
				path: "/chat".to_string(),
				model: "test-llm".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
			},
		},
		auth: Auth { mode: "off".to_string(), jwt: None },
		rate_limit: RateLimit { requests_per_minute: 600, burst: 100, max_concurrent_per_tenant: 16 },
		chunking: Chunking { max_chars: 1_000, overlap_chars: 100 },
		ranking: Ranking {
			rrf_k: 60.0,
			vector_weight: 1.0,
			lexical_weight: 1.0,
			freshness_weight: 0.1,
			freshness_half_life_days: 30.0,
			drift_weight: 0.1,
			default_top_k: 10,
			candidate_k: 50,
			rerank: RerankSettings { enabled: false, top_n: 10 },
		},
		scheduler: Scheduler {
			refresh_interval_seconds: 3_600,
			trigger_interval_seconds: 3_600,
			purge_interval_seconds: 3_600,
			purge_batch_size: 100,
		},
		connectors: Connectors {
			queue_capacity: 100,
			worker_concurrency: 1,
			max_attempts: 5,
			base_backoff_ms: 1_000,
			max_backoff_ms: 60_000,
		},
		crypto: Crypto { active_key_version: 1, keys: vec![KekEntry { version: 1, base64_key: test_key(1) }] },
		observability: Observability { metrics_bind: "127.0.0.1:0".to_string() },
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KGRAPH_TEST_PG_DSN to run."]
async fn health_ok() {
	let Some(base_dsn) = kgraph_testkit::env_dsn() else {
		eprintln!("Skipping health_ok; set KGRAPH_TEST_PG_DSN to run this test.");
		return;
	};
	let test_db = kgraph_testkit::TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let config = test_config(test_db.dsn());
	let state = AppState::new(config).await.expect("Failed to build app state.");
	let app = routes::router(state);

	let response = app
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."))
		.await
		.expect("Failed to call /health.");
	assert_eq!(response.status(), StatusCode::OK);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KGRAPH_TEST_PG_DSN to run."]
async fn search_without_a_bearer_token_is_admitted_under_the_dev_tenant() {
	let Some(base_dsn) = kgraph_testkit::env_dsn() else {
		eprintln!("Skipping search_without_a_bearer_token_is_admitted_under_the_dev_tenant; set KGRAPH_TEST_PG_DSN to run.");
		return;
	};
	let test_db = kgraph_testkit::TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let config = test_config(test_db.dsn());
	let state = AppState::new(config).await.expect("Failed to build app state.");
	let app = routes::router(state);

	let body = serde_json::json!({"query": "hello", "mode": "lexical"}).to_string();
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/search")
				.header("content-type", "application/json")
				.body(Body::from(body))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/search.");
	assert_ne!(response.status(), StatusCode::UNAUTHORIZED);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
