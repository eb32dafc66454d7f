//! Thin wrapper around the `metrics` facade so callers name counters and
//! histograms through a narrow, typed surface instead of scattering string
//! literals (and label cardinality) across every crate.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to install Prometheus recorder: {0}")]
	Install(#[from] metrics_exporter_prometheus::BuildError),
}

pub fn install(bind: SocketAddr) -> Result<PrometheusHandle, Error> {
	let handle = PrometheusBuilder::new().with_http_listener(bind).install_recorder()?;
	Ok(handle)
}

/// Bounded label set: tenant_id and operation name only. Never attach
/// free-form text (query strings, error messages) as a label value.
pub mod labels {
	pub const TENANT: &str = "tenant_id";
	pub const OPERATION: &str = "operation";
	pub const PROVIDER: &str = "provider";
	pub const OUTCOME: &str = "outcome";
}

pub mod retrieval {
	use metrics::{counter, histogram};

	pub fn record_search(tenant_id: &str, mode: &str, duration_seconds: f64, hit_count: usize) {
		counter!("kgraph_search_requests_total", super::labels::TENANT => tenant_id.to_string(), "mode" => mode.to_string())
			.increment(1);
		histogram!("kgraph_search_duration_seconds", super::labels::TENANT => tenant_id.to_string())
			.record(duration_seconds);
		histogram!("kgraph_search_hit_count", super::labels::TENANT => tenant_id.to_string())
			.record(hit_count as f64);
	}
}

pub mod scheduler {
	use metrics::{counter, gauge};

	pub fn record_refresh_tick(due_count: usize, refreshed: usize, failed: usize) {
		gauge!("kgraph_scheduler_refresh_due").set(due_count as f64);
		counter!("kgraph_scheduler_refresh_total", super::labels::OUTCOME => "success").increment(refreshed as u64);
		counter!("kgraph_scheduler_refresh_total", super::labels::OUTCOME => "failed").increment(failed as u64);
	}

	pub fn record_trigger_tick(evaluated: usize, fired: usize) {
		counter!("kgraph_scheduler_trigger_evaluated_total").increment(evaluated as u64);
		counter!("kgraph_scheduler_trigger_fired_total").increment(fired as u64);
	}

	pub fn record_purge_tick(purged: usize) {
		counter!("kgraph_scheduler_purge_total").increment(purged as u64);
	}
}

pub mod connectors {
	use metrics::{counter, gauge};

	pub fn record_ingest(provider: &str, outcome: &str) {
		counter!(
			"kgraph_connector_ingest_total",
			super::labels::PROVIDER => provider.to_string(),
			super::labels::OUTCOME => outcome.to_string()
		)
		.increment(1);
	}

	pub fn record_queue_depth(provider: &str, depth: usize) {
		gauge!("kgraph_connector_queue_depth", super::labels::PROVIDER => provider.to_string())
			.set(depth as f64);
	}
}

pub mod auth {
	use metrics::counter;

	pub fn record_rate_limited(tenant_id: &str) {
		counter!("kgraph_rate_limited_total", super::labels::TENANT => tenant_id.to_string())
			.increment(1);
	}

	pub fn record_scope_denied(tenant_id: &str) {
		counter!("kgraph_scope_denied_total", super::labels::TENANT => tenant_id.to_string())
			.increment(1);
	}
}
