use kgraph_config::ProviderConfig;

use crate::Result;

/// Cross-encoder rerank pass. Callers only ever use this to reorder
/// candidates that already cleared the hybrid score threshold; the score it
/// returns is advisory display order, never a gate (see `retrieval::search`).
pub trait Reranker: Send + Sync {
	fn rerank(&self, query: &str, docs: &[String]) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;
}

pub struct HttpReranker {
	cfg: ProviderConfig,
}

impl HttpReranker {
	pub fn new(cfg: ProviderConfig) -> Self {
		Self { cfg }
	}
}

impl Reranker for HttpReranker {
	async fn rerank(&self, query: &str, docs: &[String]) -> Result<Vec<f32>> {
		Ok(kgraph_providers::rerank::rerank(&self.cfg, query, docs).await?)
	}
}

/// Used where no rerank provider is configured. `retrieval::search` never
/// calls into this unless `SearchOptions::use_reranker` is set, so this type
/// exists only to satisfy the generic bound in that configuration.
pub struct NoopReranker;

impl Reranker for NoopReranker {
	async fn rerank(&self, _query: &str, docs: &[String]) -> Result<Vec<f32>> {
		Ok(vec![0.0; docs.len()])
	}
}
