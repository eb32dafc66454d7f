use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use kgraph_config::EmbeddingProviderConfig;

use crate::Result;

/// Per-item embedding outcome: a failed item never aborts the batch, so the
/// scheduler can mark individual nodes `failed` while the rest proceed.
pub enum EmbedOutcome {
	Vector(Vec<f32>),
	Error(String),
}

/// Generic rather than `dyn`-dispatched: callers are fixed at process
/// startup (one backend per deployment), so static dispatch avoids boxing
/// every embed call.
pub trait EmbeddingBackend: Send + Sync {
	fn embed(&self, texts: &[String]) -> impl std::future::Future<Output = Result<Vec<EmbedOutcome>>> + Send;

	fn dimensions(&self) -> u32;
}

pub struct HttpEmbeddingBackend {
	cfg: EmbeddingProviderConfig,
}

impl HttpEmbeddingBackend {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}

impl EmbeddingBackend for HttpEmbeddingBackend {
	async fn embed(&self, texts: &[String]) -> Result<Vec<EmbedOutcome>> {
		match kgraph_providers::embedding::embed(&self.cfg, texts).await {
			Ok(vectors) => Ok(vectors.into_iter().map(EmbedOutcome::Vector).collect()),
			Err(err) => Ok(texts.iter().map(|_| EmbedOutcome::Error(err.to_string())).collect()),
		}
	}

	fn dimensions(&self) -> u32 {
		self.cfg.dimensions
	}
}

/// Deterministic, hash-based backend with no network dependency. Vector
/// values are implementation-defined (spec leaves the exact function
/// unspecified); it only needs to be stable and fixed-dimension for a given
/// input so retrieval-ranking tests don't depend on a live provider.
pub struct DeterministicEmbeddingBackend {
	dimensions: u32,
}

impl DeterministicEmbeddingBackend {
	pub fn new(dimensions: u32) -> Self {
		Self { dimensions }
	}
}

impl EmbeddingBackend for DeterministicEmbeddingBackend {
	async fn embed(&self, texts: &[String]) -> Result<Vec<EmbedOutcome>> {
		Ok(texts.iter().map(|text| EmbedOutcome::Vector(hash_embed(text, self.dimensions))).collect())
	}

	fn dimensions(&self) -> u32 {
		self.dimensions
	}
}

fn hash_embed(text: &str, dimensions: u32) -> Vec<f32> {
	let mut vec = Vec::with_capacity(dimensions as usize);
	for i in 0..dimensions {
		let mut hasher = DefaultHasher::new();
		text.hash(&mut hasher);
		i.hash(&mut hasher);
		let bits = hasher.finish();
		vec.push(((bits % 2000) as f32 / 1000.0) - 1.0);
	}
	vec
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn deterministic_backend_is_stable_across_calls() {
		let backend = DeterministicEmbeddingBackend::new(8);
		let texts = vec!["same input".to_string()];
		let first = backend.embed(&texts).await.unwrap();
		let second = backend.embed(&texts).await.unwrap();
		let (EmbedOutcome::Vector(a), EmbedOutcome::Vector(b)) = (&first[0], &second[0]) else {
			panic!("expected vectors");
		};
		assert_eq!(a, b);
		assert_eq!(a.len(), 8);
	}
}
