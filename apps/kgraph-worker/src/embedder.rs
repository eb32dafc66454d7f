use kgraph_connectors::worker::ChunkEmbedder;
use kgraph_connectors::{Error, Result};
use kgraph_service::embedding::{EmbedOutcome, EmbeddingBackend};

/// Adapts the retrieval engine's batch-oriented embedding backend to the
/// connector worker's narrower one-chunk-at-a-time interface.
pub struct ServiceEmbedder<B> {
	backend: B,
}

impl<B: EmbeddingBackend> ServiceEmbedder<B> {
	pub fn new(backend: B) -> Self {
		Self { backend }
	}
}

impl<B: EmbeddingBackend> ChunkEmbedder for ServiceEmbedder<B> {
	async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		let outcome = self
			.backend
			.embed(&[text.to_string()])
			.await
			.map_err(|err| Error::Transient { message: err.to_string() })?
			.into_iter()
			.next();

		match outcome {
			Some(EmbedOutcome::Vector(vector)) => Ok(vector),
			Some(EmbedOutcome::Error(message)) => Err(Error::Transient { message }),
			None => Err(Error::Transient { message: "embedding backend returned no vector".to_string() }),
		}
	}
}

#[cfg(test)]
mod tests {
	use kgraph_service::embedding::DeterministicEmbeddingBackend;

	use super::*;

	#[tokio::test]
	async fn embed_returns_a_fixed_dimension_vector() {
		let embedder = ServiceEmbedder::new(DeterministicEmbeddingBackend::new(8));
		let vector = embedder.embed("hello world").await.expect("embed should succeed");
		assert_eq!(vector.len(), 8);
	}

	#[tokio::test]
	async fn embed_is_stable_for_the_same_chunk_text() {
		let embedder = ServiceEmbedder::new(DeterministicEmbeddingBackend::new(8));
		let first = embedder.embed("same chunk").await.unwrap();
		let second = embedder.embed("same chunk").await.unwrap();
		assert_eq!(first, second);
	}
}
