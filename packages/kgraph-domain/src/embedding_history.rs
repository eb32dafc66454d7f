use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingHistory {
	pub history_id: Uuid,
	pub node_id: Uuid,
	pub tenant_id: Option<String>,
	pub embedding_version: i64,
	pub embedding: Vec<f32>,
	pub created_at: OffsetDateTime,
	/// `1 − cosine(prev_embedding, new_embedding)` against the embedding one
	/// version back, or `None` for a node's first embedding.
	pub drift_from_previous: Option<f32>,
}

/// Cosine distance between two equal-length vectors, in `[0, 2]`. Callers
/// compare this against a node's `RefreshPolicy::drift_threshold` to decide
/// whether drift crosses the configured bound (§3 invariant, §4 Scheduler).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
	if a.len() != b.len() || a.is_empty() {
		return None;
	}
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm_a == 0.0 || norm_b == 0.0 {
		return None;
	}
	let cosine_similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
	Some(1.0 - cosine_similarity)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identical_vectors_have_zero_distance() {
		let v = vec![0.5, 0.5, 0.5];
		assert!(cosine_distance(&v, &v).unwrap().abs() < 1e-6);
	}

	#[test]
	fn orthogonal_vectors_have_unit_distance() {
		let a = vec![1.0, 0.0];
		let b = vec![0.0, 1.0];
		assert!((cosine_distance(&a, &b).unwrap() - 1.0).abs() < 1e-6);
	}

	#[test]
	fn mismatched_lengths_return_none() {
		assert!(cosine_distance(&[1.0, 0.0], &[1.0]).is_none());
	}
}
