use std::cmp::Ordering;
use std::collections::HashMap;

use kgraph_config::Ranking;
use kgraph_domain::node::{Node, ScoreType, VectorMetric};
use kgraph_storage::db::Db;
use kgraph_storage::search::{self, LexicalHit, VectorHit};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::embedding::EmbeddingBackend;
use crate::reranker::Reranker;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchMode {
	Vector,
	Lexical,
	HybridRrf,
	Weighted,
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
	pub mode: SearchMode,
	pub metric: VectorMetric,
	pub use_reranker: bool,
	pub structured_intent: bool,
	pub min_score: f32,
	pub class_filter: Option<String>,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			mode: SearchMode::HybridRrf,
			metric: VectorMetric::Cosine,
			use_reranker: false,
			structured_intent: false,
			min_score: 0.0,
			class_filter: None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct SearchHit {
	pub node: Node,
	pub score: f32,
	pub score_type: ScoreType,
	pub rerank_prob: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct SearchFlags {
	pub fallback_to_vector: bool,
	pub reranked: bool,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
	pub hits: Vec<SearchHit>,
	pub flags: SearchFlags,
}

const RERANK_SKIP_TOPSIM: f32 = 0.80;
const RERANK_MIN_CANDIDATES: usize = 3;

/// Executes one of the five retrieval modes from the candidate-merge shape
/// down through scoring. Vector search degrades to lexical-only when no
/// lexical hit is found at all, and hybrid degrades to vector-only when the
/// lexical index yields nothing (`flags.fallback_to_vector`).
pub async fn search<B: EmbeddingBackend, R: Reranker>(
	db: &Db,
	tenant_id: &str,
	backend: &B,
	reranker: &R,
	ranking: &Ranking,
	query_text: &str,
	top_k: u32,
	opts: &SearchOptions,
) -> Result<SearchResult> {
	let candidate_k = ranking.candidate_k.max(top_k);

	let query_vector = match backend.embed(&[query_text.to_string()]).await?.into_iter().next() {
		Some(crate::embedding::EmbedOutcome::Vector(v)) => v,
		_ => return Err(Error::Provider { message: "failed to embed query".to_string() }),
	};

	let vector_hits = search::vector_search(
		db,
		tenant_id,
		&query_vector,
		opts.metric,
		opts.class_filter.as_deref(),
		candidate_k,
	)
	.await?;
	let lexical_hits =
		search::lexical_search(db, tenant_id, query_text, opts.class_filter.as_deref(), candidate_k).await?;

	let mut flags = SearchFlags::default();
	if !vector_hits.is_empty() && lexical_hits.is_empty() {
		flags.fallback_to_vector = true;
	}

	let scored = match opts.mode {
		SearchMode::Vector => score_vector(&vector_hits, opts.metric),
		SearchMode::Lexical => score_lexical(&lexical_hits),
		SearchMode::HybridRrf => score_rrf(&vector_hits, &lexical_hits, opts.metric, ranking.rrf_k),
		SearchMode::Weighted => {
			let nodes = load_nodes(db, tenant_id, vector_hits.iter().map(|h| h.node_id)).await?;
			score_weighted(db, &vector_hits, opts.metric, ranking, &nodes).await?
		},
	};

	let mut ranked = scored;
	ranked.sort_by(|a, b| cmp_score_desc(a.1, b.1).then_with(|| a.0.cmp(&b.0)));
	ranked.truncate(candidate_k as usize);

	let should_rerank = opts.use_reranker
		&& !opts.structured_intent
		&& ranked.len() >= RERANK_MIN_CANDIDATES
		&& ranked.first().map(|(_, score, _)| *score < RERANK_SKIP_TOPSIM).unwrap_or(false);

	let node_ids: Vec<Uuid> = ranked.iter().map(|(id, ..)| *id).collect();
	let nodes = load_nodes(db, tenant_id, node_ids.into_iter()).await?;

	let mut hits = Vec::new();
	for (node_id, score, score_type) in ranked {
		let Some(node) = nodes.get(&node_id) else { continue };
		if score < opts.min_score {
			continue;
		}
		hits.push(SearchHit { node: node.clone(), score, score_type, rerank_prob: None });
	}

	if should_rerank && !hits.is_empty() {
		let docs: Vec<String> = hits.iter().map(|hit| crate::node_text(&hit.node)).collect();
		let probs = reranker.rerank(query_text, &docs).await?;
		for (hit, prob) in hits.iter_mut().zip(probs.into_iter()) {
			hit.rerank_prob = Some(prob);
		}
		// Reranking is a display-order refinement only: the hybrid score
		// computed above already gated `min_score` and is never replaced.
		hits.sort_by(|a, b| {
			cmp_score_desc(a.rerank_prob.unwrap_or(0.0), b.rerank_prob.unwrap_or(0.0))
				.then_with(|| a.node.node_id.cmp(&b.node.node_id))
		});
		flags.reranked = true;
	}

	hits.truncate(top_k as usize);
	Ok(SearchResult { hits, flags })
}

/// Mirrors `search` but only reports what *would* run: indexes present,
/// operator, and the current top similarity, without fetching documents.
pub struct ExplainResult {
	pub operator: &'static str,
	pub candidate_k: u32,
	pub top_similarity: Option<f32>,
	pub fallback_to_vector: bool,
}

pub async fn explain<B: EmbeddingBackend>(
	db: &Db,
	tenant_id: &str,
	backend: &B,
	ranking: &Ranking,
	query_text: &str,
	opts: &SearchOptions,
) -> Result<ExplainResult> {
	let candidate_k = ranking.candidate_k;
	let query_vector = match backend.embed(&[query_text.to_string()]).await?.into_iter().next() {
		Some(crate::embedding::EmbedOutcome::Vector(v)) => v,
		_ => return Err(Error::Provider { message: "failed to embed query".to_string() }),
	};
	let vector_hits = search::vector_search(
		db,
		tenant_id,
		&query_vector,
		opts.metric,
		opts.class_filter.as_deref(),
		candidate_k,
	)
	.await?;
	let lexical_hits =
		search::lexical_search(db, tenant_id, query_text, opts.class_filter.as_deref(), candidate_k).await?;

	let top_similarity = vector_hits.first().map(|hit| normalize_vector_score(hit.raw_score, opts.metric));

	Ok(ExplainResult {
		operator: metric_operator_label(opts.metric),
		candidate_k,
		top_similarity,
		fallback_to_vector: !vector_hits.is_empty() && lexical_hits.is_empty(),
	})
}

fn metric_operator_label(metric: VectorMetric) -> &'static str {
	match metric {
		VectorMetric::Cosine => "<=>",
		VectorMetric::L2 => "<->",
		VectorMetric::InnerProduct => "<#>",
	}
}

/// pgvector's `<=>` returns cosine *distance*; `score_v = 1 - distance`
/// normalizes that into `[0,1]`. L2/inner-product orderings are preserved
/// but not guaranteed on `[0,1]`, per the retrieval-engine contract.
fn normalize_vector_score(raw_distance: f32, metric: VectorMetric) -> f32 {
	match metric {
		VectorMetric::Cosine => (1.0 - raw_distance).clamp(0.0, 1.0),
		VectorMetric::L2 | VectorMetric::InnerProduct => -raw_distance,
	}
}

fn score_type_for_metric(metric: VectorMetric) -> ScoreType {
	match metric {
		VectorMetric::Cosine => ScoreType::VectorCosine,
		VectorMetric::L2 => ScoreType::VectorL2,
		VectorMetric::InnerProduct => ScoreType::VectorIp,
	}
}

fn score_vector(hits: &[VectorHit], metric: VectorMetric) -> Vec<(Uuid, f32, ScoreType)> {
	let score_type = score_type_for_metric(metric);
	hits.iter().map(|hit| (hit.node_id, normalize_vector_score(hit.raw_score, metric), score_type)).collect()
}

/// Lexical rank is normalized by dividing by the maximum rank observed in
/// this batch, per the store-native weighted text rank contract.
fn score_lexical(hits: &[LexicalHit]) -> Vec<(Uuid, f32, ScoreType)> {
	let max_rank = hits.iter().map(|hit| hit.rank).fold(0.0_f32, f32::max);
	hits.iter()
		.map(|hit| {
			let normalized = if max_rank > 0.0 { hit.rank / max_rank } else { 0.0 };
			(hit.node_id, normalized, ScoreType::Lexical)
		})
		.collect()
}

/// Reciprocal rank fusion: `score_rrf = sum(1 / (k + rank_i))` over every
/// ranked list the candidate appears in. Ties break by vector score, then
/// node id (done by the caller's final sort).
fn score_rrf(
	vector_hits: &[VectorHit],
	lexical_hits: &[LexicalHit],
	metric: VectorMetric,
	k: f32,
) -> Vec<(Uuid, f32, ScoreType)> {
	let mut rrf_scores: HashMap<Uuid, f32> = HashMap::new();
	let mut vector_scores: HashMap<Uuid, f32> = HashMap::new();

	for (rank, hit) in vector_hits.iter().enumerate() {
		let contribution = 1.0 / (k + (rank + 1) as f32);
		*rrf_scores.entry(hit.node_id).or_insert(0.0) += contribution;
		vector_scores.insert(hit.node_id, normalize_vector_score(hit.raw_score, metric));
	}
	for (rank, hit) in lexical_hits.iter().enumerate() {
		let contribution = 1.0 / (k + (rank + 1) as f32);
		*rrf_scores.entry(hit.node_id).or_insert(0.0) += contribution;
	}

	let mut out: Vec<(Uuid, f32, ScoreType)> =
		rrf_scores.into_iter().map(|(node_id, score)| (node_id, score, ScoreType::RrfFused)).collect();
	out.sort_by(|a, b| {
		cmp_score_desc(a.1, b.1).then_with(|| {
			let av = vector_scores.get(&a.0).copied().unwrap_or(0.0);
			let bv = vector_scores.get(&b.0).copied().unwrap_or(0.0);
			cmp_score_desc(av, bv).then_with(|| a.0.cmp(&b.0))
		})
	});
	out
}

/// `score_w = sim * exp(-0.01 * age_days) * (1 - 0.1 * drift)`. `drift` is
/// each node's latest measured `1 − cosine(prev,new)` reading from
/// `embedding_history`, not `RefreshPolicy::drift_threshold` (a policy knob
/// for when a `drift_high` event fires, unrelated to the node's actual
/// measured drift).
async fn score_weighted(
	db: &Db,
	vector_hits: &[VectorHit],
	metric: VectorMetric,
	_ranking: &Ranking,
	nodes: &HashMap<Uuid, Node>,
) -> Result<Vec<(Uuid, f32, ScoreType)>> {
	let now = OffsetDateTime::now_utc();
	let mut out = Vec::with_capacity(vector_hits.len());
	for hit in vector_hits {
		let Some(node) = nodes.get(&hit.node_id) else { continue };
		let sim = normalize_vector_score(hit.raw_score, metric);
		let age_days = node
			.last_refreshed
			.map(|last| (now - last).whole_seconds() as f32 / 86_400.0)
			.unwrap_or(0.0)
			.max(0.0);
		let drift = kgraph_storage::nodes::latest_drift(db, node.node_id).await?.clamp(0.0, 1.0);
		let score = sim * (-0.01 * age_days).exp() * (1.0 - 0.1 * drift);
		out.push((hit.node_id, score, ScoreType::WeightedFusion));
	}
	Ok(out)
}

async fn load_nodes(
	db: &Db,
	tenant_id: &str,
	ids: impl Iterator<Item = Uuid>,
) -> Result<HashMap<Uuid, Node>> {
	let mut out = HashMap::new();
	for id in ids {
		if out.contains_key(&id) {
			continue;
		}
		if let Some(node) = kgraph_storage::nodes::get_node(db, tenant_id, id).await? {
			out.insert(id, node);
		}
	}
	Ok(out)
}

fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rrf_favors_candidates_ranked_highly_in_both_lists() {
		let a = Uuid::new_v4();
		let b = Uuid::new_v4();
		let vector_hits =
			vec![VectorHit { node_id: a, raw_score: 0.1 }, VectorHit { node_id: b, raw_score: 0.9 }];
		let lexical_hits = vec![LexicalHit { node_id: a, rank: 1.0 }];

		let scored = score_rrf(&vector_hits, &lexical_hits, VectorMetric::Cosine, 60.0);
		let a_score = scored.iter().find(|(id, ..)| *id == a).unwrap().1;
		let b_score = scored.iter().find(|(id, ..)| *id == b).unwrap().1;
		assert!(a_score > b_score, "candidate present in both lists should outrank vector-only candidate");
	}

	#[test]
	fn lexical_scores_normalize_to_unit_interval() {
		let node = Uuid::new_v4();
		let hits = vec![LexicalHit { node_id: node, rank: 4.0 }, LexicalHit { node_id: Uuid::new_v4(), rank: 2.0 }];
		let scored = score_lexical(&hits);
		assert!(scored.iter().all(|(_, score, _)| (0.0..=1.0).contains(score)));
		let top = scored.iter().find(|(id, ..)| *id == node).unwrap();
		assert_eq!(top.1, 1.0);
	}

	#[test]
	fn cosine_score_clamped_to_unit_interval() {
		assert_eq!(normalize_vector_score(-1.0, VectorMetric::Cosine), 1.0);
		assert_eq!(normalize_vector_score(3.0, VectorMetric::Cosine), 0.0);
	}
}
