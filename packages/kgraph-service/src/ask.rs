use kgraph_config::{LlmProviderConfig, Ranking};
use kgraph_providers::llm::ChatMessage;
use kgraph_storage::db::Db;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::embedding::EmbeddingBackend;
use crate::reranker::Reranker;
use crate::retrieval::{self, SearchMode, SearchOptions};
use crate::Result;

const ASK_SIM_THRESHOLD: f32 = 0.55;
const ASK_MAX_SNIPPETS: usize = 6;
const ASK_SNIPPET_LEN: usize = 800;
const ASK_ROUTER_TOPSIM: f32 = 0.80;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteDecision {
	Fast,
	Fallback,
}

#[derive(Clone, Debug)]
pub struct Citation {
	pub node_id: Uuid,
	pub similarity: f32,
	pub classes: Vec<String>,
	pub drift: f32,
	pub age_days: f32,
}

#[derive(Clone, Debug)]
pub struct AskResponse {
	pub answer: String,
	pub citations: Vec<Citation>,
	pub confidence: f32,
	pub route: RouteDecision,
	pub bailout: bool,
}

/// Embed -> hybrid search -> threshold filter -> prompt composition ->
/// citation assembly -> confidence, in that order. Returns a calibrated
/// low-confidence bailout (no LLM call) when nothing survives the
/// threshold filter.
pub async fn ask<B: EmbeddingBackend, R: Reranker>(
	db: &Db,
	tenant_id: &str,
	backend: &B,
	reranker: &R,
	ranking: &Ranking,
	llm_cfg: &LlmProviderConfig,
	question: &str,
) -> Result<AskResponse> {
	let opts = SearchOptions {
		mode: SearchMode::HybridRrf,
		use_reranker: ranking.rerank.enabled,
		min_score: 0.0,
		..Default::default()
	};
	let result =
		retrieval::search(db, tenant_id, backend, reranker, ranking, question, ranking.rerank.top_n, &opts).await?;

	let top_hybrid_score = result.hits.first().map(|hit| hit.score).unwrap_or(0.0);
	let route = if top_hybrid_score >= ASK_ROUTER_TOPSIM { RouteDecision::Fast } else { RouteDecision::Fallback };

	let survivors: Vec<_> = result.hits.into_iter().filter(|hit| hit.score >= ASK_SIM_THRESHOLD).collect();

	if survivors.is_empty() {
		return Ok(AskResponse {
			answer: "I don't have enough information to answer that confidently.".to_string(),
			citations: Vec::new(),
			confidence: 0.0,
			route,
			bailout: true,
		});
	}

	let now = OffsetDateTime::now_utc();
	let snippets: Vec<_> = survivors.iter().take(ASK_MAX_SNIPPETS).collect();

	let mut prompt = String::from(
		"Answer the question using only the numbered snippets below. Every factual claim must \
		 carry a citation like [1] referencing the snippet it came from.\n\n",
	);
	for (index, hit) in snippets.iter().enumerate() {
		let text = crate::node_text(&hit.node);
		let truncated: String = text.chars().take(ASK_SNIPPET_LEN).collect();
		prompt.push_str(&format!("[{}] {}\n\n", index + 1, truncated));
	}
	prompt.push_str(&format!("Question: {question}\n"));

	let messages = vec![ChatMessage { role: "user", content: prompt }];
	let answer = kgraph_providers::llm::complete(llm_cfg, &messages).await?;

	let mut citations = Vec::with_capacity(snippets.len());
	for hit in &snippets {
		let drift = kgraph_storage::nodes::latest_drift(db, hit.node.node_id).await?;
		citations.push(Citation {
			node_id: hit.node.node_id,
			similarity: hit.score,
			classes: hit.node.classes.clone(),
			drift,
			age_days: hit
				.node
				.last_refreshed
				.map(|last| (now - last).whole_seconds() as f32 / 86_400.0)
				.unwrap_or(0.0),
		});
	}

	Ok(AskResponse { answer, citations, confidence: top_hybrid_score, route, bailout: false })
}

/// Streaming-variant event shape: the orchestrator emits `token` events as
/// the LLM yields them, then a final `final` event carrying the full
/// citation block. The actual token stream is produced by whatever
/// transport layer owns the channel (e.g. `apps/kgraph-api`'s SSE route);
/// this type only describes the terminal payload both transports share.
#[derive(Clone, Debug)]
pub struct AskStreamFinal {
	pub citations: Vec<Citation>,
	pub confidence: f32,
	pub route: RouteDecision,
}

impl From<&AskResponse> for AskStreamFinal {
	fn from(response: &AskResponse) -> Self {
		Self { citations: response.citations.clone(), confidence: response.confidence, route: response.route }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn route_decision_follows_topsim_threshold() {
		let high = if 0.9_f32 >= ASK_ROUTER_TOPSIM { RouteDecision::Fast } else { RouteDecision::Fallback };
		let low = if 0.1_f32 >= ASK_ROUTER_TOPSIM { RouteDecision::Fast } else { RouteDecision::Fallback };
		assert_eq!(high, RouteDecision::Fast);
		assert_eq!(low, RouteDecision::Fallback);
	}
}
