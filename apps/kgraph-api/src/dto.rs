use kgraph_domain::connector::{ConnectorConfig, ConnectorStatus};
use kgraph_domain::edge::Edge;
use kgraph_domain::event::Event;
use kgraph_domain::node::{Node, ScoreType, VectorMetric};
use kgraph_domain::pattern::Pattern;
use kgraph_domain::value::PropValue;
use kgraph_service::ask::{AskResponse, AskStreamFinal, Citation, RouteDecision};
use kgraph_service::retrieval::{ExplainResult, SearchHit, SearchMode, SearchOptions, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

fn props_to_json(props: &std::collections::BTreeMap<String, PropValue>) -> JsonValue {
	PropValue::Object(props.clone()).into()
}

fn json_to_props(value: JsonValue) -> std::collections::BTreeMap<String, PropValue> {
	match PropValue::from(value) {
		PropValue::Object(map) => map,
		_ => Default::default(),
	}
}

fn parse_mode(mode: Option<&str>) -> SearchMode {
	match mode {
		Some("vector") => SearchMode::Vector,
		Some("lexical") => SearchMode::Lexical,
		Some("weighted") => SearchMode::Weighted,
		_ => SearchMode::HybridRrf,
	}
}

fn parse_metric(metric: Option<&str>) -> VectorMetric {
	match metric {
		Some("l2") => VectorMetric::L2,
		Some("inner_product") => VectorMetric::InnerProduct,
		_ => VectorMetric::Cosine,
	}
}

fn score_type_label(score_type: ScoreType) -> &'static str {
	match score_type {
		ScoreType::VectorCosine => "vector_cosine",
		ScoreType::VectorL2 => "vector_l2",
		ScoreType::VectorIp => "vector_ip",
		ScoreType::Lexical => "lexical",
		ScoreType::RrfFused => "rrf_fused",
		ScoreType::WeightedFusion => "weighted_fusion",
	}
}

#[derive(Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub mode: Option<String>,
	pub metric: Option<String>,
	pub top_k: Option<u32>,
	pub min_score: Option<f32>,
	pub class_filter: Option<String>,
	pub use_reranker: Option<bool>,
	pub structured_intent: Option<bool>,
}

impl SearchRequest {
	pub fn to_options(&self) -> SearchOptions {
		SearchOptions {
			mode: parse_mode(self.mode.as_deref()),
			metric: parse_metric(self.metric.as_deref()),
			use_reranker: self.use_reranker.unwrap_or(false),
			structured_intent: self.structured_intent.unwrap_or(false),
			min_score: self.min_score.unwrap_or(0.0),
			class_filter: self.class_filter.clone(),
		}
	}
}

#[derive(Serialize)]
pub struct SearchHitDto {
	pub node_id:     Uuid,
	pub classes:     Vec<String>,
	pub props:       JsonValue,
	pub score:       f32,
	pub score_type:  &'static str,
	pub rerank_prob: Option<f32>,
}

impl From<&SearchHit> for SearchHitDto {
	fn from(hit: &SearchHit) -> Self {
		Self {
			node_id:     hit.node.node_id,
			classes:     hit.node.classes.clone(),
			props:       props_to_json(&hit.node.props),
			score:       hit.score,
			score_type:  score_type_label(hit.score_type),
			rerank_prob: hit.rerank_prob,
		}
	}
}

#[derive(Serialize)]
pub struct SearchResponse {
	pub hits:                Vec<SearchHitDto>,
	pub fallback_to_vector:  bool,
	pub reranked:            bool,
}

impl From<SearchResult> for SearchResponse {
	fn from(result: SearchResult) -> Self {
		Self {
			hits:               result.hits.iter().map(SearchHitDto::from).collect(),
			fallback_to_vector: result.flags.fallback_to_vector,
			reranked:           result.flags.reranked,
		}
	}
}

#[derive(Serialize)]
pub struct ExplainResponse {
	pub operator:            &'static str,
	pub candidate_k:         u32,
	pub top_similarity:      Option<f32>,
	pub fallback_to_vector:  bool,
}

impl From<ExplainResult> for ExplainResponse {
	fn from(result: ExplainResult) -> Self {
		Self {
			operator:           result.operator,
			candidate_k:        result.candidate_k,
			top_similarity:     result.top_similarity,
			fallback_to_vector: result.fallback_to_vector,
		}
	}
}

#[derive(Deserialize)]
pub struct AskRequest {
	pub question: String,
}

#[derive(Serialize)]
pub struct CitationDto {
	pub node_id:    Uuid,
	pub similarity: f32,
	pub classes:    Vec<String>,
	pub drift:      f32,
	pub age_days:   f32,
}

impl From<&Citation> for CitationDto {
	fn from(c: &Citation) -> Self {
		Self { node_id: c.node_id, similarity: c.similarity, classes: c.classes.clone(), drift: c.drift, age_days: c.age_days }
	}
}

#[derive(Serialize)]
pub struct AskResponseDto {
	pub answer:     String,
	pub citations:  Vec<CitationDto>,
	pub confidence: f32,
	pub route:      &'static str,
	pub bailout:    bool,
}

impl From<AskResponse> for AskResponseDto {
	fn from(response: AskResponse) -> Self {
		Self {
			answer:     response.answer,
			citations:  response.citations.iter().map(CitationDto::from).collect(),
			confidence: response.confidence,
			route:      match response.route {
				RouteDecision::Fast => "fast",
				RouteDecision::Fallback => "fallback",
			},
			bailout:    response.bailout,
		}
	}
}

#[derive(Serialize)]
pub struct AskStreamFinalDto {
	pub citations:  Vec<CitationDto>,
	pub confidence: f32,
	pub route:      &'static str,
}

impl From<&AskStreamFinal> for AskStreamFinalDto {
	fn from(final_event: &AskStreamFinal) -> Self {
		Self {
			citations:  final_event.citations.iter().map(CitationDto::from).collect(),
			confidence: final_event.confidence,
			route:      match final_event.route {
				RouteDecision::Fast => "fast",
				RouteDecision::Fallback => "fallback",
			},
		}
	}
}

#[derive(Serialize)]
pub struct NodeDto {
	pub node_id:          Uuid,
	pub classes:          Vec<String>,
	pub props:            JsonValue,
	pub payload_ref:      Option<String>,
	pub version:          i64,
	pub etag:             Option<String>,
	pub content_hash:     Option<String>,
	pub embedding_status: &'static str,
}

impl From<&Node> for NodeDto {
	fn from(node: &Node) -> Self {
		Self {
			node_id:          node.node_id,
			classes:          node.classes.clone(),
			props:            props_to_json(&node.props),
			payload_ref:      node.payload_ref.clone(),
			version:          node.version,
			etag:             node.etag.clone(),
			content_hash:     node.content_hash.clone(),
			embedding_status: match node.embedding_lifecycle.status {
				kgraph_domain::node::EmbeddingStatus::Queued => "queued",
				kgraph_domain::node::EmbeddingStatus::Processing => "processing",
				kgraph_domain::node::EmbeddingStatus::Ready => "ready",
				kgraph_domain::node::EmbeddingStatus::Failed => "failed",
			},
		}
	}
}

#[derive(Deserialize)]
pub struct CreateNodeRequest {
	pub classes:                    Vec<String>,
	pub props:                      JsonValue,
	pub payload_ref:                Option<String>,
	pub refresh_interval_seconds:   Option<i64>,
	pub refresh_cron:               Option<String>,
	pub drift_threshold:            Option<f32>,
	pub content_hash:               Option<String>,
	pub etag:                       Option<String>,
}

impl CreateNodeRequest {
	pub fn into_new_node(self, tenant_id: String) -> kgraph_storage::nodes::NewNode {
		kgraph_storage::nodes::NewNode {
			tenant_id,
			classes: self.classes,
			props: json_to_props(self.props),
			payload_ref: self.payload_ref,
			refresh_interval_seconds: self.refresh_interval_seconds,
			refresh_cron: self.refresh_cron,
			drift_threshold: self.drift_threshold,
			content_hash: self.content_hash,
			etag: self.etag,
		}
	}
}

#[derive(Deserialize)]
pub struct UpdateNodeRequest {
	pub classes:          Option<Vec<String>>,
	pub props:             Option<JsonValue>,
	pub payload_ref:       Option<String>,
	pub content_hash:      Option<String>,
	pub etag:              Option<String>,
	pub expected_version:  i64,
}

impl UpdateNodeRequest {
	pub fn into_update(self) -> kgraph_storage::nodes::NodeUpdate {
		kgraph_storage::nodes::NodeUpdate {
			classes: self.classes,
			props: self.props.map(json_to_props),
			payload_ref: self.payload_ref,
			content_hash: self.content_hash,
			etag: self.etag,
			expected_version: self.expected_version,
		}
	}
}

#[derive(Serialize)]
pub struct EdgeDto {
	pub edge_id:      Uuid,
	pub src_node_id:  Uuid,
	pub dst_node_id:  Uuid,
	pub relation:     String,
	pub props:        JsonValue,
}

impl From<&Edge> for EdgeDto {
	fn from(edge: &Edge) -> Self {
		Self {
			edge_id:     edge.edge_id,
			src_node_id: edge.src_node_id,
			dst_node_id: edge.dst_node_id,
			relation:    edge.relation.clone(),
			props:       props_to_json(&edge.props),
		}
	}
}

#[derive(Deserialize)]
pub struct CreateEdgeRequest {
	pub dst_node_id: Uuid,
	pub relation:    String,
	pub props:       Option<JsonValue>,
}

#[derive(Serialize)]
pub struct EventDto {
	pub event_id:    Uuid,
	pub node_id:     Option<Uuid>,
	pub kind:        String,
	pub detail:      JsonValue,
	pub occurred_at: String,
}

impl From<&Event> for EventDto {
	fn from(event: &Event) -> Self {
		Self {
			event_id:    event.event_id,
			node_id:     event.node_id,
			kind:        format!("{:?}", event.kind),
			detail:      event.detail.clone(),
			occurred_at: event.occurred_at.to_string(),
		}
	}
}

#[derive(Serialize)]
pub struct PatternDto {
	pub pattern_id:  Uuid,
	pub name:        String,
	pub node_class:  String,
	pub threshold:   f32,
	pub webhook_url: Option<String>,
	pub enabled:     bool,
}

impl From<&Pattern> for PatternDto {
	fn from(pattern: &Pattern) -> Self {
		Self {
			pattern_id:  pattern.pattern_id,
			name:        pattern.name.clone(),
			node_class:  pattern.node_class.clone(),
			threshold:   pattern.threshold,
			webhook_url: pattern.webhook_url.clone(),
			enabled:     pattern.enabled,
		}
	}
}

#[derive(Deserialize)]
pub struct UpsertPatternRequest {
	pub name:        String,
	pub node_class:  String,
	pub example_text: String,
	pub threshold:   f32,
	pub webhook_url: Option<String>,
	pub enabled:     bool,
}

#[derive(Deserialize)]
pub struct ConnectorConfigRequest {
	pub secret:           String,
	pub webhook_scheme:   Option<String>,
	pub topic_allowlist:  Vec<String>,
}

#[derive(Serialize)]
pub struct ConnectorConfigResponse {
	pub connector_id:     Uuid,
	pub provider:         String,
	pub key_version:      u32,
	pub webhook_scheme:   Option<String>,
	pub topic_allowlist:  Vec<String>,
	pub status:           &'static str,
}

impl From<&ConnectorConfig> for ConnectorConfigResponse {
	fn from(config: &ConnectorConfig) -> Self {
		Self {
			connector_id:    config.connector_id,
			provider:        config.provider.clone(),
			key_version:     config.key_version,
			webhook_scheme:  config.webhook_scheme.clone(),
			topic_allowlist: config.topic_allowlist.clone(),
			status:          match config.status {
				ConnectorStatus::Active => "active",
				ConnectorStatus::Paused => "paused",
				ConnectorStatus::Failed => "failed",
			},
		}
	}
}
