use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use kgraph_service::auth::{self, Claims};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

/// A soft-deleted node is hard-deleted no sooner than this many seconds
/// after `soft_delete_node`, enforced by the worker's purge loop.
const SOFT_DELETE_GRACE_SECONDS: i64 = 7 * 24 * 3600;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/explain", post(explain))
		.route("/v1/ask", post(ask))
		.route("/v1/ask/stream", get(ask_stream))
		.route("/v1/nodes", post(create_node))
		.route("/v1/nodes/{node_id}", get(get_node).patch(update_node).delete(delete_node))
		.route("/v1/nodes/{node_id}/refresh", post(refresh_node))
		.route("/v1/nodes/{node_id}/events", get(list_events))
		.route("/v1/nodes/{node_id}/edges", get(list_edges).post(create_edge))
		.route("/v1/edges/{edge_id}", delete(delete_edge))
		.route("/v1/patterns", post(upsert_pattern))
		.route("/v1/connectors/{provider}/config", post(upsert_connector_config))
		.route("/v1/webhooks/{tenant_id}/{provider}", post(webhook))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Verifies the bearer token (when auth is enabled), binds a tenant, checks
/// the rate limit, and acquires a concurrency slot — every handler below
/// runs this first so the four checks can't drift out of sync per route.
async fn admit<'s>(
	state: &'s AppState,
	headers: &HeaderMap,
	endpoint: &str,
) -> Result<(String, Option<Claims>, auth::ConcurrencyGuard<'s>), ApiError> {
	let claims = authenticate(state, headers)?;
	let tenant_id = state.tenant_binder().bind(claims.as_ref()).map_err(ApiError::from)?;
	state.rate_limiter().check(&tenant_id, endpoint).map_err(ApiError::from)?;
	let guard = state.concurrency_gate().acquire(&tenant_id, endpoint).map_err(ApiError::from)?;
	Ok((tenant_id, claims, guard))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<Claims>, ApiError> {
	if state.auth_cfg().mode == "off" {
		return Ok(None);
	}
	let header_value = headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.ok_or_else(|| ApiError::from(kgraph_service::Error::Unauthorized { message: "missing Authorization header".to_string() }))?;
	let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
		ApiError::from(kgraph_service::Error::Unauthorized { message: "Authorization header must be a Bearer token".to_string() })
	})?;
	Ok(Some(auth::verify_token(state.auth_cfg(), token)?))
}

fn require_scope(state: &AppState, claims: &Option<Claims>, scope: &str) -> Result<(), ApiError> {
	if state.auth_cfg().mode == "off" {
		return Ok(());
	}
	let claims = claims
		.as_ref()
		.ok_or_else(|| ApiError::from(kgraph_service::Error::Unauthorized { message: "missing verified claims".to_string() }))?;
	auth::require_scope(claims, scope).map_err(ApiError::from)
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "search").await?;
	let opts = req.to_options();
	let top_k = req.top_k.unwrap_or(state.ranking().default_top_k);

	let started = std::time::Instant::now();
	let result = kgraph_service::retrieval::search(
		state.db(),
		&tenant_id,
		state.embedding_backend(),
		state.reranker(),
		state.ranking(),
		&req.query,
		top_k,
		&opts,
	)
	.await?;
	kgraph_observability::retrieval::record_search(
		&tenant_id,
		mode_label(opts.mode),
		started.elapsed().as_secs_f64(),
		result.hits.len(),
	);

	Ok(Json(SearchResponse::from(result)))
}

fn mode_label(mode: kgraph_service::retrieval::SearchMode) -> &'static str {
	use kgraph_service::retrieval::SearchMode::*;
	match mode {
		Vector => "vector",
		Lexical => "lexical",
		HybridRrf => "hybrid_rrf",
		Weighted => "weighted",
	}
}

async fn explain(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(req): Json<SearchRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "explain").await?;
	let opts = req.to_options();
	let result = kgraph_service::retrieval::explain(state.db(), &tenant_id, state.embedding_backend(), state.ranking(), &req.query, &opts)
		.await?;
	Ok(Json(ExplainResponse::from(result)))
}

async fn ask(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(req): Json<AskRequest>,
) -> Result<Json<AskResponseDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "ask").await?;
	let response = kgraph_service::ask::ask(
		state.db(),
		&tenant_id,
		state.embedding_backend(),
		state.reranker(),
		state.ranking(),
		state.llm_cfg(),
		&req.question,
	)
	.await?;
	Ok(Json(AskResponseDto::from(response)))
}

#[derive(Deserialize)]
struct AskStreamQuery {
	question: String,
}

/// Emits the full answer as a single `token` event, then a `final` event
/// carrying citations — `kgraph-providers`' LLM client is single-turn, so
/// there is no intermediate token stream to forward (see
/// `kgraph_providers::llm::complete`).
async fn ask_stream(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<AskStreamQuery>,
) -> Result<Sse<ReceiverStream<Result<Event, Infallible>>>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "ask").await?;

	let response = kgraph_service::ask::ask(
		state.db(),
		&tenant_id,
		state.embedding_backend(),
		state.reranker(),
		state.ranking(),
		state.llm_cfg(),
		&query.question,
	)
	.await?;

	let (tx, rx) = tokio::sync::mpsc::channel(2);
	tokio::spawn(async move {
		let final_dto = AskStreamFinalDto::from(&kgraph_service::ask::AskStreamFinal::from(&response));
		if let Ok(event) = Event::default().event("token").json_data(&serde_json::json!({ "text": response.answer })) {
			let _ = tx.send(Ok(event)).await;
		}
		if let Ok(event) = Event::default().event("final").json_data(&final_dto) {
			let _ = tx.send(Ok(event)).await;
		}
	});

	Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text(":keep-alive\n\n")))
}

async fn create_node(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(req): Json<CreateNodeRequest>,
) -> Result<Json<NodeDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "nodes").await?;
	let node = kgraph_storage::nodes::create_node(state.db(), &tenant_id, req.into_new_node(tenant_id.clone())).await?;
	kgraph_storage::events::append_event(
		state.db(),
		&tenant_id,
		Some(node.node_id),
		kgraph_domain::event::EventKind::Created,
		serde_json::json!({ "classes": node.classes }),
	)
	.await?;
	Ok(Json(NodeDto::from(&node)))
}

async fn get_node(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
) -> Result<Json<NodeDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "nodes").await?;
	let node = kgraph_storage::nodes::get_node(state.db(), &tenant_id, node_id)
		.await?
		.ok_or_else(|| ApiError::not_found(format!("node {node_id} not found")))?;
	Ok(Json(NodeDto::from(&node)))
}

async fn update_node(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
	Json(req): Json<UpdateNodeRequest>,
) -> Result<Json<NodeDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "nodes").await?;
	let node = kgraph_storage::nodes::update_node(state.db(), &tenant_id, node_id, req.into_update()).await?;
	kgraph_storage::events::append_event(
		state.db(),
		&tenant_id,
		Some(node.node_id),
		kgraph_domain::event::EventKind::Updated,
		serde_json::json!({ "version": node.version }),
	)
	.await?;
	Ok(Json(NodeDto::from(&node)))
}

#[derive(Deserialize)]
struct DeleteQuery {
	#[serde(default)]
	hard: bool,
}

async fn delete_node(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
	Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "nodes").await?;
	if query.hard {
		kgraph_storage::nodes::hard_delete_node(state.db(), &tenant_id, node_id).await?;
	} else {
		let purge_after = OffsetDateTime::now_utc() + time::Duration::seconds(SOFT_DELETE_GRACE_SECONDS);
		kgraph_storage::nodes::soft_delete_node(state.db(), &tenant_id, node_id, purge_after).await?;
	}
	kgraph_storage::events::append_event(
		state.db(),
		&tenant_id,
		Some(node_id),
		kgraph_domain::event::EventKind::Deleted,
		serde_json::json!({ "hard": query.hard }),
	)
	.await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Forces an out-of-cycle re-embed + drift compute, the same work the
/// refresh scheduler performs, without waiting for the node's policy to
/// come due.
async fn refresh_node(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
) -> Result<Json<NodeDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "nodes").await?;
	let node = kgraph_storage::nodes::get_node(state.db(), &tenant_id, node_id)
		.await?
		.ok_or_else(|| ApiError::not_found(format!("node {node_id} not found")))?;
	kgraph_service::refresh::refresh_node(state.db(), &tenant_id, state.embedding_backend(), &node).await?;
	let refreshed = kgraph_storage::nodes::get_node(state.db(), &tenant_id, node_id)
		.await?
		.ok_or_else(|| ApiError::not_found(format!("node {node_id} not found")))?;
	Ok(Json(NodeDto::from(&refreshed)))
}

#[derive(Deserialize)]
struct EventsQuery {
	#[serde(default = "default_event_limit")]
	limit: i64,
}

fn default_event_limit() -> i64 {
	50
}

async fn list_events(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
	Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventDto>>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "events").await?;
	let events = kgraph_storage::events::list_events(state.db(), &tenant_id, node_id, query.limit).await?;
	Ok(Json(events.iter().map(EventDto::from).collect()))
}

async fn create_edge(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
	Json(req): Json<CreateEdgeRequest>,
) -> Result<Json<EdgeDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "edges").await?;
	let props = req.props.map(|v| match kgraph_domain::value::PropValue::from(v) {
		kgraph_domain::value::PropValue::Object(map) => map,
		_ => Default::default(),
	});
	let edge = kgraph_storage::edges::create_edge(
		state.db(),
		&tenant_id,
		node_id,
		req.dst_node_id,
		&req.relation,
		props.unwrap_or_default(),
	)
	.await?;
	Ok(Json(EdgeDto::from(&edge)))
}

async fn list_edges(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(node_id): Path<Uuid>,
) -> Result<Json<Vec<EdgeDto>>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "edges").await?;
	let edges = kgraph_storage::edges::list_edges(state.db(), &tenant_id, node_id).await?;
	Ok(Json(edges.iter().map(EdgeDto::from).collect()))
}

async fn delete_edge(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(edge_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "edges").await?;
	kgraph_storage::edges::delete_edge(state.db(), &tenant_id, edge_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn upsert_pattern(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(req): Json<UpsertPatternRequest>,
) -> Result<Json<PatternDto>, ApiError> {
	let (tenant_id, _claims, _guard) = admit(&state, &headers, "patterns").await?;
	let vector = match state.embedding_backend().embed(&[req.example_text.clone()]).await?.into_iter().next() {
		Some(kgraph_service::embedding::EmbedOutcome::Vector(v)) => v,
		_ => return Err(ApiError::invalid("failed to embed pattern example_text")),
	};
	let pattern = kgraph_domain::pattern::Pattern {
		pattern_id: Uuid::nil(),
		tenant_id: Some(tenant_id.clone()),
		name: req.name,
		node_class: req.node_class,
		reference_embedding: vector,
		threshold: req.threshold,
		webhook_url: req.webhook_url,
		enabled: req.enabled,
		created_at: OffsetDateTime::now_utc(),
	};
	let stored = kgraph_storage::patterns::upsert_pattern(state.db(), &tenant_id, &pattern).await?;
	Ok(Json(PatternDto::from(&stored)))
}

async fn upsert_connector_config(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(provider): Path<String>,
	Json(req): Json<ConnectorConfigRequest>,
) -> Result<Json<ConnectorConfigResponse>, ApiError> {
	let (tenant_id, claims, _guard) = admit(&state, &headers, "connectors").await?;
	require_scope(&state, &claims, "connectors:admin")?;

	let store = kgraph_connectors::config::ConfigStore::new(state.db(), state.keys());
	let config =
		store.upsert(&tenant_id, &provider, req.secret.as_bytes(), req.webhook_scheme.as_deref(), &req.topic_allowlist).await?;
	Ok(Json(ConnectorConfigResponse::from(&config)))
}

/// Inbound connector webhook. Unauthenticated by JWT (the caller is the
/// provider, not a tenant's client) — authenticity instead comes from the
/// HMAC/signed-token check against the connector's stored secret.
async fn webhook(
	State(state): State<AppState>,
	Path((tenant_id, provider)): Path<(String, String)>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<StatusCode, ApiError> {
	let signature = headers.get("x-signature").and_then(|v| v.to_str().ok()).unwrap_or_default();
	let topic = headers.get("x-topic").and_then(|v| v.to_str().ok()).unwrap_or_default();

	let store = kgraph_connectors::config::ConfigStore::new(state.db(), state.keys());
	let Some((config, secret)) = store.get(&tenant_id, &provider).await? else {
		return Err(ApiError::not_found("connector not configured"));
	};
	let scheme = config
		.webhook_scheme
		.as_deref()
		.and_then(kgraph_connectors::webhook::WebhookScheme::parse)
		.ok_or_else(|| ApiError::invalid("connector has no webhook scheme configured"))?;
	kgraph_connectors::webhook::verify(scheme, &secret, &body, signature, topic, &config.topic_allowlist)?;

	let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
	kgraph_storage::connectors::enqueue_job(state.db(), &tenant_id, &provider, config.connector_id, payload).await?;
	state.queue_registry().mark_active(&tenant_id, &provider);
	kgraph_observability::connectors::record_ingest(&provider, "enqueued");

	Ok(StatusCode::ACCEPTED)
}
