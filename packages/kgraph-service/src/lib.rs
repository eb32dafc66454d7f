pub mod ask;
pub mod auth;
pub mod embedding;
pub mod refresh;
pub mod reranker;
pub mod retrieval;
pub mod trigger;

mod error;

pub use error::{Error, Result};

/// Pulls the display text out of a node's `body`/`text` prop, in that order.
/// Shared by the retrieval reranker pass, the ask orchestrator's prompt
/// composition, and the scheduler's initial-embed cycle so all three read the
/// same fields the same way.
pub fn node_text(node: &kgraph_domain::node::Node) -> String {
	node.props
		.get("body")
		.or_else(|| node.props.get("text"))
		.and_then(|value| value.as_str())
		.map(str::to_string)
		.unwrap_or_default()
}
