use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStatus {
	Active,
	Paused,
	Failed,
}

/// Stored connector configuration. `encrypted_secret` holds a KEK-versioned
/// envelope produced by `kgraph-crypto`; this crate never sees plaintext.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectorConfig {
	pub connector_id: Uuid,
	pub tenant_id: String,
	pub provider: String,
	pub encrypted_secret: Vec<u8>,
	pub key_version: u32,
	pub webhook_scheme: Option<String>,
	pub topic_allowlist: Vec<String>,
	pub status: ConnectorStatus,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// Per-(tenant, provider) ingestion cursor, used for idempotent resume.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectorCursor {
	pub connector_id: Uuid,
	pub tenant_id: String,
	pub cursor: Option<String>,
	pub updated_at: OffsetDateTime,
}

/// Outcome of comparing an inbound item's `{etag, content_hash}` against the
/// stored cursor/node (§4 C6 ingestion decision).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IngestDecision {
	Skip,
	MetadataOnly,
	ReEmbed,
}

pub fn decide_ingest(
	stored_etag: Option<&str>,
	stored_content_hash: Option<&str>,
	incoming_etag: Option<&str>,
	incoming_content_hash: &str,
) -> IngestDecision {
	if stored_etag.is_some() && stored_etag == incoming_etag {
		return IngestDecision::Skip;
	}
	if stored_content_hash == Some(incoming_content_hash) {
		IngestDecision::MetadataOnly
	} else {
		IngestDecision::ReEmbed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn matching_etag_skips() {
		let decision = decide_ingest(Some("a"), Some("h1"), Some("a"), "h1");
		assert_eq!(decision, IngestDecision::Skip);
	}

	#[test]
	fn unchanged_hash_with_new_etag_is_metadata_only() {
		let decision = decide_ingest(Some("a"), Some("h1"), Some("b"), "h1");
		assert_eq!(decision, IngestDecision::MetadataOnly);
	}

	#[test]
	fn changed_hash_re_embeds() {
		let decision = decide_ingest(Some("a"), Some("h1"), Some("b"), "h2");
		assert_eq!(decision, IngestDecision::ReEmbed);
	}
}
