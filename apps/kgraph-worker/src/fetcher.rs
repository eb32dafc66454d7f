use std::time::Duration;

use kgraph_connectors::worker::{FetchedMetadata, ProviderFetcher};
use kgraph_connectors::{Error, Result};
use reqwest::Client;
use uuid::Uuid;

/// Generic HTTP-polling connector fetcher. Every queue job payload is
/// expected to carry a `fetch_url` field (and, for items that already map to
/// an existing node, a `node_id` field) — the shape a provider integration
/// normalizes its webhook/poll payloads into before enqueueing. A provider
/// that needs bespoke auth or pagination implements `ProviderFetcher`
/// directly instead of going through this one.
pub struct HttpProviderFetcher {
	client: Client,
}

impl HttpProviderFetcher {
	pub fn new(timeout: Duration) -> Result<Self> {
		let client = Client::builder().timeout(timeout).build()?;
		Ok(Self { client })
	}

	fn fetch_url(payload: &serde_json::Value) -> Result<&str> {
		payload
			.get("fetch_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| Error::Permanent { message: "connector job payload missing fetch_url".to_string() })
	}
}

impl ProviderFetcher for HttpProviderFetcher {
	async fn fetch_metadata(&self, payload: &serde_json::Value) -> Result<FetchedMetadata> {
		let url = Self::fetch_url(payload)?;
		let response = self.client.head(url).send().await?;
		let etag = response.headers().get(reqwest::header::ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);
		let external_node_id = payload.get("node_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok());
		Ok(FetchedMetadata { etag, external_node_id })
	}

	async fn fetch_body(&self, payload: &serde_json::Value) -> Result<String> {
		let url = Self::fetch_url(payload)?;
		let response = self.client.get(url).send().await?.error_for_status()?;
		Ok(response.text().await?)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn fetch_url_reads_the_payload_field() {
		let payload = json!({"fetch_url": "https://example.com/doc"});
		assert_eq!(HttpProviderFetcher::fetch_url(&payload).unwrap(), "https://example.com/doc");
	}

	#[test]
	fn fetch_url_rejects_a_payload_missing_the_field() {
		let payload = json!({"node_id": "not-a-url-field"});
		assert!(HttpProviderFetcher::fetch_url(&payload).is_err());
	}

	#[tokio::test]
	#[ignore = "Requires network access to example.invalid."]
	async fn fetch_metadata_rejects_a_malformed_node_id() {
		let fetcher = HttpProviderFetcher::new(Duration::from_secs(5)).unwrap();
		let payload = json!({"fetch_url": "https://example.invalid/doc", "node_id": "not-a-uuid"});
		// The HTTP call itself fails against an unresolvable host; what this
		// test actually pins down is that a malformed node_id is dropped
		// rather than surfaced as a parse error.
		let err = fetcher.fetch_metadata(&payload).await.unwrap_err();
		assert!(matches!(err, Error::Fetch(_)));
	}
}
