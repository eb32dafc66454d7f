use std::time::Duration;

use kgraph_config::LlmProviderConfig;
use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

pub struct ChatMessage {
	pub role: &'static str,
	pub content: String,
}

/// Single-turn completion used by the Ask Orchestrator to compose an answer
/// from retrieved context. Streaming is handled by the caller re-issuing
/// this request against a streaming-capable endpoint; this function always
/// returns the full text.
pub async fn complete(cfg: &LlmProviderConfig, messages: &[ChatMessage]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages.iter().map(|m| serde_json::json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
	});
	let res = client.post(url).headers(crate::auth_headers(&cfg.api_key)?).json(&body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_chat_response(json)
}

fn parse_chat_response(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(|content| content.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat completion response is missing choices[0].message.content.".to_string(),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_first_choice_content() {
		let json = serde_json::json!({
			"choices": [{ "message": { "role": "assistant", "content": "the answer" } }]
		});
		assert_eq!(parse_chat_response(json).unwrap(), "the answer");
	}

	#[test]
	fn missing_choices_is_an_error() {
		let json = serde_json::json!({});
		assert!(parse_chat_response(json).is_err());
	}
}
