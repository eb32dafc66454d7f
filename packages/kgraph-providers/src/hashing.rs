/// Content hash used for ingestion idempotency decisions (§4 C6). Callers
/// hash the normalized document body, never raw provider bytes, so
/// whitespace-only re-fetches don't trigger a re-embed.
pub fn content_hash(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_text_hashes_identically() {
		assert_eq!(content_hash("hello world"), content_hash("hello world"));
	}

	#[test]
	fn different_text_hashes_differently() {
		assert_ne!(content_hash("hello"), content_hash("world"));
	}
}
