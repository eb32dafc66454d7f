use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_chars: usize,
	pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
	fn default() -> Self {
		Self { max_chars: 1000, overlap_chars: 200 }
	}
}

#[derive(Clone, Debug)]
pub struct Chunk {
	pub chunk_index: i32,
	pub start_offset: usize,
	pub end_offset: usize,
	pub text: String,
}

/// Deterministic sentence-aware chunker: accumulates whole sentences up to
/// `max_chars`, then starts the next chunk from the trailing `overlap_chars`
/// of the one just closed. A single sentence longer than `max_chars` is
/// emitted whole rather than split mid-sentence, so chunks can exceed the
/// budget but never cut a sentence in half.
pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let sentences: Vec<(usize, &str)> = text.split_sentence_bound_indices().collect();
	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut current_start = 0_usize;
	let mut last_end = 0_usize;
	let mut chunk_index = 0_i32;

	for (idx, sentence) in sentences {
		let candidate_len = current.len() + sentence.len();

		if candidate_len > cfg.max_chars && !current.is_empty() {
			chunks.push(Chunk {
				chunk_index,
				start_offset: current_start,
				end_offset: last_end,
				text: current.clone(),
			});
			chunk_index += 1;

			let overlap = overlap_tail(&current, cfg.overlap_chars);
			current_start = last_end.saturating_sub(overlap.len());
			current = overlap;
		}
		if current.is_empty() {
			current_start = idx;
		}

		current.push_str(sentence);
		last_end = idx + sentence.len();
	}

	if !current.is_empty() {
		chunks.push(Chunk { chunk_index, start_offset: current_start, end_offset: last_end, text: current });
	}

	chunks
}

/// Trailing `overlap_chars` of `text`, snapped to the nearest preceding
/// UTF-8 char boundary so it never panics on multi-byte input.
fn overlap_tail(text: &str, overlap_chars: usize) -> String {
	if overlap_chars == 0 || text.is_empty() {
		return String::new();
	}
	let target = text.len().saturating_sub(overlap_chars);
	let mut boundary = target;
	while boundary < text.len() && !text.is_char_boundary(boundary) {
		boundary += 1;
	}
	text[boundary..].to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_short_text_is_one_chunk() {
		let cfg = ChunkingConfig::default();
		let chunks = split_text("One sentence only.", &cfg);
		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].text, "One sentence only.");
	}

	#[test]
	fn splits_into_chunks_with_overlap() {
		let cfg = ChunkingConfig { max_chars: 20, overlap_chars: 5 };
		let text = "One sentence. Two sentence. Three sentence. Four sentence.";
		let chunks = split_text(text, &cfg);

		assert!(chunks.len() > 1);
		assert!(chunks[0].text.contains("One sentence"));
		assert_eq!(chunks[0].chunk_index, 0);
		assert_eq!(chunks[1].chunk_index, 1);
	}

	#[test]
	fn offsets_are_monotonic_and_end_at_source_length() {
		let cfg = ChunkingConfig { max_chars: 15, overlap_chars: 3 };
		let text = "Alpha beta. Gamma delta. Epsilon zeta.";
		let chunks = split_text(text, &cfg);
		for pair in chunks.windows(2) {
			assert!(pair[1].chunk_index > pair[0].chunk_index);
		}
		assert_eq!(chunks.last().unwrap().end_offset, text.len());
	}

	#[test]
	fn never_splits_a_sentence_even_if_longer_than_budget() {
		let cfg = ChunkingConfig { max_chars: 5, overlap_chars: 1 };
		let long_sentence = "This single sentence is much longer than the budget.";
		let chunks = split_text(long_sentence, &cfg);
		assert!(chunks.iter().any(|c| c.text.trim() == long_sentence));
	}

	#[test]
	fn overlap_tail_snaps_to_char_boundary() {
		let text = "héllo wörld";
		let tail = overlap_tail(text, 3);
		assert!(String::from_utf8(tail.clone().into_bytes()).is_ok());
		assert!(!tail.is_empty());
	}
}
