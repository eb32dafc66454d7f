pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod rerank;

mod error;

use reqwest::header::{AUTHORIZATION, HeaderMap};

pub use error::{Error, Result};

pub fn auth_headers(api_key: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	Ok(headers)
}
