pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Storage error: {0}")]
	Storage(#[from] kgraph_storage::Error),
	#[error("Crypto error: {0}")]
	Crypto(#[from] kgraph_crypto::Error),
	#[error("Fetch error: {0}")]
	Fetch(#[from] reqwest::Error),
	#[error("Webhook rejected: {message}")]
	WebhookRejected { message: String },
	#[error("Permanent failure: {message}")]
	Permanent { message: String },
	#[error("Transient failure: {message}")]
	Transient { message: String },
}

impl Error {
	/// Classifies a failure per the connector contract: auth errors are
	/// permanent (go straight to DLQ), quota/rate limits and network errors
	/// are transient (retried with backoff), malformed content is permanent
	/// tagged `content_error`.
	pub fn is_permanent(&self) -> bool {
		matches!(self, Self::Permanent { .. } | Self::WebhookRejected { .. })
	}
}
