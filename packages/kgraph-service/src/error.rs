pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unauthorized: {message}")]
	Unauthorized { message: String },
	#[error("Scope denied: {message}")]
	ScopeDenied { message: String },
	#[error("Too many requests; retry after {retry_after_ms}ms")]
	TooManyRequests { retry_after_ms: u64 },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}

impl From<kgraph_storage::Error> for Error {
	fn from(err: kgraph_storage::Error) -> Self {
		match err {
			kgraph_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			kgraph_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			kgraph_storage::Error::NotFound(message) => Self::NotFound { message },
			kgraph_storage::Error::Conflict(message) => Self::Conflict { message },
			kgraph_storage::Error::VersionConflict { node_id, expected, found } => Self::Conflict {
				message: format!("node {node_id} expected version {expected}, found {found}"),
			},
		}
	}
}

impl From<kgraph_providers::Error> for Error {
	fn from(err: kgraph_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<jsonwebtoken::errors::Error> for Error {
	fn from(err: jsonwebtoken::errors::Error) -> Self {
		Self::Unauthorized { message: err.to_string() }
	}
}
