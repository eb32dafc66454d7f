pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Version conflict for node {node_id}: expected {expected}, found {found}.")]
	VersionConflict { node_id: uuid::Uuid, expected: i64, found: i64 },
}

impl From<kgraph_domain::Error> for Error {
	fn from(err: kgraph_domain::Error) -> Self {
		match err {
			kgraph_domain::Error::VersionConflict { node_id, expected, found } =>
				Self::VersionConflict { node_id, expected, found },
			kgraph_domain::Error::NotFound(message) => Self::NotFound(message),
			kgraph_domain::Error::Validation(message) => Self::InvalidArgument(message),
			other => Self::InvalidArgument(other.to_string()),
		}
	}
}
