pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kinds shared across the workspace. Each crate wraps these behind its
/// own local `Error` (see `kgraph-storage::Error`, `kgraph-service::Error`);
/// this enum is the vocabulary they all translate into and out of.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Tenant already bound on this unit of work.")]
	TenantRebind,
	#[error("Embedding dimension mismatch: expected {expected}, got {got}.")]
	DimensionMismatch { expected: u32, got: usize },
	#[error("Invalid cron expression: {0}")]
	InvalidCron(String),
	#[error("Version conflict for node {node_id}: expected {expected}, found {found}.")]
	VersionConflict { node_id: uuid::Uuid, expected: i64, found: i64 },
	#[error("Validation failed: {0}")]
	Validation(String),
	#[error("Not found: {0}")]
	NotFound(String),
}
