use kgraph_domain::node::VectorMetric;
use sqlx::Row;
use uuid::Uuid;

use crate::convert::format_vector_text;
use crate::db::Db;
use crate::Result;

#[derive(Debug, Clone)]
pub struct VectorHit {
	pub node_id: Uuid,
	/// Raw pgvector distance/similarity for the requested metric. Callers
	/// convert this into a unit-interval score (see
	/// `kgraph_service::search::ranking`); this crate stays metric-neutral.
	pub raw_score: f32,
}

#[derive(Debug, Clone)]
pub struct LexicalHit {
	pub node_id: Uuid,
	pub rank: f32,
}

fn metric_operator(metric: VectorMetric) -> &'static str {
	match metric {
		VectorMetric::Cosine => "<=>",
		VectorMetric::L2 => "<->",
		VectorMetric::InnerProduct => "<#>",
	}
}

pub async fn vector_search(
	db: &Db,
	tenant_id: &str,
	query: &[f32],
	metric: VectorMetric,
	class_filter: Option<&str>,
	limit: u32,
) -> Result<Vec<VectorHit>> {
	let vec_text = format_vector_text(query);
	let op = metric_operator(metric);
	let sql = format!(
		"SELECT node_id, (embedding {op} $1::vector) AS raw_score FROM nodes \
		 WHERE deleted_at IS NULL AND embedding IS NOT NULL \
		 AND ($2::text IS NULL OR $2 = ANY(classes)) \
		 ORDER BY embedding {op} $1::vector ASC LIMIT $3"
	);

	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let rows = sqlx::query(&sql)
		.bind(&vec_text)
		.bind(class_filter)
		.bind(limit as i64)
		.fetch_all(&mut *tx)
		.await?;
	tx.commit().await?;

	Ok(rows
		.into_iter()
		.map(|row| VectorHit { node_id: row.get("node_id"), raw_score: row.get::<f32, _>("raw_score") })
		.collect())
}

pub async fn lexical_search(
	db: &Db,
	tenant_id: &str,
	query: &str,
	class_filter: Option<&str>,
	limit: u32,
) -> Result<Vec<LexicalHit>> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let rows = sqlx::query(
		"SELECT node_id, ts_rank(lexical_tsv, websearch_to_tsquery('english', $1)) AS rank FROM nodes \
		 WHERE deleted_at IS NULL AND lexical_tsv @@ websearch_to_tsquery('english', $1) \
		 AND ($2::text IS NULL OR $2 = ANY(classes)) \
		 ORDER BY rank DESC LIMIT $3",
	)
	.bind(query)
	.bind(class_filter)
	.bind(limit as i64)
	.fetch_all(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(rows.into_iter().map(|row| LexicalHit { node_id: row.get("node_id"), rank: row.get("rank") }).collect())
}

/// Refreshes `lexical_tsv` from the node's textual props. Called after
/// `nodes::update_node`/`create_node` write new props, since the generated
/// column approach would require knowing which prop keys hold body text
/// ahead of time and the schema keeps that open-ended.
pub async fn reindex_lexical(db: &Db, tenant_id: &str, node_id: Uuid, text: &str) -> Result<()> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	sqlx::query("UPDATE nodes SET lexical_tsv = to_tsvector('english', $1) WHERE node_id = $2")
		.bind(text)
		.bind(node_id)
		.execute(&mut *tx)
		.await?;
	tx.commit().await?;
	Ok(())
}
