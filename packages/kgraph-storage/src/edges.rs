use kgraph_domain::edge::Edge;
use kgraph_domain::value::PropValue;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Db;
use crate::models::EdgeRow;
use crate::{Error, Result};

fn edge_from_row(row: EdgeRow) -> Edge {
	Edge {
		edge_id: row.edge_id,
		tenant_id: Some(row.tenant_id),
		src_node_id: row.src_node_id,
		dst_node_id: row.dst_node_id,
		relation: row.relation,
		props: match PropValue::from(row.props) {
			PropValue::Object(map) => map,
			_ => Default::default(),
		},
		created_at: row.created_at,
		deleted_at: row.deleted_at,
	}
}

pub async fn create_edge(
	db: &Db,
	tenant_id: &str,
	src_node_id: Uuid,
	dst_node_id: Uuid,
	relation: &str,
	props: std::collections::BTreeMap<String, PropValue>,
) -> Result<Edge> {
	let props_json: JsonValue = PropValue::Object(props).into();
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;

	let row = sqlx::query_as::<_, EdgeRow>(
		"INSERT INTO edges (tenant_id, src_node_id, dst_node_id, relation, props) \
		 VALUES ($1,$2,$3,$4,$5) \
		 RETURNING edge_id, tenant_id, src_node_id, dst_node_id, relation, props, created_at, deleted_at",
	)
	.bind(tenant_id)
	.bind(src_node_id)
	.bind(dst_node_id)
	.bind(relation)
	.bind(&props_json)
	.fetch_one(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(edge_from_row(row))
}

pub async fn list_edges(db: &Db, tenant_id: &str, node_id: Uuid) -> Result<Vec<Edge>> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let rows = sqlx::query_as::<_, EdgeRow>(
		"SELECT edge_id, tenant_id, src_node_id, dst_node_id, relation, props, created_at, deleted_at \
		 FROM edges WHERE (src_node_id = $1 OR dst_node_id = $1) AND deleted_at IS NULL \
		 ORDER BY created_at DESC",
	)
	.bind(node_id)
	.fetch_all(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(rows.into_iter().map(edge_from_row).collect())
}

pub async fn delete_edge(db: &Db, tenant_id: &str, edge_id: Uuid) -> Result<()> {
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;
	let result = sqlx::query("UPDATE edges SET deleted_at = $1 WHERE edge_id = $2 AND deleted_at IS NULL")
		.bind(OffsetDateTime::now_utc())
		.bind(edge_id)
		.execute(&mut *tx)
		.await?;
	tx.commit().await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("edge {edge_id} not found")));
	}
	Ok(())
}
