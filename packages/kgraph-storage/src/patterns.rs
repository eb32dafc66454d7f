use kgraph_domain::pattern::Pattern;
use uuid::Uuid;

use crate::convert::{format_vector_text, parse_vector_text};
use crate::db::Db;
use crate::models::PatternRow;
use crate::Result;

fn pattern_from_row(row: PatternRow, reference_embedding: Vec<f32>) -> Pattern {
	Pattern {
		pattern_id: row.pattern_id,
		tenant_id: Some(row.tenant_id),
		name: row.name,
		node_class: row.node_class,
		reference_embedding,
		threshold: row.threshold,
		webhook_url: row.webhook_url,
		enabled: row.enabled,
		created_at: row.created_at,
	}
}

pub async fn upsert_pattern(db: &Db, tenant_id: &str, pattern: &Pattern) -> Result<Pattern> {
	let vec_text = format_vector_text(&pattern.reference_embedding);
	let mut tx = db.begin_tenant_scoped(tenant_id).await?;

	let row = sqlx::query_as::<_, PatternRow>(
		"INSERT INTO patterns (tenant_id, name, node_class, reference_embedding, threshold, webhook_url, enabled) \
		 VALUES ($1,$2,$3,$4::vector,$5,$6,$7) \
		 ON CONFLICT (tenant_id, name) DO UPDATE SET \
		 node_class = EXCLUDED.node_class, reference_embedding = EXCLUDED.reference_embedding, \
		 threshold = EXCLUDED.threshold, webhook_url = EXCLUDED.webhook_url, enabled = EXCLUDED.enabled \
		 RETURNING pattern_id, tenant_id, name, node_class, threshold, webhook_url, enabled, created_at",
	)
	.bind(tenant_id)
	.bind(&pattern.name)
	.bind(&pattern.node_class)
	.bind(&vec_text)
	.bind(pattern.threshold)
	.bind(&pattern.webhook_url)
	.bind(pattern.enabled)
	.fetch_one(&mut *tx)
	.await?;
	tx.commit().await?;

	Ok(pattern_from_row(row, pattern.reference_embedding.clone()))
}

/// Enabled patterns across every tenant for `node_class`, used by the
/// trigger evaluation loop. Reference embeddings are decoded from pgvector's
/// text representation since sqlx has no native vector type.
pub async fn enabled_patterns_for_class(db: &Db, node_class: &str) -> Result<Vec<Pattern>> {
	let rows = sqlx::query_as::<_, (Uuid, String, String, String, String, f32, Option<String>, bool, time::OffsetDateTime)>(
		"SELECT pattern_id, tenant_id, name, node_class, reference_embedding::text, threshold, webhook_url, enabled, created_at \
		 FROM patterns WHERE node_class = $1 AND enabled = true",
	)
	.bind(node_class)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows
		.into_iter()
		.map(|(pattern_id, tenant_id, name, node_class, vec_text, threshold, webhook_url, enabled, created_at)| {
			Pattern {
				pattern_id,
				tenant_id: Some(tenant_id),
				name,
				node_class,
				reference_embedding: parse_vector_text(&vec_text),
				threshold,
				webhook_url,
				enabled,
				created_at,
			}
		})
		.collect())
}

pub async fn has_fired(db: &Db, pattern_id: Uuid, node_id: Uuid, embedding_version: i64) -> Result<bool> {
	let row = sqlx::query(
		"SELECT 1 FROM pattern_fires WHERE pattern_id = $1 AND node_id = $2 AND embedding_version = $3",
	)
	.bind(pattern_id)
	.bind(node_id)
	.bind(embedding_version)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row.is_some())
}

pub async fn record_fire(db: &Db, pattern_id: Uuid, node_id: Uuid, embedding_version: i64) -> Result<()> {
	sqlx::query(
		"INSERT INTO pattern_fires (pattern_id, node_id, embedding_version) VALUES ($1,$2,$3) \
		 ON CONFLICT DO NOTHING",
	)
	.bind(pattern_id)
	.bind(node_id)
	.bind(embedding_version)
	.execute(&db.pool)
	.await?;
	Ok(())
}
