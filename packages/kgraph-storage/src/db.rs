use kgraph_config::Postgres;
use sqlx::Postgres as PgDriver;
use sqlx::postgres::PgPoolOptions;

use crate::{Result, schema};

pub struct Db {
	pub pool: sqlx::PgPool,
}

impl Db {
	pub async fn connect(cfg: &Postgres) -> Result<Self> {
		let pool = PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self, vector_dim: u32) -> Result<()> {
		let sql = schema::render_schema(vector_dim);
		let lock_id: i64 = 7_223_114;
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	/// Opens a transaction and binds `tenant_id` to it via `SET LOCAL
	/// app.tenant_id`. Every row-level-security policy in `sql/tables/*`
	/// reads this session variable, so any query issued on the returned
	/// transaction is sealed to the tenant regardless of whether the caller
	/// remembers to filter by `tenant_id` itself.
	pub async fn begin_tenant_scoped(
		&self,
		tenant_id: &str,
	) -> Result<sqlx::Transaction<'_, PgDriver>> {
		let mut tx = self.pool.begin().await?;
		sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
			.bind(tenant_id)
			.execute(&mut *tx)
			.await?;
		Ok(tx)
	}
}
