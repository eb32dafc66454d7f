use kgraph_crypto::KeyRing;
use kgraph_domain::connector::ConnectorConfig;
use kgraph_storage::db::Db;
use uuid::Uuid;

use crate::Result;

/// Wraps the config store with transparent secret encryption. Callers never
/// see ciphertext; `secret` in, `secret` out.
pub struct ConfigStore<'a> {
	db: &'a Db,
	keys: &'a KeyRing,
}

impl<'a> ConfigStore<'a> {
	pub fn new(db: &'a Db, keys: &'a KeyRing) -> Self {
		Self { db, keys }
	}

	pub async fn upsert(
		&self,
		tenant_id: &str,
		provider: &str,
		secret: &[u8],
		webhook_scheme: Option<&str>,
		topic_allowlist: &[String],
	) -> Result<ConnectorConfig> {
		let envelope = self.keys.encrypt(secret)?;
		let config = kgraph_storage::connectors::upsert_connector(
			self.db,
			tenant_id,
			provider,
			&envelope.ciphertext,
			envelope.key_version,
			webhook_scheme,
			topic_allowlist,
		)
		.await?;
		Ok(config)
	}

	pub async fn get(&self, tenant_id: &str, provider: &str) -> Result<Option<(ConnectorConfig, Vec<u8>)>> {
		let Some(config) = kgraph_storage::connectors::get_connector(self.db, tenant_id, provider).await?
		else {
			return Ok(None);
		};
		let envelope = kgraph_crypto::Envelope {
			key_version: config.key_version,
			ciphertext: config.encrypted_secret.clone(),
		};
		let secret = self.keys.decrypt(&envelope)?;
		Ok(Some((config, secret)))
	}

	/// Re-encrypts every row whose `key_version` doesn't match the active
	/// key. Meant to be invoked by an admin operation after a KEK rotation,
	/// analogous to an index-rebuild admin route.
	pub async fn rotate_stale(&self, tenant_id: &str, provider: &str) -> Result<bool> {
		let Some(config) = kgraph_storage::connectors::get_connector(self.db, tenant_id, provider).await?
		else {
			return Ok(false);
		};
		if config.key_version == self.keys.active_version() {
			return Ok(false);
		}
		let envelope = kgraph_crypto::Envelope {
			key_version: config.key_version,
			ciphertext: config.encrypted_secret,
		};
		let rotated = self.keys.rotate(&envelope)?;
		kgraph_storage::connectors::upsert_connector(
			self.db,
			tenant_id,
			provider,
			&rotated.ciphertext,
			rotated.key_version,
			config.webhook_scheme.as_deref(),
			&config.topic_allowlist,
		)
		.await?;
		Ok(true)
	}
}

pub struct CursorStore<'a> {
	db: &'a Db,
}

impl<'a> CursorStore<'a> {
	pub fn new(db: &'a Db) -> Self {
		Self { db }
	}

	pub async fn get(&self, tenant_id: &str, connector_id: Uuid) -> Result<Option<String>> {
		let cursor = kgraph_storage::connectors::get_cursor(self.db, tenant_id, connector_id).await?;
		Ok(cursor.and_then(|c| c.cursor))
	}

	pub async fn set(&self, tenant_id: &str, connector_id: Uuid, cursor: Option<&str>) -> Result<()> {
		kgraph_storage::connectors::set_cursor(self.db, tenant_id, connector_id, cursor).await?;
		Ok(())
	}
}
