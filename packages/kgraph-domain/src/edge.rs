use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::value::PropValue;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
	pub edge_id: Uuid,
	pub tenant_id: Option<String>,
	pub src_node_id: Uuid,
	pub dst_node_id: Uuid,
	pub relation: String,
	pub props: BTreeMap<String, PropValue>,
	pub created_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

impl Edge {
	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}
}
