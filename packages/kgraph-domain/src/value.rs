use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Open property document carried on a [`crate::node::Node`]. Internal code
/// traffics in this tree rather than `serde_json::Value` directly so that a
/// schema-validating decoder can sit at the API boundary only (per the
/// design note on dynamic property documents) without coupling storage and
/// retrieval code to JSON specifics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Array(Vec<PropValue>),
	Object(BTreeMap<String, PropValue>),
}

impl PropValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value.as_str()),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&BTreeMap<String, PropValue>> {
		match self {
			Self::Object(map) => Some(map),
			_ => None,
		}
	}
}

impl From<JsonValue> for PropValue {
	fn from(value: JsonValue) -> Self {
		match value {
			JsonValue::Null => Self::Null,
			JsonValue::Bool(b) => Self::Bool(b),
			JsonValue::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
			JsonValue::String(s) => Self::String(s),
			JsonValue::Array(items) => Self::Array(items.into_iter().map(Into::into).collect()),
			JsonValue::Object(map) =>
				Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
		}
	}
}

impl From<PropValue> for JsonValue {
	fn from(value: PropValue) -> Self {
		match value {
			PropValue::Null => JsonValue::Null,
			PropValue::Bool(b) => JsonValue::Bool(b),
			PropValue::Number(n) => serde_json::Number::from_f64(n)
				.map(JsonValue::Number)
				.unwrap_or(JsonValue::Null),
			PropValue::String(s) => JsonValue::String(s),
			PropValue::Array(items) => JsonValue::Array(items.into_iter().map(Into::into).collect()),
			PropValue::Object(map) =>
				JsonValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_json() {
		let json = serde_json::json!({"title": "t", "count": 3, "tags": ["a", "b"], "flag": true});
		let prop: PropValue = json.clone().into();
		let back: JsonValue = prop.into();
		assert_eq!(json, back);
	}
}
