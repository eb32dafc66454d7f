use dashmap::DashSet;

/// Tracks every `(tenant, provider)` pair with a non-empty queue so workers
/// can discover work in O(1) instead of scanning every possible pair.
/// Membership is advisory: a worker that finds nothing after claiming still
/// just moves on to the next pair, so a stale entry costs at most one empty
/// poll.
#[derive(Default)]
pub struct QueueRegistry {
	active: DashSet<(String, String)>,
}

impl QueueRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn mark_active(&self, tenant_id: &str, provider: &str) {
		self.active.insert((tenant_id.to_string(), provider.to_string()));
	}

	pub fn mark_drained(&self, tenant_id: &str, provider: &str) {
		self.active.remove(&(tenant_id.to_string(), provider.to_string()));
	}

	pub fn active_pairs(&self) -> Vec<(String, String)> {
		self.active.iter().map(|entry| entry.key().clone()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tracks_membership() {
		let registry = QueueRegistry::new();
		registry.mark_active("tenant-a", "gdrive");
		assert_eq!(registry.active_pairs(), vec![("tenant-a".to_string(), "gdrive".to_string())]);
		registry.mark_drained("tenant-a", "gdrive");
		assert!(registry.active_pairs().is_empty());
	}
}
