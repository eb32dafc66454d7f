pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../sql/00_extensions.sql")),
				"tables/001_nodes.sql" => out.push_str(include_str!("../sql/tables/001_nodes.sql")),
				"tables/002_node_versions.sql" =>
					out.push_str(include_str!("../sql/tables/002_node_versions.sql")),
				"tables/003_edges.sql" => out.push_str(include_str!("../sql/tables/003_edges.sql")),
				"tables/004_events.sql" => out.push_str(include_str!("../sql/tables/004_events.sql")),
				"tables/005_embedding_history.sql" =>
					out.push_str(include_str!("../sql/tables/005_embedding_history.sql")),
				"tables/006_patterns.sql" =>
					out.push_str(include_str!("../sql/tables/006_patterns.sql")),
				"tables/007_pattern_fires.sql" =>
					out.push_str(include_str!("../sql/tables/007_pattern_fires.sql")),
				"tables/008_connector_configs.sql" =>
					out.push_str(include_str!("../sql/tables/008_connector_configs.sql")),
				"tables/009_connector_cursors.sql" =>
					out.push_str(include_str!("../sql/tables/009_connector_cursors.sql")),
				"tables/010_connector_queue.sql" =>
					out.push_str(include_str!("../sql/tables/010_connector_queue.sql")),
				"tables/011_connector_dlq.sql" =>
					out.push_str(include_str!("../sql/tables/011_connector_dlq.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
