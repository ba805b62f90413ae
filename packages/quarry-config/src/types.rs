use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub backend: Backend,
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Backend {
	pub url: String,
	/// Index queried for `workspace://` stores.
	pub index: String,
	/// Index queried for `archive://` stores. Archive stores are rejected when unset.
	pub archive_index: Option<String>,
	pub timeout_ms: u64,
	/// Optional. Sent as `Authorization: ApiKey <key>`.
	pub api_key: Option<String>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	/// Mirrors the backend's `index.max_result_window`; `skip + limit` above it needs a scroll.
	pub max_result_window: u32,
	pub scroll_batch_size: u32,
	pub scroll_ttl_ms: u64,
	#[serde(default = "default_track_total_hits_cap")]
	pub track_total_hits_cap: u32,
	#[serde(default)]
	pub include_groups_for_role_admin: bool,
}
impl Search {
	pub fn scroll_ttl(&self) -> Duration {
		Duration::from_millis(self.scroll_ttl_ms)
	}
}
impl Default for Search {
	fn default() -> Self {
		Self {
			max_result_window: 10_000,
			scroll_batch_size: 2_000,
			scroll_ttl_ms: 60_000,
			track_total_hits_cap: default_track_total_hits_cap(),
			include_groups_for_role_admin: false,
		}
	}
}

fn default_track_total_hits_cap() -> u32 {
	10_000
}
