use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
	EngineSettings, Error, Result,
	query::{DEFAULT_FIELD, FilteredQuery},
	spec::{
		ARCHIVE_PROTOCOL, FieldFacet, HighlightSpec, SearchSpec, SortDefinition, SortKind,
		StoreRef, WORKSPACE_PROTOCOL,
	},
};

/// Requested hit-tracking values at or above this count exactly.
pub const TRACK_TOTAL_HITS_ACCURATE: i64 = i32::MAX as i64;

const FIELD_FACET_PREFIX: &str = "facet_field_";
const FACET_QUERY_PREFIX: &str = "facet_query_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTotalHits {
	Accurate,
	UpTo(u32),
}
impl Serialize for TrackTotalHits {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			Self::Accurate => serializer.serialize_bool(true),
			Self::UpTo(limit) => serializer.serialize_u32(*limit),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
	Offset { from: u32, size: u32 },
	/// Opens a scroll context. The backend cannot offset inside a scroll.
	Scroll { size: u32, ttl: Duration },
}

/// One backend round-trip. Built once by [`build_request`] and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
	index: String,
	query: Value,
	page: Page,
	sort: Vec<Value>,
	aggregations: Map<String, Value>,
	highlight: Option<Value>,
	track_total_hits: TrackTotalHits,
}
impl SearchRequest {
	pub fn index(&self) -> &str {
		&self.index
	}

	pub fn page(&self) -> Page {
		self.page
	}

	pub fn scroll_ttl(&self) -> Option<Duration> {
		match self.page {
			Page::Scroll { ttl, .. } => Some(ttl),
			Page::Offset { .. } => None,
		}
	}

	pub fn track_total_hits(&self) -> TrackTotalHits {
		self.track_total_hits
	}

	pub fn has_highlight(&self) -> bool {
		self.highlight.is_some()
	}

	pub fn body(&self) -> Value {
		let mut body = Map::new();

		body.insert("query".to_string(), self.query.clone());
		body.insert("_source".to_string(), Value::Bool(false));
		body.insert("track_scores".to_string(), Value::Bool(true));
		body.insert(
			"track_total_hits".to_string(),
			serde_json::to_value(self.track_total_hits).unwrap_or(Value::Bool(true)),
		);

		match self.page {
			Page::Offset { from, size } => {
				body.insert("from".to_string(), Value::from(from));
				body.insert("size".to_string(), Value::from(size));
			},
			Page::Scroll { size, .. } => {
				body.insert("size".to_string(), Value::from(size));
			},
		}

		if !self.sort.is_empty() {
			body.insert("sort".to_string(), Value::Array(self.sort.clone()));
		}
		if !self.aggregations.is_empty() {
			body.insert("aggs".to_string(), Value::Object(self.aggregations.clone()));
		}
		if let Some(highlight) = &self.highlight {
			body.insert("highlight".to_string(), highlight.clone());
		}

		Value::Object(body)
	}
}

/// `-1` and anything at or above the sentinel count exactly, other positive values are used as
/// given, and `0` or unset falls back to `cap`.
pub fn resolve_track_total_hits(requested: Option<i64>, cap: u32) -> TrackTotalHits {
	match requested {
		Some(-1) => TrackTotalHits::Accurate,
		Some(value) if value >= TRACK_TOTAL_HITS_ACCURATE => TrackTotalHits::Accurate,
		Some(value) if value > 0 => TrackTotalHits::UpTo(value as u32),
		_ => TrackTotalHits::UpTo(cap),
	}
}

pub fn build_request(
	settings: &EngineSettings,
	spec: &SearchSpec,
	query: &FilteredQuery,
	page: Page,
) -> Result<SearchRequest> {
	let index = resolve_index(settings, &spec.stores)?;
	let track_total_hits = match page {
		Page::Scroll { .. } => TrackTotalHits::Accurate,
		Page::Offset { .. } =>
			resolve_track_total_hits(spec.track_total_hits, settings.track_total_hits_cap),
	};
	let highlight = spec.highlight.as_ref().map(highlight_clause).transpose()?;

	Ok(SearchRequest {
		index,
		query: query.as_tree().as_value().clone(),
		page,
		sort: spec.sort.iter().map(sort_clause).collect(),
		aggregations: aggregation_clauses(spec),
		highlight,
		track_total_hits,
	})
}

pub fn resolve_index(settings: &EngineSettings, stores: &[StoreRef]) -> Result<String> {
	let store = match stores {
		[] => return Ok(settings.index.clone()),
		[store] => store,
		_ => return Err(Error::query("Multi-store queries are not supported.")),
	};

	match store.protocol.as_str() {
		WORKSPACE_PROTOCOL => Ok(settings.index.clone()),
		ARCHIVE_PROTOCOL => settings
			.archive_index
			.clone()
			.ok_or_else(|| Error::query(format!("Store '{store}' has no configured index."))),
		other => Err(Error::query(format!("Unsupported store protocol '{other}'."))),
	}
}

pub fn field_facet_name(position: usize) -> String {
	format!("{FIELD_FACET_PREFIX}{position}")
}

pub fn facet_query_name(position: usize) -> String {
	format!("{FACET_QUERY_PREFIX}{position}")
}

fn sort_clause(sort: &SortDefinition) -> Value {
	let order = if sort.ascending { "asc" } else { "desc" };

	match &sort.kind {
		SortKind::Score => serde_json::json!({ "_score": { "order": order } }),
		SortKind::Document => serde_json::json!({ "_doc": { "order": order } }),
		SortKind::Field(field) => serde_json::json!({ (field.as_str()): { "order": order } }),
	}
}

fn aggregation_clauses(spec: &SearchSpec) -> Map<String, Value> {
	let mut aggregations = Map::new();

	for (position, facet) in spec.field_facets.iter().enumerate() {
		aggregations.insert(field_facet_name(position), terms_aggregation(facet));
	}
	for (position, facet_query) in spec.facet_queries.iter().enumerate() {
		aggregations.insert(
			facet_query_name(position),
			serde_json::json!({
				"filter": {
					"query_string": { "query": facet_query, "default_field": DEFAULT_FIELD }
				}
			}),
		);
	}

	aggregations
}

fn terms_aggregation(facet: &FieldFacet) -> Value {
	let mut terms = Map::new();

	terms.insert("field".to_string(), Value::from(facet.field.as_str()));
	terms.insert("size".to_string(), Value::from(facet.limit));
	terms.insert("min_doc_count".to_string(), Value::from(facet.min_count));

	if let Some(prefix) = facet.prefix.as_deref().filter(|prefix| !prefix.is_empty()) {
		terms.insert("include".to_string(), Value::from(format!("{}.*", regex::escape(prefix))));
	}

	serde_json::json!({ "terms": terms })
}

fn highlight_clause(highlight: &HighlightSpec) -> Result<Value> {
	if highlight.fields.is_empty() {
		return Err(Error::query("Highlighting requires at least one field."));
	}

	let mut fields = Map::new();

	for field in &highlight.fields {
		let mut options = Map::new();

		if let Some(size) = field.fragment_size {
			options.insert("fragment_size".to_string(), Value::from(size));
		}
		if let Some(count) = field.snippet_count {
			options.insert("number_of_fragments".to_string(), Value::from(count));
		}

		fields.insert(field.field.clone(), Value::Object(options));
	}

	let mut clause = Map::new();

	clause.insert("require_field_match".to_string(), Value::Bool(false));

	if let Some(prefix) = &highlight.prefix {
		clause.insert("pre_tags".to_string(), serde_json::json!([prefix]));
	}
	if let Some(postfix) = &highlight.postfix {
		clause.insert("post_tags".to_string(), serde_json::json!([postfix]));
	}
	if let Some(size) = highlight.fragment_size {
		clause.insert("fragment_size".to_string(), Value::from(size));
	}
	if let Some(count) = highlight.snippet_count {
		clause.insert("number_of_fragments".to_string(), Value::from(count));
	}

	clause.insert("fields".to_string(), Value::Object(fields));

	Ok(Value::Object(clause))
}
