use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use quarry_transport::Hit;

use crate::{
	Result, ResultMaterializer,
	request::{facet_query_name, field_facet_name},
	spec::SearchSpec,
};

pub struct MaterializeArgs<'a> {
	pub spec: &'a SearchSpec,
	pub hits: Vec<Hit>,
	pub total_hits: u64,
	pub elapsed_ms: u64,
	/// Raw backend aggregations. Always `None` for scrolled results.
	pub aggregations: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
	pub id: String,
	pub score: Option<f32>,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub highlights: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldFacetResult {
	pub field: String,
	pub buckets: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetQueryResult {
	pub query: String,
	pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetResults {
	pub fields: Vec<FieldFacetResult>,
	pub queries: Vec<FacetQueryResult>,
}

/// Rows never exceed the requested limit. `total_hits` is whatever the backend counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
	pub rows: Vec<ResultRow>,
	pub total_hits: u64,
	pub elapsed_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub facets: Option<FacetResults>,
}
impl ResultSet {
	pub fn empty(elapsed_ms: u64) -> Self {
		Self { elapsed_ms, ..Default::default() }
	}
}

#[derive(Debug, Clone, Default)]
pub struct HitMaterializer;
impl ResultMaterializer for HitMaterializer {
	fn build(&self, args: MaterializeArgs<'_>) -> Result<ResultSet> {
		let MaterializeArgs { spec, hits, total_hits, elapsed_ms, aggregations } = args;
		let rows = hits
			.into_iter()
			.map(|hit| ResultRow { id: hit.id, score: hit.score, highlights: hit.highlight })
			.collect();
		let facets = if spec.has_facets() {
			Some(decode_facets(spec, aggregations.as_ref().unwrap_or(&Value::Null)))
		} else {
			None
		};

		Ok(ResultSet { rows, total_hits, elapsed_ms, facets })
	}
}

fn decode_facets(spec: &SearchSpec, aggregations: &Value) -> FacetResults {
	let fields = spec
		.field_facets
		.iter()
		.enumerate()
		.map(|(position, facet)| FieldFacetResult {
			field: facet.field.clone(),
			buckets: aggregations
				.get(field_facet_name(position))
				.and_then(|agg| agg.get("buckets"))
				.and_then(Value::as_array)
				.map(|buckets| buckets.iter().filter_map(decode_bucket).collect())
				.unwrap_or_default(),
		})
		.collect();
	let queries = spec
		.facet_queries
		.iter()
		.enumerate()
		.map(|(position, query)| FacetQueryResult {
			query: query.clone(),
			count: aggregations
				.get(facet_query_name(position))
				.and_then(|agg| agg.get("doc_count"))
				.and_then(Value::as_u64)
				.unwrap_or(0),
		})
		.collect();

	FacetResults { fields, queries }
}

fn decode_bucket(bucket: &Value) -> Option<(String, u64)> {
	let key = match bucket.get("key_as_string").or_else(|| bucket.get("key"))? {
		Value::String(key) => key.clone(),
		other => other.to_string(),
	};
	let count = bucket.get("doc_count").and_then(Value::as_u64)?;

	Some((key, count))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::spec::FieldFacet;

	#[test]
	fn rows_keep_order_scores_and_highlights() {
		let spec = SearchSpec::new("budget");
		let mut highlight = BTreeMap::new();

		highlight.insert("cm:content".to_string(), vec!["<em>budget</em> 2026".to_string()]);

		let result = HitMaterializer
			.build(MaterializeArgs {
				spec: &spec,
				hits: vec![
					Hit { id: "a".to_string(), score: Some(2.5), highlight },
					Hit { id: "b".to_string(), score: Some(1.0), highlight: BTreeMap::new() },
				],
				total_hits: 42,
				elapsed_ms: 7,
				aggregations: None,
			})
			.expect("materialize failed");

		assert_eq!(result.total_hits, 42);
		assert_eq!(result.elapsed_ms, 7);
		assert_eq!(result.rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
		assert_eq!(result.rows[0].highlights["cm:content"], ["<em>budget</em> 2026"]);
		assert!(result.facets.is_none());
	}

	#[test]
	fn facets_are_decoded_by_position() {
		let mut spec = SearchSpec::new("budget");

		spec.field_facets = vec![FieldFacet::new("cm:creator"), FieldFacet::new("cm:created")];
		spec.facet_queries = vec!["TYPE:\"cm:folder\"".to_string(), "ASPECT:\"cm:titled\"".to_string()];

		let aggregations = serde_json::json!({
			"facet_field_0": { "buckets": [
				{ "key": "alice", "doc_count": 4 },
				{ "key": "bob", "doc_count": 1 }
			] },
			"facet_field_1": { "buckets": [
				{ "key": 1767225600000_u64, "key_as_string": "2026-01-01", "doc_count": 3 }
			] },
			"facet_query_0": { "doc_count": 9 }
		});
		let result = HitMaterializer
			.build(MaterializeArgs {
				spec: &spec,
				hits: Vec::new(),
				total_hits: 0,
				elapsed_ms: 0,
				aggregations: Some(aggregations),
			})
			.expect("materialize failed");
		let facets = result.facets.expect("Expected facets.");

		assert_eq!(facets.fields[0].buckets, vec![
			("alice".to_string(), 4),
			("bob".to_string(), 1)
		]);
		assert_eq!(facets.fields[1].buckets, vec![("2026-01-01".to_string(), 3)]);
		assert_eq!(facets.queries[0], FacetQueryResult {
			query: "TYPE:\"cm:folder\"".to_string(),
			count: 9
		});
		assert_eq!(facets.queries[1].count, 0);
	}

	#[test]
	fn empty_result_set_serializes_without_facets() {
		let json = serde_json::to_value(ResultSet::empty(3)).expect("serialize failed");

		assert_eq!(json, serde_json::json!({ "rows": [], "total_hits": 0, "elapsed_ms": 3 }));
	}
}
