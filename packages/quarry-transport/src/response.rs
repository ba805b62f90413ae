use std::collections::BTreeMap;

use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
	pub id: String,
	pub score: Option<f32>,
	pub highlight: BTreeMap<String, Vec<String>>,
}

/// One failed shard, as reported in `_shards.failures` or an error body's `failed_shards`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
	pub index: Option<String>,
	pub shard: Option<i64>,
	pub node: Option<String>,
	pub kind: Option<String>,
	/// The reason text joined with every nested `caused_by` reason.
	pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
	pub took_ms: u64,
	pub total_hits: u64,
	pub hits: Vec<Hit>,
	pub scroll_id: Option<String>,
	/// `None` when the response has no failure section at all.
	pub shard_failures: Option<Vec<ShardFailure>>,
	pub aggregations: Option<Value>,
}

pub fn parse_search_response(json: Value) -> Result<BackendResponse> {
	let hits_obj = json
		.get("hits")
		.ok_or_else(|| Error::InvalidResponse {
			message: "Search response is missing hits object.".to_string(),
		})?;
	let total_hits = match hits_obj.get("total") {
		Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
		Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
		None => 0,
	};
	let raw_hits = hits_obj.get("hits").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Search response is missing hits array.".to_string() }
	})?;
	let mut hits = Vec::with_capacity(raw_hits.len());

	for raw in raw_hits {
		hits.push(parse_hit(raw)?);
	}

	let shard_failures = json
		.get("_shards")
		.and_then(|shards| shards.get("failures"))
		.and_then(Value::as_array)
		.map(|failures| failures.iter().map(parse_shard_failure).collect());

	Ok(BackendResponse {
		took_ms: json.get("took").and_then(Value::as_u64).unwrap_or(0),
		total_hits,
		hits,
		scroll_id: json.get("_scroll_id").and_then(Value::as_str).map(str::to_string),
		shard_failures,
		aggregations: json.get("aggregations").cloned(),
	})
}

/// Parses a non-2xx body into `Error::Rejected`. Bodies that are not backend errors keep the raw
/// text as the reason.
pub fn parse_error_body(status: u16, body: &str) -> Error {
	let Ok(json) = serde_json::from_str::<Value>(body) else {
		return Error::Rejected { status, reason: body.trim().to_string(), failures: Vec::new() };
	};
	let Some(error) = json.get("error") else {
		return Error::Rejected { status, reason: body.trim().to_string(), failures: Vec::new() };
	};

	if let Some(reason) = error.as_str() {
		return Error::Rejected { status, reason: reason.to_string(), failures: Vec::new() };
	}

	let reason = reason_chain(error).unwrap_or_else(|| body.trim().to_string());
	let failures = error
		.get("failed_shards")
		.and_then(Value::as_array)
		.map(|failures| failures.iter().map(parse_shard_failure).collect())
		.unwrap_or_default();

	Error::Rejected { status, reason, failures }
}

fn parse_hit(raw: &Value) -> Result<Hit> {
	let id = raw.get("_id").and_then(Value::as_str).ok_or_else(|| Error::InvalidResponse {
		message: "Search hit is missing _id.".to_string(),
	})?;
	let score = raw.get("_score").and_then(Value::as_f64).map(|score| score as f32);
	let mut highlight = BTreeMap::new();

	if let Some(fields) = raw.get("highlight").and_then(Value::as_object) {
		for (field, fragments) in fields {
			let fragments = fragments
				.as_array()
				.map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
				.unwrap_or_default();

			highlight.insert(field.clone(), fragments);
		}
	}

	Ok(Hit { id: id.to_string(), score, highlight })
}

fn parse_shard_failure(raw: &Value) -> ShardFailure {
	let reason = raw.get("reason");

	ShardFailure {
		index: raw.get("index").and_then(Value::as_str).map(str::to_string),
		shard: raw.get("shard").and_then(Value::as_i64),
		node: raw.get("node").and_then(Value::as_str).map(str::to_string),
		kind: reason.and_then(|r| r.get("type")).and_then(Value::as_str).map(str::to_string),
		reason: reason.and_then(reason_chain).unwrap_or_else(|| "unknown shard failure".to_string()),
	}
}

fn reason_chain(reason: &Value) -> Option<String> {
	if let Some(text) = reason.as_str() {
		return Some(text.to_string());
	}

	let mut parts = Vec::new();
	let mut current = Some(reason);

	while let Some(node) = current {
		if let Some(text) = node.get("reason").and_then(Value::as_str) {
			parts.push(text.to_string());
		}

		current = node.get("caused_by");
	}

	if parts.is_empty() { None } else { Some(parts.join(": ")) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_hits_total_and_scroll_id() {
		let json = serde_json::json!({
			"took": 7,
			"_scroll_id": "scroll-1",
			"_shards": { "total": 2, "successful": 2, "failed": 0 },
			"hits": {
				"total": { "value": 42, "relation": "eq" },
				"hits": [
					{ "_id": "a", "_score": 1.5, "highlight": { "cm:content": ["<em>x</em>"] } },
					{ "_id": "b", "_score": null }
				]
			}
		});
		let parsed = parse_search_response(json).expect("parse failed");

		assert_eq!(parsed.took_ms, 7);
		assert_eq!(parsed.total_hits, 42);
		assert_eq!(parsed.scroll_id.as_deref(), Some("scroll-1"));
		assert!(parsed.shard_failures.is_none());
		assert_eq!(parsed.hits.len(), 2);
		assert_eq!(parsed.hits[0].score, Some(1.5));
		assert_eq!(parsed.hits[0].highlight["cm:content"], vec!["<em>x</em>".to_string()]);
		assert_eq!(parsed.hits[1].score, None);
	}

	#[test]
	fn keeps_empty_failure_list_distinct_from_missing() {
		let json = serde_json::json!({
			"_shards": { "total": 1, "successful": 1, "failed": 0, "failures": [] },
			"hits": { "total": 0, "hits": [] }
		});
		let parsed = parse_search_response(json).expect("parse failed");

		assert_eq!(parsed.shard_failures, Some(Vec::new()));
	}

	#[test]
	fn shard_failure_reason_includes_caused_by() {
		let json = serde_json::json!({
			"_shards": {
				"failures": [{
					"shard": 3,
					"index": "alfresco",
					"node": "n1",
					"reason": {
						"type": "illegal_argument_exception",
						"reason": "outer",
						"caused_by": { "type": "x", "reason": "inner" }
					}
				}]
			},
			"hits": { "total": { "value": 0 }, "hits": [] }
		});
		let parsed = parse_search_response(json).expect("parse failed");
		let failures = parsed.shard_failures.expect("failures missing");

		assert_eq!(failures[0].reason, "outer: inner");
		assert_eq!(failures[0].shard, Some(3));
		assert_eq!(failures[0].kind.as_deref(), Some("illegal_argument_exception"));
	}

	#[test]
	fn error_body_collects_failed_shards() {
		let body = serde_json::json!({
			"error": {
				"type": "search_phase_execution_exception",
				"reason": "all shards failed",
				"failed_shards": [{
					"shard": 0,
					"index": "alfresco",
					"reason": { "type": "illegal_argument_exception", "reason": "Result window is too large" }
				}]
			},
			"status": 400
		})
		.to_string();
		let Error::Rejected { status, reason, failures } = parse_error_body(400, &body) else {
			panic!("Expected a rejected error.");
		};

		assert_eq!(status, 400);
		assert_eq!(reason, "all shards failed");
		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].reason, "Result window is too large");
	}

	#[test]
	fn error_body_that_is_not_json_keeps_text() {
		let Error::Rejected { reason, failures, .. } = parse_error_body(502, "Bad Gateway\n") else {
			panic!("Expected a rejected error.");
		};

		assert_eq!(reason, "Bad Gateway");
		assert!(failures.is_empty());
	}
}
