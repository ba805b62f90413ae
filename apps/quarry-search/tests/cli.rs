use std::{
	env, fs,
	sync::{Arc, Mutex},
};

use axum::{
	Json, Router,
	extract::{Path, State},
	routing,
};
use clap::Parser;
use serde_json::{Map, Value};
use tokio::{
	net::TcpListener,
	sync::oneshot::{self, Sender},
};

use quarry_config::{Backend, Config, Search, Service};
use quarry_engine::{Operator, SortDefinition, SortKind, StoreRef};
use quarry_search::Args;

type Bodies = Arc<Mutex<Vec<(String, Value)>>>;

fn parse(extra: &[&str]) -> Args {
	let mut argv = vec!["quarry-search", "-c", "quarry.toml", "-u", "alice"];

	argv.extend_from_slice(extra);

	Args::try_parse_from(argv).expect("Failed to parse arguments.")
}

fn config(url: String) -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		backend: Backend {
			url,
			index: "alfresco".to_string(),
			archive_index: None,
			timeout_ms: 5_000,
			api_key: None,
			default_headers: Map::new(),
		},
		search: Search::default(),
	}
}

async fn start_backend(bodies: Bodies) -> (String, Sender<()>) {
	let app =
		Router::new().route("/{index}/_search", routing::post(search_handler)).with_state(bodies);
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind mock backend.");
	let addr = listener.local_addr().expect("Failed to read mock backend address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

async fn search_handler(
	State(bodies): State<Bodies>,
	Path(index): Path<String>,
	Json(body): Json<Value>,
) -> Json<Value> {
	bodies.lock().unwrap_or_else(|err| err.into_inner()).push((index, body));

	Json(serde_json::json!({
		"took": 2,
		"_shards": { "total": 1, "successful": 1, "failed": 0 },
		"hits": {
			"total": { "value": 3, "relation": "eq" },
			"hits": [
				{ "_id": "node-1", "_score": 3.0, "highlight": { "cm:name": ["<em>budget</em>.xlsx"] } },
				{ "_id": "node-2", "_score": 2.0 }
			]
		}
	}))
}

#[test]
fn flags_map_onto_the_search_spec() {
	let args = parse(&[
		"--query",
		"budget",
		"--store",
		"archive://SpacesStore",
		"--skip",
		"20",
		"--limit",
		"10",
		"--sort",
		"cm:modified:desc",
		"--sort",
		"score",
		"--facet-field",
		"cm:creator",
		"--filter-query",
		"TYPE:\"cm:content\"",
		"--highlight-field",
		"cm:content",
		"--track-total-hits",
		"-1",
		"--and",
	]);
	let spec = quarry_search::build_spec(&args).expect("Failed to build spec.");

	assert_eq!(spec.query, "budget");
	assert_eq!(spec.stores, vec![StoreRef::new("archive", "SpacesStore")]);
	assert_eq!((spec.skip_count, spec.limit), (20, Some(10)));
	assert_eq!(spec.sort, vec![SortDefinition::field("cm:modified", false), SortDefinition {
		kind: SortKind::Score,
		ascending: true
	}]);
	assert_eq!(spec.field_facets[0].field, "cm:creator");
	assert_eq!(spec.filter_queries, vec!["TYPE:\"cm:content\""]);
	assert_eq!(spec.highlight.expect("Expected highlighting.").fields[0].field, "cm:content");
	assert_eq!(spec.track_total_hits, Some(-1));
	assert_eq!(spec.default_operator, Operator::And);
}

#[test]
fn sort_without_order_is_ascending() {
	assert_eq!(
		quarry_search::parse_sort("cm:name").expect("Failed to parse sort."),
		SortDefinition::field("cm:name", true)
	);
	assert!(quarry_search::parse_sort(":desc").is_err());
}

#[test]
fn query_or_spec_is_required() {
	let err = Args::try_parse_from(["quarry-search", "-c", "quarry.toml", "-u", "alice"])
		.expect_err("Expected a missing query error.");

	assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
	assert!(
		Args::try_parse_from([
			"quarry-search",
			"-c",
			"quarry.toml",
			"-u",
			"alice",
			"--query",
			"a",
			"--spec",
			"spec.json",
		])
		.is_err()
	);
}

#[test]
fn bad_store_reference_is_rejected_at_parse_time() {
	assert!(
		Args::try_parse_from([
			"quarry-search",
			"-c",
			"quarry.toml",
			"-u",
			"alice",
			"--query",
			"a",
			"--store",
			"SpacesStore",
		])
		.is_err()
	);
}

#[test]
fn spec_file_is_used_verbatim() {
	let path = env::temp_dir().join(format!("quarry_search_spec_{}.json", std::process::id()));

	fs::write(&path, r#"{ "query": "report", "limit": 5, "facet_queries": ["TYPE:\"cm:folder\""] }"#)
		.expect("Failed to write spec fixture.");

	let args = parse(&["--spec", path.to_str().expect("Temp path is not UTF-8.")]);
	let spec = quarry_search::build_spec(&args).expect("Failed to build spec.");

	fs::remove_file(&path).expect("Failed to remove spec fixture.");

	assert_eq!(spec.query, "report");
	assert_eq!(spec.limit, Some(5));
	assert!(spec.has_facets());
}

#[tokio::test]
async fn search_runs_against_backend() {
	let bodies = Bodies::default();
	let (url, shutdown) = start_backend(bodies.clone()).await;
	let args = parse(&["--query", "budget", "--limit", "2", "--highlight-field", "cm:name"]);
	let result = quarry_search::search(&args, &config(url)).await.expect("Search failed.");
	let recorded = bodies.lock().unwrap_or_else(|err| err.into_inner()).clone();

	assert_eq!(result.total_hits, 3);
	assert_eq!(result.rows.len(), 2);
	assert_eq!(result.rows[0].highlights["cm:name"], ["<em>budget</em>.xlsx"]);
	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].0, "alfresco");
	assert_eq!(recorded[0].1["size"], 2);
	assert!(recorded[0].1.to_string().contains("\"READER\":[\"alice\"]"));

	let _ = shutdown.send(());
}
