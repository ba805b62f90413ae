//! Scripted backends and spy collaborators for engine tests.

use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;

use quarry_engine::{
	AuthorityPermissionComposer, BoxFuture, Collaborators, DefaultFilterComposer, EngineSettings,
	HitMaterializer, PermissionComposer, Principal, QueryStringBuilder, QueryTree, SearchRequest,
	TransportClient,
};
use quarry_transport::{BackendResponse, Error as TransportError, Hit, ShardFailure};

pub const HIGHLIGHT_OFFSET_REASON: &str = "The length [1048577] of field [cm:content] in doc[3]/index[alfresco] exceeds the [index.highlight.max_analyzed_offset] limit [1000000]. To avoid this error, set the query parameter [max_analyzed_offset] to a value less than index setting [1000000] and this will tolerate long field values by truncating them.";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	Search { index: String, body: Value, scroll_ttl: Option<Duration> },
	Scroll { scroll_id: String, ttl: Duration },
	ClearScroll { scroll_id: String },
}
impl Call {
	pub fn is_clear(&self) -> bool {
		matches!(self, Self::ClearScroll { .. })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightFault {
	/// Only requests carrying a highlight clause fail.
	WhenRequested,
	/// Every search and scroll call fails.
	Always,
}

#[derive(Debug, Default)]
struct ScrollState {
	position: usize,
	size: usize,
}

#[derive(Debug, Default)]
struct State {
	calls: Vec<Call>,
	round_trips: usize,
	next_scroll: usize,
	scrolls: HashMap<String, ScrollState>,
}

/// An in-memory backend over `corpus` documents named `doc-00000`, `doc-00001`, ...
///
/// Scroll ids rotate on every page, as real backends may do. Standard requests beyond the
/// result window are rejected with the backend's own shard failure.
pub struct PagedBackend {
	corpus: usize,
	result_window: usize,
	aggregations: Option<Value>,
	unavailable_at: Option<usize>,
	highlight_fault: Option<HighlightFault>,
	failing_clear: bool,
	state: Mutex<State>,
}
impl PagedBackend {
	pub fn new(corpus: usize) -> Self {
		Self {
			corpus,
			result_window: 10_000,
			aggregations: None,
			unavailable_at: None,
			highlight_fault: None,
			failing_clear: false,
			state: Mutex::new(State::default()),
		}
	}

	pub fn with_result_window(mut self, result_window: usize) -> Self {
		self.result_window = result_window;

		self
	}

	pub fn with_aggregations(mut self, aggregations: Value) -> Self {
		self.aggregations = Some(aggregations);

		self
	}

	/// The `round_trip`-th search or scroll call (1-based) fails as unreachable.
	pub fn unavailable_at(mut self, round_trip: usize) -> Self {
		self.unavailable_at = Some(round_trip);

		self
	}

	pub fn with_highlight_fault(mut self, fault: HighlightFault) -> Self {
		self.highlight_fault = Some(fault);

		self
	}

	pub fn with_failing_clear(mut self) -> Self {
		self.failing_clear = true;

		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.lock().calls.clone()
	}

	/// Search and scroll calls, excluding scroll release.
	pub fn round_trips(&self) -> usize {
		self.lock().round_trips
	}

	pub fn clears(&self) -> Vec<String> {
		self.lock()
			.calls
			.iter()
			.filter_map(|call| match call {
				Call::ClearScroll { scroll_id } => Some(scroll_id.clone()),
				_ => None,
			})
			.collect()
	}

	/// Search bodies in call order.
	pub fn search_bodies(&self) -> Vec<Value> {
		self.lock()
			.calls
			.iter()
			.filter_map(|call| match call {
				Call::Search { body, .. } => Some(body.clone()),
				_ => None,
			})
			.collect()
	}

	/// Scroll ids handed out so far, in order.
	pub fn issued_scroll_ids(&self) -> Vec<String> {
		(1..=self.lock().next_scroll).map(scroll_id).collect()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn fault(&self, state: &mut State) -> Option<TransportError> {
		state.round_trips += 1;

		(self.unavailable_at == Some(state.round_trips)).then(|| TransportError::Unavailable {
			message: "error sending request: connection refused".to_string(),
		})
	}

	fn highlight_failures(&self, highlighted: bool) -> Option<Vec<ShardFailure>> {
		let fails = match self.highlight_fault? {
			HighlightFault::Always => true,
			HighlightFault::WhenRequested => highlighted,
		};

		fails.then(|| {
			vec![ShardFailure {
				index: Some("alfresco".to_string()),
				shard: Some(0),
				node: Some("node-1".to_string()),
				kind: Some("illegal_argument_exception".to_string()),
				reason: HIGHLIGHT_OFFSET_REASON.to_string(),
			}]
		})
	}

	fn page(&self, start: usize, size: usize) -> Vec<Hit> {
		let end = start.saturating_add(size).min(self.corpus);

		(start.min(end)..end)
			.map(|n| Hit {
				id: doc_id(n),
				score: Some((self.corpus - n) as f32),
				highlight: Default::default(),
			})
			.collect()
	}

	fn respond(
		&self,
		state: &mut State,
		request: &SearchRequest,
	) -> Result<BackendResponse, TransportError> {
		let body = request.body();
		let highlighted = request.has_highlight();
		let size = body["size"].as_u64().unwrap_or(10) as usize;

		if let Some(err) = self.fault(state) {
			return Err(err);
		}
		if request.scroll_ttl().is_none() {
			let from = body["from"].as_u64().unwrap_or(0) as usize;

			if from + size > self.result_window {
				return Err(window_rejection(from + size, self.result_window));
			}

			return Ok(BackendResponse {
				took_ms: 1,
				total_hits: self.total_hits(request),
				hits: self.page(from, size),
				scroll_id: None,
				shard_failures: self.highlight_failures(highlighted),
				aggregations: self.aggregations.clone(),
			});
		}

		let id = self.open_scroll(state, size, size);

		Ok(BackendResponse {
			took_ms: 1,
			total_hits: self.corpus as u64,
			hits: self.page(0, size),
			scroll_id: Some(id),
			shard_failures: self.highlight_failures(highlighted),
			aggregations: None,
		})
	}

	fn continue_scroll(
		&self,
		state: &mut State,
		id: &str,
	) -> Result<BackendResponse, TransportError> {
		if let Some(err) = self.fault(state) {
			return Err(err);
		}

		let Some(scroll) = state.scrolls.remove(id) else {
			return Err(TransportError::Rejected {
				status: 404,
				reason: format!("No search context found for id [{id}]"),
				failures: Vec::new(),
			});
		};
		let hits = self.page(scroll.position, scroll.size);
		let next = self.open_scroll(state, scroll.position + scroll.size, scroll.size);

		Ok(BackendResponse {
			took_ms: 1,
			total_hits: self.corpus as u64,
			hits,
			scroll_id: Some(next),
			shard_failures: self.highlight_failures(false),
			aggregations: None,
		})
	}

	fn open_scroll(&self, state: &mut State, position: usize, size: usize) -> String {
		state.next_scroll += 1;

		let id = scroll_id(state.next_scroll);

		state.scrolls.insert(id.clone(), ScrollState { position, size });

		id
	}

	fn total_hits(&self, request: &SearchRequest) -> u64 {
		match request.track_total_hits() {
			quarry_engine::TrackTotalHits::Accurate => self.corpus as u64,
			quarry_engine::TrackTotalHits::UpTo(cap) => (self.corpus as u64).min(u64::from(cap)),
		}
	}
}
impl TransportClient for PagedBackend {
	fn search<'a>(
		&'a self,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, quarry_transport::Result<BackendResponse>> {
		let mut state = self.lock();

		state.calls.push(Call::Search {
			index: request.index().to_string(),
			body: request.body(),
			scroll_ttl: request.scroll_ttl(),
		});

		let result = self.respond(&mut state, request);

		Box::pin(async move { result })
	}

	fn scroll<'a>(
		&'a self,
		scroll_id: &'a str,
		ttl: Duration,
	) -> BoxFuture<'a, quarry_transport::Result<BackendResponse>> {
		let mut state = self.lock();

		state.calls.push(Call::Scroll { scroll_id: scroll_id.to_string(), ttl });

		let result = self.continue_scroll(&mut state, scroll_id);

		Box::pin(async move { result })
	}

	fn clear_scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, quarry_transport::Result<()>> {
		let mut state = self.lock();

		state.calls.push(Call::ClearScroll { scroll_id: scroll_id.to_string() });
		state.scrolls.remove(scroll_id);

		let result = if self.failing_clear {
			Err(TransportError::Unavailable { message: "clear scroll timed out".to_string() })
		} else {
			Ok(())
		};

		Box::pin(async move { result })
	}
}

/// Counts permission filter applications and delegates to [`AuthorityPermissionComposer`].
pub struct SpyPermissions {
	inner: AuthorityPermissionComposer,
	calls: Arc<AtomicUsize>,
}
impl SpyPermissions {
	pub fn new(principal: Principal) -> Self {
		Self {
			inner: AuthorityPermissionComposer::new(principal),
			calls: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl PermissionComposer for SpyPermissions {
	fn with_permission_filter(
		&self,
		query: QueryTree,
		include_groups_for_role_admin: bool,
	) -> quarry_engine::Result<QueryTree> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		self.inner.with_permission_filter(query, include_groups_for_role_admin)
	}
}

pub fn alice() -> Principal {
	Principal {
		user: "alice".to_string(),
		authorities: vec!["GROUP_EVERYONE".to_string()],
		is_admin: false,
	}
}

pub fn settings() -> EngineSettings {
	EngineSettings { archive_index: Some("archive".to_string()), ..EngineSettings::new("alfresco") }
}

pub fn collaborators(permissions: Arc<dyn PermissionComposer>) -> Collaborators {
	Collaborators::new(
		Arc::new(QueryStringBuilder::default()),
		Arc::new(DefaultFilterComposer),
		permissions,
		Arc::new(HitMaterializer),
	)
}

pub fn doc_id(n: usize) -> String {
	format!("doc-{n:05}")
}

fn scroll_id(n: usize) -> String {
	format!("scroll-{n}")
}

fn window_rejection(requested: usize, result_window: usize) -> TransportError {
	TransportError::Rejected {
		status: 400,
		reason: "all shards failed".to_string(),
		failures: vec![ShardFailure {
			index: Some("alfresco".to_string()),
			shard: Some(0),
			node: Some("node-1".to_string()),
			kind: Some("illegal_argument_exception".to_string()),
			reason: format!(
				"Result window is too large, from + size must be less than or equal to: [{result_window}] but was [{requested}]. See the scroll api for a more efficient way to request large data sets."
			),
		}],
	}
}
