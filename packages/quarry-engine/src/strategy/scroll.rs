use std::time::Instant;

use quarry_transport::Hit;

use crate::{
	Error, MaterializeArgs, Result, ResultSet, SearchEngine, TransportClient,
	query::FilteredQuery,
	request::{self, Page, SearchRequest},
	spec::SearchSpec,
	strategy, validate,
};

/// Emulates `skip + limit` across scroll pages, since a scroll cannot be offset.
#[derive(Debug)]
pub(crate) struct Accumulator {
	remaining_skip: usize,
	limit: usize,
	rows: Vec<Hit>,
}
impl Accumulator {
	pub(crate) fn new(skip_count: u32, limit: u32) -> Self {
		Self { remaining_skip: skip_count as usize, limit: limit as usize, rows: Vec::new() }
	}

	pub(crate) fn push(&mut self, hits: Vec<Hit>) {
		let skipped = self.remaining_skip.min(hits.len());
		let room = self.limit.saturating_sub(self.rows.len());

		self.remaining_skip -= skipped;
		self.rows.extend(hits.into_iter().skip(skipped).take(room));
	}

	pub(crate) fn is_full(&self) -> bool {
		self.rows.len() >= self.limit
	}

	pub(crate) fn len(&self) -> usize {
		self.rows.len()
	}

	pub(crate) fn into_rows(self) -> Vec<Hit> {
		self.rows
	}
}

/// Remembers the last scroll id the backend issued so the context can be released once.
#[derive(Debug, Default)]
struct ScrollCursor {
	last_id: Option<String>,
}
impl ScrollCursor {
	fn observe(&mut self, scroll_id: Option<&str>) {
		if let Some(id) = scroll_id {
			self.last_id = Some(id.to_string());
		}
	}

	async fn release(self, transport: &dyn TransportClient) {
		let Some(scroll_id) = self.last_id else {
			return;
		};

		if let Err(err) = transport.clear_scroll(&scroll_id).await {
			tracing::warn!(error = %err, scroll_id = %scroll_id, "Failed to release scroll context.");
		}
	}
}

struct Drained {
	hits: Vec<Hit>,
	total_hits: u64,
}

pub(crate) async fn run(
	engine: &SearchEngine,
	spec: &SearchSpec,
	query: &FilteredQuery,
) -> Result<ResultSet> {
	let started = Instant::now();
	let limit = strategy::effective_limit(spec, engine.settings.max_result_window);
	let request = request::build_request(&engine.settings, spec, query, Page::Scroll {
		size: engine.settings.scroll_batch_size,
		ttl: engine.settings.scroll_ttl,
	})?;
	let mut cursor = ScrollCursor::default();
	let drained = drain(engine, &request, Accumulator::new(spec.skip_count, limit), &mut cursor).await;

	cursor.release(engine.transport.as_ref()).await;

	let drained = drained.map_err(|err| Error::ScrollExecution { source: Box::new(err) })?;

	engine.collaborators.materializer.build(MaterializeArgs {
		spec,
		hits: drained.hits,
		total_hits: drained.total_hits,
		elapsed_ms: started.elapsed().as_millis() as u64,
		aggregations: None,
	})
}

async fn drain(
	engine: &SearchEngine,
	request: &SearchRequest,
	mut accumulator: Accumulator,
	cursor: &mut ScrollCursor,
) -> Result<Drained> {
	let ttl = engine.settings.scroll_ttl;
	let mut response = engine.transport.search(request).await?;
	let mut page = 1_usize;

	loop {
		cursor.observe(response.scroll_id.as_deref());
		validate::validate(&response)?;

		let received = response.hits.len();
		let total_hits = response.total_hits;

		accumulator.push(response.hits);

		tracing::debug!(page, received, accumulated = accumulator.len(), "Consumed scroll page.");

		let next_id = match response.scroll_id {
			Some(id) if received > 0 && !accumulator.is_full() => id,
			_ => return Ok(Drained { hits: accumulator.into_rows(), total_hits }),
		};

		response = engine.transport.scroll(&next_id, ttl).await?;
		page += 1;
	}
}
