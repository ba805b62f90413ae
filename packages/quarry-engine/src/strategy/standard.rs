use std::time::Instant;

use crate::{
	MaterializeArgs, Result, ResultSet, SearchEngine,
	query::FilteredQuery,
	request::{self, Page},
	spec::SearchSpec,
	strategy, validate,
};

/// Issues exactly one request. Failures surface unchanged; retrying is the executor's job.
pub(crate) async fn run(
	engine: &SearchEngine,
	spec: &SearchSpec,
	query: &FilteredQuery,
) -> Result<ResultSet> {
	let started = Instant::now();
	let limit = strategy::effective_limit(spec, engine.settings.max_result_window);
	let request = request::build_request(&engine.settings, spec, query, Page::Offset {
		from: spec.skip_count,
		size: limit,
	})?;
	let response = engine.transport.search(&request).await?;

	validate::validate(&response)?;

	let mut hits = response.hits;

	hits.truncate(limit as usize);

	engine.collaborators.materializer.build(MaterializeArgs {
		spec,
		hits,
		total_hits: response.total_hits,
		elapsed_ms: started.elapsed().as_millis() as u64,
		aggregations: response.aggregations,
	})
}
