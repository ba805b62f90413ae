use std::time::Instant;

use crate::{
	Result, ResultSet, SearchEngine,
	query::{FilteredQuery, QueryTree},
	spec::SearchSpec,
	strategy::{self, Strategy, scroll, standard},
};

impl SearchEngine {
	/// Runs `spec` against the backend. A highlighting offset failure is retried once without
	/// highlighting; every other failure propagates.
	pub async fn execute_query(&self, spec: &SearchSpec) -> Result<ResultSet> {
		match self.execute_once(spec).await {
			Err(err) if err.is_highlight_offset_exceeded() && spec.highlight.is_some() => {
				tracing::warn!(
					error = %err,
					"Highlighting exceeded the analyzed offset limit. Retrying without highlighting."
				);

				self.execute_once(&spec.without_highlight()).await
			},
			result => result,
		}
	}

	async fn execute_once(&self, spec: &SearchSpec) -> Result<ResultSet> {
		let started = Instant::now();
		let query = self.collaborators.query_builder.build(spec)?;

		if query.is_empty() {
			tracing::debug!("Query is empty. Returning an empty result set.");

			return Ok(ResultSet::empty(started.elapsed().as_millis() as u64));
		}

		let filtered = self.filtered_query(query, spec)?;
		let strategy = strategy::select(spec, self.settings.max_result_window);

		tracing::debug!(
			?strategy,
			skip_count = spec.skip_count,
			limit = ?spec.limit,
			facets = spec.has_facets(),
			"Selected search strategy."
		);

		match strategy {
			Strategy::Standard => standard::run(self, spec, &filtered).await,
			Strategy::Scroll => scroll::run(self, spec, &filtered).await,
		}
	}

	/// The only way to obtain a [`FilteredQuery`], so no request skips the permission filter.
	fn filtered_query(&self, query: QueryTree, spec: &SearchSpec) -> Result<FilteredQuery> {
		let collaborators = &self.collaborators;
		let tree =
			collaborators.filter_composer.with_filters(query, spec, collaborators.query_builder.as_ref())?;
		let tree = collaborators
			.permission_composer
			.with_permission_filter(tree, self.settings.include_groups_for_role_admin)?;

		Ok(FilteredQuery::new(tree))
	}
}
