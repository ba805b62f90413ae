pub mod scroll;
pub mod standard;

use crate::spec::SearchSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
	/// One bounded request with `from`/`size`.
	Standard,
	/// A scroll context drained page by page, for windows the backend rejects.
	Scroll,
}

/// Facets always force a single request since buckets cannot be merged across scroll pages.
pub fn select(spec: &SearchSpec, max_result_window: u32) -> Strategy {
	if spec.has_facets() {
		return Strategy::Standard;
	}

	let requested = u64::from(spec.skip_count) + u64::from(effective_limit(spec, max_result_window));

	if requested > u64::from(max_result_window) { Strategy::Scroll } else { Strategy::Standard }
}

/// An unbounded limit means one full result window.
pub fn effective_limit(spec: &SearchSpec, max_result_window: u32) -> u32 {
	spec.limit.unwrap_or(max_result_window)
}
