pub mod executor;
pub mod materialize;
pub mod query;
pub mod request;
pub mod spec;
pub mod strategy;
pub mod validate;

mod error;

pub use error::{Error, Result};
pub use materialize::{
	FacetQueryResult, FacetResults, FieldFacetResult, HitMaterializer, MaterializeArgs, ResultRow,
	ResultSet,
};
pub use query::{
	AuthorityPermissionComposer, DefaultFilterComposer, FilteredQuery, Principal, QueryStringBuilder,
	QueryTree,
};
pub use request::{Page, SearchRequest, TrackTotalHits};
pub use spec::{
	FieldFacet, HighlightField, HighlightSpec, Operator, QueryLanguage, SearchSpec, SortDefinition,
	SortKind, StoreRef,
};
pub use strategy::Strategy;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use quarry_config::Config;
use quarry_transport::{BackendClient, BackendResponse};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait QueryBuilder
where
	Self: Send + Sync,
{
	fn build(&self, spec: &SearchSpec) -> Result<QueryTree>;

	/// Fallback used when composing filter queries.
	fn build_default(&self, spec: &SearchSpec) -> Result<QueryTree>;
}

pub trait FilterComposer
where
	Self: Send + Sync,
{
	fn with_filters(
		&self,
		query: QueryTree,
		spec: &SearchSpec,
		builder: &dyn QueryBuilder,
	) -> Result<QueryTree>;
}

pub trait PermissionComposer
where
	Self: Send + Sync,
{
	fn with_permission_filter(
		&self,
		query: QueryTree,
		include_groups_for_role_admin: bool,
	) -> Result<QueryTree>;
}

pub trait TransportClient
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, quarry_transport::Result<BackendResponse>>;

	fn scroll<'a>(
		&'a self,
		scroll_id: &'a str,
		ttl: Duration,
	) -> BoxFuture<'a, quarry_transport::Result<BackendResponse>>;

	fn clear_scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, quarry_transport::Result<()>>;
}

pub trait ResultMaterializer
where
	Self: Send + Sync,
{
	fn build(&self, args: MaterializeArgs<'_>) -> Result<ResultSet>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub query_builder: Arc<dyn QueryBuilder>,
	pub filter_composer: Arc<dyn FilterComposer>,
	pub permission_composer: Arc<dyn PermissionComposer>,
	pub materializer: Arc<dyn ResultMaterializer>,
}
impl Collaborators {
	pub fn new(
		query_builder: Arc<dyn QueryBuilder>,
		filter_composer: Arc<dyn FilterComposer>,
		permission_composer: Arc<dyn PermissionComposer>,
		materializer: Arc<dyn ResultMaterializer>,
	) -> Self {
		Self { query_builder, filter_composer, permission_composer, materializer }
	}

	/// Query-string translation, filter composition and reader/denied permissions for `principal`.
	pub fn for_principal(principal: Principal) -> Self {
		Self {
			query_builder: Arc::new(QueryStringBuilder::default()),
			filter_composer: Arc::new(DefaultFilterComposer),
			permission_composer: Arc::new(AuthorityPermissionComposer::new(principal)),
			materializer: Arc::new(HitMaterializer),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
	pub index: String,
	pub archive_index: Option<String>,
	pub max_result_window: u32,
	pub scroll_batch_size: u32,
	pub scroll_ttl: Duration,
	pub track_total_hits_cap: u32,
	pub include_groups_for_role_admin: bool,
}
impl EngineSettings {
	/// Search defaults against a single workspace index.
	pub fn new(index: impl Into<String>) -> Self {
		Self::with_search(index.into(), None, &quarry_config::Search::default())
	}

	pub fn from_config(cfg: &Config) -> Self {
		Self::with_search(cfg.backend.index.clone(), cfg.backend.archive_index.clone(), &cfg.search)
	}

	fn with_search(
		index: String,
		archive_index: Option<String>,
		search: &quarry_config::Search,
	) -> Self {
		Self {
			index,
			archive_index,
			max_result_window: search.max_result_window,
			scroll_batch_size: search.scroll_batch_size,
			scroll_ttl: search.scroll_ttl(),
			track_total_hits_cap: search.track_total_hits_cap,
			include_groups_for_role_admin: search.include_groups_for_role_admin,
		}
	}
}

pub struct SearchEngine {
	pub settings: EngineSettings,
	pub transport: Arc<dyn TransportClient>,
	pub collaborators: Collaborators,
}
impl SearchEngine {
	pub fn new(cfg: &Config, collaborators: Collaborators) -> Result<Self> {
		let client = BackendClient::new(&cfg.backend)?;

		Ok(Self::with_transport(EngineSettings::from_config(cfg), Arc::new(client), collaborators))
	}

	pub fn with_transport(
		settings: EngineSettings,
		transport: Arc<dyn TransportClient>,
		collaborators: Collaborators,
	) -> Self {
		Self { settings, transport, collaborators }
	}
}

impl TransportClient for BackendClient {
	fn search<'a>(
		&'a self,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, quarry_transport::Result<BackendResponse>> {
		Box::pin(async move {
			let body = request.body();

			BackendClient::search(self, request.index(), &body, request.scroll_ttl()).await
		})
	}

	fn scroll<'a>(
		&'a self,
		scroll_id: &'a str,
		ttl: Duration,
	) -> BoxFuture<'a, quarry_transport::Result<BackendResponse>> {
		Box::pin(BackendClient::scroll(self, scroll_id, ttl))
	}

	fn clear_scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, quarry_transport::Result<()>> {
		Box::pin(BackendClient::clear_scroll(self, scroll_id))
	}
}
