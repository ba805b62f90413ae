use std::{fs, path::PathBuf};

use clap::{Parser, ValueEnum};
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use quarry_config::Config;
use quarry_engine::{
	Collaborators, FieldFacet, HighlightField, HighlightSpec, Operator, Principal, QueryLanguage,
	ResultSet, SearchEngine, SearchSpec, SortDefinition, SortKind, StoreRef,
};

#[derive(Debug, Parser)]
#[command(
	version = quarry_cli::VERSION,
	rename_all = "kebab",
	styles = quarry_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'q', value_name = "TEXT", required_unless_present = "spec")]
	pub query: Option<String>,
	/// A JSON-encoded search spec used instead of the query flags.
	#[arg(long, value_name = "FILE", conflicts_with = "query")]
	pub spec: Option<PathBuf>,
	#[arg(long, value_enum, default_value_t = Language::Fts)]
	pub language: Language,
	#[arg(long, value_name = "PROTOCOL://ID")]
	pub store: Vec<StoreRef>,
	#[arg(long, value_name = "N", default_value_t = 0)]
	pub skip: u32,
	#[arg(long, value_name = "N")]
	pub limit: Option<u32>,
	/// `field[:asc|desc]`; `score` and `doc` sort by relevance and index order.
	#[arg(long, value_name = "SORT", value_parser = parse_sort)]
	pub sort: Vec<SortDefinition>,
	#[arg(long, value_name = "FIELD")]
	pub facet_field: Vec<String>,
	#[arg(long, value_name = "QUERY")]
	pub facet_query: Vec<String>,
	#[arg(long, value_name = "QUERY")]
	pub filter_query: Vec<String>,
	#[arg(long, value_name = "FIELD")]
	pub highlight_field: Vec<String>,
	#[arg(long, value_name = "N", allow_negative_numbers = true)]
	pub track_total_hits: Option<i64>,
	/// Join query terms with AND instead of OR.
	#[arg(long)]
	pub and: bool,
	#[arg(long, short = 'u', value_name = "USER")]
	pub user: String,
	#[arg(long, value_name = "AUTHORITY")]
	pub authority: Vec<String>,
	#[arg(long)]
	pub admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Language {
	Fts,
	Lucene,
}
impl From<Language> for QueryLanguage {
	fn from(language: Language) -> Self {
		match language {
			Language::Fts => Self::Fts,
			Language::Lucene => Self::Lucene,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = quarry_config::load(&args.config)?;
	init_tracing(&config)?;
	let result = search(&args, &config).await?;
	println!("{}", serde_json::to_string_pretty(&result)?);
	Ok(())
}

pub async fn search(args: &Args, config: &Config) -> color_eyre::Result<ResultSet> {
	let spec = build_spec(args)?;
	let engine = SearchEngine::new(config, Collaborators::for_principal(principal(args)))?;

	tracing::info!(
		user = %args.user,
		skip_count = spec.skip_count,
		limit = ?spec.limit,
		"Executing search."
	);

	Ok(engine.execute_query(&spec).await?)
}

pub fn build_spec(args: &Args) -> color_eyre::Result<SearchSpec> {
	if let Some(path) = &args.spec {
		let raw = fs::read_to_string(path)?;

		return Ok(serde_json::from_str(&raw)?);
	}

	let Some(query) = &args.query else {
		return Err(eyre::eyre!("Either --query or --spec is required."));
	};
	let highlight = (!args.highlight_field.is_empty()).then(|| HighlightSpec {
		fields: args.highlight_field.iter().map(HighlightField::new).collect(),
		..Default::default()
	});

	Ok(SearchSpec {
		query: query.clone(),
		language: args.language.into(),
		stores: args.store.clone(),
		skip_count: args.skip,
		limit: args.limit,
		sort: args.sort.clone(),
		field_facets: args.facet_field.iter().map(FieldFacet::new).collect(),
		facet_queries: args.facet_query.clone(),
		filter_queries: args.filter_query.clone(),
		highlight,
		track_total_hits: args.track_total_hits,
		default_operator: if args.and { Operator::And } else { Operator::Or },
	})
}

pub fn principal(args: &Args) -> Principal {
	Principal { user: args.user.clone(), authorities: args.authority.clone(), is_admin: args.admin }
}

pub fn parse_sort(raw: &str) -> Result<SortDefinition, String> {
	let (field, ascending) = match raw.rsplit_once(':') {
		Some((field, "asc")) => (field, true),
		Some((field, "desc")) => (field, false),
		_ => (raw, true),
	};
	let kind = match field.trim() {
		"" => return Err("Sort field must not be empty.".to_string()),
		"score" | "_score" => SortKind::Score,
		"doc" | "_doc" => SortKind::Document,
		field => SortKind::Field(field.to_string()),
	};

	Ok(SortDefinition { kind, ascending })
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).init();
	Ok(())
}
