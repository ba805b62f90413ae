use std::{
	fmt::{Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

pub const WORKSPACE_PROTOCOL: &str = "workspace";
pub const ARCHIVE_PROTOCOL: &str = "archive";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLanguage {
	#[default]
	Fts,
	Lucene,
	Cmis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
	#[default]
	Or,
	And,
}
impl Operator {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Or => "OR",
			Self::And => "AND",
		}
	}
}

/// A logical store, written `protocol://identifier` (e.g. `workspace://SpacesStore`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreRef {
	pub protocol: String,
	pub identifier: String,
}
impl StoreRef {
	pub fn new(protocol: impl Into<String>, identifier: impl Into<String>) -> Self {
		Self { protocol: protocol.into(), identifier: identifier.into() }
	}

	pub fn workspace() -> Self {
		Self::new(WORKSPACE_PROTOCOL, "SpacesStore")
	}
}
impl Display for StoreRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}://{}", self.protocol, self.identifier)
	}
}
impl FromStr for StoreRef {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let Some((protocol, identifier)) = raw.trim().split_once("://") else {
			return Err(Error::query(format!("Store reference '{raw}' must be protocol://identifier.")));
		};

		if protocol.is_empty() || identifier.is_empty() {
			return Err(Error::query(format!("Store reference '{raw}' must be protocol://identifier.")));
		}

		Ok(Self::new(protocol, identifier))
	}
}
impl TryFrom<String> for StoreRef {
	type Error = Error;

	fn try_from(raw: String) -> Result<Self, Self::Error> {
		raw.parse()
	}
}
impl From<StoreRef> for String {
	fn from(store: StoreRef) -> Self {
		store.to_string()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "field", rename_all = "snake_case")]
pub enum SortKind {
	Field(String),
	Score,
	Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDefinition {
	pub kind: SortKind,
	pub ascending: bool,
}
impl SortDefinition {
	pub fn field(field: impl Into<String>, ascending: bool) -> Self {
		Self { kind: SortKind::Field(field.into()), ascending }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFacet {
	pub field: String,
	#[serde(default = "default_facet_limit")]
	pub limit: u32,
	#[serde(default = "default_facet_min_count")]
	pub min_count: u32,
	pub prefix: Option<String>,
}
impl FieldFacet {
	pub fn new(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			limit: default_facet_limit(),
			min_count: default_facet_min_count(),
			prefix: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightField {
	pub field: String,
	pub fragment_size: Option<u32>,
	pub snippet_count: Option<u32>,
}
impl HighlightField {
	pub fn new(field: impl Into<String>) -> Self {
		Self { field: field.into(), fragment_size: None, snippet_count: None }
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpec {
	pub fields: Vec<HighlightField>,
	pub prefix: Option<String>,
	pub postfix: Option<String>,
	pub fragment_size: Option<u32>,
	pub snippet_count: Option<u32>,
}

/// A caller's search request. Read-only for one execution; the highlight retry works on a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpec {
	pub query: String,
	#[serde(default)]
	pub language: QueryLanguage,
	#[serde(default)]
	pub stores: Vec<StoreRef>,
	#[serde(default)]
	pub skip_count: u32,
	/// `None` means unbounded.
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub sort: Vec<SortDefinition>,
	#[serde(default)]
	pub field_facets: Vec<FieldFacet>,
	#[serde(default)]
	pub facet_queries: Vec<String>,
	#[serde(default)]
	pub filter_queries: Vec<String>,
	#[serde(default)]
	pub highlight: Option<HighlightSpec>,
	/// `-1` or anything at or above the accurate sentinel counts exactly; `0` or unset uses the
	/// configured cap.
	#[serde(default)]
	pub track_total_hits: Option<i64>,
	#[serde(default)]
	pub default_operator: Operator,
}
impl SearchSpec {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}

	pub fn has_facets(&self) -> bool {
		!self.field_facets.is_empty() || !self.facet_queries.is_empty()
	}

	pub fn without_highlight(&self) -> Self {
		Self { highlight: None, ..self.clone() }
	}

	pub fn with_query(&self, query: impl Into<String>) -> Self {
		Self { query: query.into(), ..self.clone() }
	}
}

fn default_facet_limit() -> u32 {
	100
}

fn default_facet_min_count() -> u32 {
	1
}
