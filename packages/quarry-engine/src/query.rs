use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::{
	Error, FilterComposer, PermissionComposer, QueryBuilder, Result,
	spec::{QueryLanguage, SearchSpec, StoreRef},
};

pub const DEFAULT_FIELD: &str = "TEXT";
pub const READER_FIELD: &str = "READER";
pub const DENIED_FIELD: &str = "DENIED";
pub const GROUP_PREFIX: &str = "GROUP_";

/// An immutable backend query. `Null` and `{}` are empty trees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryTree(Value);
impl QueryTree {
	pub fn new(value: Value) -> Self {
		Self(value)
	}

	pub fn empty() -> Self {
		Self(Value::Null)
	}

	pub fn match_all() -> Self {
		Self(serde_json::json!({ "match_all": {} }))
	}

	pub fn is_empty(&self) -> bool {
		match &self.0 {
			Value::Null => true,
			Value::Object(map) => map.is_empty(),
			_ => false,
		}
	}

	pub fn as_value(&self) -> &Value {
		&self.0
	}

	/// ANDs `filter` onto this tree as a non-scoring clause.
	pub fn with_filter(self, filter: QueryTree) -> Self {
		Self(serde_json::json!({ "bool": { "must": [self.0], "filter": [filter.0] } }))
	}

	pub fn with_exclusion(self, excluded: QueryTree) -> Self {
		Self(serde_json::json!({ "bool": { "must": [self.0], "must_not": [excluded.0] } }))
	}
}

/// A query that has been through derived filters and the permission filter. Only the executor can
/// produce one, so every backend request carries the permission predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredQuery(QueryTree);
impl FilteredQuery {
	pub(crate) fn new(tree: QueryTree) -> Self {
		Self(tree)
	}

	pub fn as_tree(&self) -> &QueryTree {
		&self.0
	}
}

/// Translates FTS/Lucene query text into a `query_string` query over the default `TEXT` field.
#[derive(Debug, Clone)]
pub struct QueryStringBuilder {
	pub default_field: String,
}
impl QueryStringBuilder {
	fn query_text(&self, spec: &SearchSpec) -> Option<String> {
		let text = strip_store_refs(&spec.query, &spec.stores);
		let text = text.trim();

		if text.is_empty() { None } else { Some(text.to_string()) }
	}
}
impl Default for QueryStringBuilder {
	fn default() -> Self {
		Self { default_field: DEFAULT_FIELD.to_string() }
	}
}
impl QueryBuilder for QueryStringBuilder {
	fn build(&self, spec: &SearchSpec) -> Result<QueryTree> {
		if spec.language == QueryLanguage::Cmis {
			return Err(Error::query("CMIS queries are not supported by the query string builder."));
		}

		let Some(text) = self.query_text(spec) else {
			return Ok(QueryTree::empty());
		};

		Ok(QueryTree::new(serde_json::json!({
			"query_string": {
				"query": text,
				"default_field": self.default_field,
				"default_operator": spec.default_operator.as_str(),
				"allow_leading_wildcard": spec.language == QueryLanguage::Lucene,
			}
		})))
	}

	fn build_default(&self, spec: &SearchSpec) -> Result<QueryTree> {
		let Some(text) = self.query_text(spec) else {
			return Ok(QueryTree::empty());
		};

		Ok(QueryTree::new(serde_json::json!({
			"query_string": { "query": text, "default_field": self.default_field }
		})))
	}
}

/// Compiles each filter query with the fallback builder and ANDs it onto the query.
#[derive(Debug, Clone, Default)]
pub struct DefaultFilterComposer;
impl FilterComposer for DefaultFilterComposer {
	fn with_filters(
		&self,
		query: QueryTree,
		spec: &SearchSpec,
		builder: &dyn QueryBuilder,
	) -> Result<QueryTree> {
		let mut tree = query;

		for filter_query in &spec.filter_queries {
			let filter = builder.build_default(&spec.with_query(filter_query.as_str()))?;

			if filter.is_empty() {
				continue;
			}

			tree = tree.with_filter(filter);
		}

		Ok(tree)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
	pub user: String,
	pub authorities: Vec<String>,
	pub is_admin: bool,
}

/// Restricts results to documents readable by the principal and not denied to it.
#[derive(Debug, Clone)]
pub struct AuthorityPermissionComposer {
	pub principal: Principal,
}
impl AuthorityPermissionComposer {
	pub fn new(principal: Principal) -> Self {
		Self { principal }
	}

	fn effective_authorities(&self, include_groups_for_role_admin: bool) -> Vec<String> {
		let skip_groups = self.principal.is_admin && !include_groups_for_role_admin;
		let mut seen = BTreeSet::new();

		std::iter::once(&self.principal.user)
			.chain(self.principal.authorities.iter())
			.map(|authority| authority.trim())
			.filter(|authority| !authority.is_empty())
			.filter(|authority| !(skip_groups && authority.starts_with(GROUP_PREFIX)))
			.filter(|authority| seen.insert(authority.to_string()))
			.map(str::to_string)
			.collect()
	}
}
impl PermissionComposer for AuthorityPermissionComposer {
	fn with_permission_filter(
		&self,
		query: QueryTree,
		include_groups_for_role_admin: bool,
	) -> Result<QueryTree> {
		if self.principal.user.trim().is_empty() {
			return Err(Error::Collaborator {
				message: "Permission filter requires an authenticated user.".to_string(),
			});
		}

		let authorities = self.effective_authorities(include_groups_for_role_admin);
		let readers = QueryTree::new(serde_json::json!({ "terms": { (READER_FIELD): authorities } }));
		let denied = QueryTree::new(serde_json::json!({ "terms": { (DENIED_FIELD): authorities } }));

		Ok(query.with_filter(readers).with_exclusion(denied))
	}
}

/// Node references are indexed without their store prefix.
fn strip_store_refs(text: &str, stores: &[StoreRef]) -> String {
	let mut out = text.to_string();
	let default_store = [StoreRef::workspace()];
	let stores = if stores.is_empty() { &default_store[..] } else { stores };

	for store in stores {
		out = out.replace(&format!("{store}/"), "");
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_tree_detection() {
		assert!(QueryTree::empty().is_empty());
		assert!(QueryTree::new(serde_json::json!({})).is_empty());
		assert!(!QueryTree::match_all().is_empty());
	}

	#[test]
	fn blank_query_builds_empty_tree() {
		let builder = QueryStringBuilder::default();
		let tree = builder.build(&SearchSpec::new("   ")).expect("build failed");

		assert!(tree.is_empty());
	}

	#[test]
	fn cmis_is_rejected_as_query_error() {
		let builder = QueryStringBuilder::default();
		let mut spec = SearchSpec::new("SELECT * FROM cmis:document");

		spec.language = QueryLanguage::Cmis;

		assert!(matches!(builder.build(&spec), Err(Error::Query { .. })));
	}

	#[test]
	fn store_prefixes_are_stripped_from_node_refs() {
		let builder = QueryStringBuilder::default();
		let spec = SearchSpec::new("PARENT:\"workspace://SpacesStore/abc-123\"");
		let tree = builder.build_default(&spec).expect("build failed");

		assert_eq!(tree.as_value()["query_string"]["query"], "PARENT:\"abc-123\"");
	}

	#[test]
	fn filter_queries_are_anded_as_filters() {
		let builder = QueryStringBuilder::default();
		let mut spec = SearchSpec::new("budget");

		spec.filter_queries = vec!["TYPE:\"cm:content\"".to_string(), " ".to_string()];

		let base = builder.build(&spec).expect("build failed");
		let tree = DefaultFilterComposer
			.with_filters(base.clone(), &spec, &builder)
			.expect("filters failed");
		let value = tree.as_value();

		assert_eq!(value["bool"]["must"][0], *base.as_value());
		assert_eq!(value["bool"]["filter"][0]["query_string"]["query"], "TYPE:\"cm:content\"");
	}

	#[test]
	fn admin_groups_are_left_out_unless_configured() {
		let composer = AuthorityPermissionComposer::new(Principal {
			user: "admin".to_string(),
			authorities: vec![
				"GROUP_EVERYONE".to_string(),
				"ROLE_ADMINISTRATOR".to_string(),
				"admin".to_string(),
			],
			is_admin: true,
		});

		assert_eq!(composer.effective_authorities(false), vec!["admin", "ROLE_ADMINISTRATOR"]);
		assert_eq!(composer.effective_authorities(true), vec![
			"admin",
			"GROUP_EVERYONE",
			"ROLE_ADMINISTRATOR"
		]);
	}

	#[test]
	fn permission_filter_wraps_readers_and_denied() {
		let composer = AuthorityPermissionComposer::new(Principal {
			user: "alice".to_string(),
			authorities: vec!["GROUP_SALES".to_string()],
			is_admin: false,
		});
		let tree = composer
			.with_permission_filter(QueryTree::match_all(), false)
			.expect("permission filter failed");
		let value = tree.as_value();
		let inner = &value["bool"]["must"][0];

		assert_eq!(inner["bool"]["must"][0], serde_json::json!({ "match_all": {} }));
		assert_eq!(
			inner["bool"]["filter"][0]["terms"]["READER"],
			serde_json::json!(["alice", "GROUP_SALES"])
		);
		assert_eq!(
			value["bool"]["must_not"][0]["terms"]["DENIED"],
			serde_json::json!(["alice", "GROUP_SALES"])
		);
	}

	#[test]
	fn anonymous_principal_is_rejected() {
		let composer = AuthorityPermissionComposer::new(Principal::default());

		assert!(matches!(
			composer.with_permission_filter(QueryTree::match_all(), false),
			Err(Error::Collaborator { .. })
		));
	}
}
