use quarry_transport::{BackendResponse, ShardFailure};

use crate::{Error, Result};

const HIGHLIGHT_OFFSET_SIGNATURES: [&str; 2] =
	["index.highlight.max_analyzed_offset", "maximum allowed to be analyzed for highlighting"];

/// Fails when the response reports shard failures. A missing or empty failure list is success.
pub fn validate(response: &BackendResponse) -> Result<()> {
	match response.shard_failures.as_deref() {
		None | Some([]) => Ok(()),
		Some(failures) => Err(classify_failures(failures)),
	}
}

/// Logs every failure. The first highlighting failure decides the classification.
pub fn classify_failures(failures: &[ShardFailure]) -> Error {
	for failure in failures {
		tracing::warn!(
			index = failure.index.as_deref().unwrap_or("-"),
			shard = ?failure.shard,
			node = failure.node.as_deref().unwrap_or("-"),
			kind = failure.kind.as_deref().unwrap_or("-"),
			reason = %failure.reason,
			"Backend shard failure."
		);
	}

	if let Some(failure) = failures.iter().find(|failure| is_highlight_offset_failure(&failure.reason))
	{
		return Error::HighlightOffsetExceeded { reason: failure.reason.clone() };
	}

	Error::BackendShardFailure {
		reasons: failures.iter().map(|failure| failure.reason.clone()).collect(),
	}
}

fn is_highlight_offset_failure(reason: &str) -> bool {
	HIGHLIGHT_OFFSET_SIGNATURES.iter().any(|signature| reason.contains(signature))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn failure(reason: &str) -> ShardFailure {
		ShardFailure {
			index: Some("alfresco".to_string()),
			shard: Some(0),
			node: None,
			kind: Some("illegal_argument_exception".to_string()),
			reason: reason.to_string(),
		}
	}

	const HIGHLIGHT_REASON: &str = "The length [1000001] of field [cm:content] in doc[12]/index[alfresco] exceeds the [index.highlight.max_analyzed_offset] limit [1000000].";

	#[test]
	fn missing_or_empty_failures_pass() {
		assert!(validate(&BackendResponse::default()).is_ok());
		assert!(
			validate(&BackendResponse { shard_failures: Some(Vec::new()), ..Default::default() })
				.is_ok()
		);
	}

	#[test]
	fn highlight_failure_is_classified() {
		let response = BackendResponse {
			shard_failures: Some(vec![failure("circuit breaker tripped"), failure(HIGHLIGHT_REASON)]),
			..Default::default()
		};
		let err = validate(&response).expect_err("Expected a classified failure.");

		assert!(err.is_highlight_offset_exceeded());

		let Error::HighlightOffsetExceeded { reason } = err else {
			panic!("Unexpected error: {err}");
		};

		assert_eq!(reason, HIGHLIGHT_REASON);
	}

	#[test]
	fn legacy_highlight_message_is_classified() {
		let err = classify_failures(&[failure(
			"The length of [cm:content] field of [12] doc of [alfresco] index has exceeded [1000000] - maximum allowed to be analyzed for highlighting.",
		)]);

		assert!(matches!(err, Error::HighlightOffsetExceeded { .. }));
	}

	#[test]
	fn other_failures_aggregate_every_reason() {
		let err = classify_failures(&[failure("node disconnected"), failure("shard not available")]);
		let Error::BackendShardFailure { reasons } = err else {
			panic!("Unexpected error: {err}");
		};

		assert_eq!(reasons, vec!["node disconnected", "shard not available"]);
	}
}
