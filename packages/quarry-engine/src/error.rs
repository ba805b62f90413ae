use quarry_transport::Error as TransportError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid query: {message}")]
	Query { message: String },
	#[error("Backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Backend shard failure: {}", .reasons.join("; "))]
	BackendShardFailure { reasons: Vec<String> },
	#[error("Highlighting exceeded the analyzed offset limit: {reason}")]
	HighlightOffsetExceeded { reason: String },
	#[error("Scroll execution failed: {source}")]
	ScrollExecution { source: Box<Error> },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("Collaborator error: {message}")]
	Collaborator { message: String },
}
impl Error {
	/// True for the one failure that is recovered by retrying without highlighting, including when
	/// it surfaced mid-scroll.
	pub fn is_highlight_offset_exceeded(&self) -> bool {
		match self {
			Self::HighlightOffsetExceeded { .. } => true,
			Self::ScrollExecution { source } => source.is_highlight_offset_exceeded(),
			_ => false,
		}
	}

	pub(crate) fn query(message: impl Into<String>) -> Self {
		Self::Query { message: message.into() }
	}
}

impl From<TransportError> for Error {
	fn from(err: TransportError) -> Self {
		match err {
			TransportError::Unavailable { message } => Self::BackendUnavailable { message },
			TransportError::Rejected { failures, .. } if !failures.is_empty() => {
				crate::validate::classify_failures(&failures)
			},
			other => Self::Backend { message: other.to_string() },
		}
	}
}
