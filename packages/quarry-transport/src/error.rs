use crate::ShardFailure;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Backend unavailable: {message}")]
	Unavailable { message: String },
	#[error("Backend request timed out: {message}")]
	Timeout { message: String },
	#[error("Backend rejected the request with status {status}: {reason}")]
	Rejected { status: u16, reason: String, failures: Vec<ShardFailure> },
	#[error(transparent)]
	Reqwest(reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		if err.is_connect() {
			return Self::Unavailable { message: err.to_string() };
		}
		if err.is_timeout() {
			return Self::Timeout { message: err.to_string() };
		}

		Self::Reqwest(err)
	}
}
