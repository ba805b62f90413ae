pub mod response;

mod error;

pub use error::{Error, Result};
pub use response::{BackendResponse, Hit, ShardFailure};

use std::time::Duration;

use reqwest::{
	Client, Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub struct BackendClient {
	client: Client,
	base_url: String,
}
impl BackendClient {
	pub fn new(cfg: &quarry_config::Backend) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
			.build()?;

		Ok(Self { client, base_url: cfg.url.trim_end_matches('/').to_string() })
	}

	pub async fn search(
		&self,
		index: &str,
		body: &Value,
		scroll_ttl: Option<Duration>,
	) -> Result<BackendResponse> {
		let url = format!("{}/{index}/_search", self.base_url);
		let mut request = self.client.post(url).json(body);

		if let Some(ttl) = scroll_ttl {
			request = request.query(&[("scroll", ttl_param(ttl))]);
		}

		let json = read_json(request.send().await?).await?;

		response::parse_search_response(json)
	}

	pub async fn scroll(&self, scroll_id: &str, ttl: Duration) -> Result<BackendResponse> {
		let url = format!("{}/_search/scroll", self.base_url);
		let body = serde_json::json!({ "scroll": ttl_param(ttl), "scroll_id": scroll_id });
		let json = read_json(self.client.post(url).json(&body).send().await?).await?;

		response::parse_search_response(json)
	}

	pub async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
		let url = format!("{}/_search/scroll", self.base_url);
		let body = serde_json::json!({ "scroll_id": [scroll_id] });
		let res = self.client.delete(url).json(&body).send().await?;

		// The context is already gone when the backend answers 404.
		if res.status() == reqwest::StatusCode::NOT_FOUND {
			tracing::debug!(scroll_id, "Scroll context was already released.");

			return Ok(());
		}

		read_json(res).await?;

		Ok(())
	}
}

pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(key) = api_key {
		headers.insert(AUTHORIZATION, format!("ApiKey {key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

fn ttl_param(ttl: Duration) -> String {
	format!("{}ms", ttl.as_millis())
}

async fn read_json(res: Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await?;

		return Err(response::parse_error_body(status.as_u16(), &body));
	}

	Ok(res.json().await?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ttl_is_rendered_in_milliseconds() {
		assert_eq!(ttl_param(Duration::from_secs(60)), "60000ms");
	}
}
