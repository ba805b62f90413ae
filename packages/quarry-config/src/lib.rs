mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Backend, Config, Search, Service};

use std::{fs, path::Path};

const MIN_SCROLL_TTL_MS: u64 = 1_000;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.log_level", &cfg.service.log_level),
		("backend.url", &cfg.backend.url),
		("backend.index", &cfg.backend.index),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if !cfg.backend.url.starts_with("http://") && !cfg.backend.url.starts_with("https://") {
		return Err(Error::Validation {
			message: "backend.url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.backend.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "backend.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &cfg.backend.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("backend.default_headers.{key} must be a string."),
			});
		}
	}

	validate_search(&cfg.search)
}

pub fn validate_search(search: &Search) -> Result<()> {
	if search.max_result_window == 0 {
		return Err(Error::Validation {
			message: "search.max_result_window must be greater than zero.".to_string(),
		});
	}
	if search.scroll_batch_size == 0 {
		return Err(Error::Validation {
			message: "search.scroll_batch_size must be greater than zero.".to_string(),
		});
	}
	if search.scroll_batch_size > search.max_result_window {
		return Err(Error::Validation {
			message: "search.scroll_batch_size must not exceed search.max_result_window."
				.to_string(),
		});
	}
	if search.scroll_ttl_ms < MIN_SCROLL_TTL_MS {
		return Err(Error::Validation {
			message: "search.scroll_ttl_ms must be at least 1000.".to_string(),
		});
	}
	if search.track_total_hits_cap == 0 {
		return Err(Error::Validation {
			message: "search.track_total_hits_cap must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.backend.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.backend.api_key = None;
	}
	if cfg.backend.archive_index.as_deref().map(|index| index.trim().is_empty()).unwrap_or(false) {
		cfg.backend.archive_index = None;
	}

	cfg.backend.url = cfg.backend.url.trim_end_matches('/').to_string();
}
