use std::path::{Path, PathBuf};

const CONFIG_NAME: &str = "megaplan.config";

/// Persisted connection settings, a small JSON document in the home
/// directory. Every key is optional; command line flags win over it.
#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	pub server: Option<String>,
	pub username: Option<String>,
	pub password: Option<String>,
	pub project_filter_id: Option<i64>,
}

impl Config {
	pub fn default_path() -> PathBuf {
		let home = std::env::var_os("HOME")
			.or_else(|| std::env::var_os("USERPROFILE"))
			.map(PathBuf::from)
			.unwrap_or_default();
		home.join(CONFIG_NAME)
	}

	/// A missing or unreadable config file is not an error, just an empty
	/// config; the missing values get prompted for.
	pub fn load(path: impl AsRef<Path>) -> Self {
		let path = path.as_ref();
		let data = match std::fs::read_to_string(path) {
			Ok(data) => data,
			Err(e) => {
				log::debug!("no configuration loaded from {}: {}", path.display(), e);
				return Self::default();
			},
		};
		match serde_json::from_str(&data) {
			Ok(config) => config,
			Err(e) => {
				log::warn!("ignoring malformed configuration file {}: {}", path.display(), e);
				Self::default()
			},
		}
	}
}
