//! `~/.oatconfig` loading.

// std
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};
// crates.io
use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use serde::Deserialize;

/// Named clients and users.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OatConfig {
	/// OAuth clients keyed by the name passed to `-c`.
	#[serde(default)]
	pub clients: BTreeMap<String, ClientConfig>,
	/// Resource owners keyed by the name passed to `-u`.
	#[serde(default)]
	pub users: BTreeMap<String, UserConfig>,
}
impl OatConfig {
	/// Config file name inside the home directory.
	pub const FILE_NAME: &'static str = ".oatconfig";

	/// `~/.oatconfig`, when the home directory is known.
	pub fn default_path() -> Option<PathBuf> {
		dirs::home_dir().map(|home| home.join(Self::FILE_NAME))
	}

	/// Reads and parses the config file at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.wrap_err_with(|| format!("Failed to read config file {}.", path.display()))?;

		raw.parse()
	}

	/// Looks up `name`, or the first client by name when none is given.
	pub fn client(&self, name: Option<&str>) -> Result<(&str, &ClientConfig)> {
		match name {
			Some(name) => self
				.clients
				.get_key_value(name)
				.map(|(name, client)| (name.as_str(), client))
				.ok_or_else(|| eyre!("Client {name:?} is not defined in the config file.")),
			None => self
				.clients
				.iter()
				.next()
				.map(|(name, client)| (name.as_str(), client))
				.ok_or_eyre("No client is defined in the config file."),
		}
	}

	/// Looks up the user called `name`.
	pub fn user(&self, name: &str) -> Result<&UserConfig> {
		self.users.get(name).ok_or_else(|| eyre!("User {name:?} is not defined in the config file."))
	}
}
impl std::str::FromStr for OatConfig {
	type Err = color_eyre::Report;

	fn from_str(raw: &str) -> Result<Self> {
		toml::from_str(raw).wrap_err("Config file is not valid TOML.")
	}
}

/// One OAuth client registration.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
	/// Client identifier.
	pub client_id: String,
	/// Client secret.
	pub client_secret: String,
	/// Token endpoint URL.
	pub token_endpoint: String,
	/// Introspection endpoint URL used by `--ti`.
	#[serde(default)]
	pub token_info_endpoint: Option<String>,
	/// Requested scopes, space separated.
	#[serde(default)]
	pub scope: String,
}

/// Resource owner credentials for the password grant.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
	/// Login name.
	pub username: String,
	/// Password.
	pub password: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const SAMPLE: &str = r#"
[clients.zeta]
client_id = "zeta-id"
client_secret = "zeta-secret"
token_endpoint = "https://auth.example.com/token"

[clients.alpha]
client_id = "alpha-id"
client_secret = "alpha-secret"
token_endpoint = "https://auth.example.com/token"
token_info_endpoint = "https://auth.example.com/tokeninfo"
scope = "read write"

[users.bob]
username = "bob"
password = "builder"
"#;

	#[test]
	fn first_client_by_name_is_the_default() {
		let config: OatConfig = SAMPLE.parse().expect("Sample config should parse.");
		let (name, client) = config.client(None).expect("A default client should exist.");

		assert_eq!(name, "alpha");
		assert_eq!(client.scope, "read write");
		assert_eq!(
			client.token_info_endpoint.as_deref(),
			Some("https://auth.example.com/tokeninfo")
		);

		let (_, zeta) = config.client(Some("zeta")).expect("Named client should exist.");

		assert!(zeta.token_info_endpoint.is_none());
		assert!(zeta.scope.is_empty());
		assert_eq!(config.user("bob").expect("User should exist.").password, "builder");
	}

	#[test]
	fn unknown_names_and_empty_configs_are_errors() {
		let config: OatConfig = SAMPLE.parse().expect("Sample config should parse.");

		assert!(config.client(Some("missing")).is_err());
		assert!(config.user("alice").is_err());
		assert!(OatConfig::default().client(None).is_err());
		assert!("[clients.a]\nclient_id = 1".parse::<OatConfig>().is_err());
	}
}
