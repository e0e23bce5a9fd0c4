//! `oat` (OAuth token): prints an access token for a client from `~/.oatconfig`.
//!
//! ```text
//! curl -H "Authorization: Bearer $(oat -c myclient -n)" https://api.example.com/
//! ```

mod config;

// std
use std::{
	io::{self, Write},
	path::PathBuf,
};
// crates.io
use clap::Parser;
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use oauth2_tracker::{
	auth::{Credentials, ScopeList},
	tracker::{GrantFlow, TokenTracker, parse_endpoint},
};
use tracing_subscriber::EnvFilter;
// self
use config::OatConfig;

/// Fetch OAuth 2.0 access tokens for API calls.
///
/// Without a user, the client credentials grant obtains a token on behalf of the client.
/// With `-u` (or `--username` and `--password`), the password grant obtains a token for
/// that user instead.
#[derive(Debug, Parser)]
#[command(name = "oat", version, about, long_about)]
struct Cli {
	/// Client (by name) from the config file. Defaults to the first client by name.
	#[arg(short = 'c', long = "client", value_name = "NAME")]
	client: Option<String>,
	/// User (by name) from the config file.
	#[arg(short = 'u', long = "user", value_name = "NAME", conflicts_with = "username")]
	user: Option<String>,
	/// Username for the password grant.
	#[arg(long, requires = "password")]
	username: Option<String>,
	/// Password for the password grant.
	#[arg(long, requires = "username")]
	password: Option<String>,
	/// Print the token without a trailing newline.
	#[arg(short = 'n', long = "no-newline")]
	no_newline: bool,
	/// Print the token information JSON instead of the token.
	#[arg(long = "ti")]
	token_info: bool,
	/// Config file to read instead of `~/.oatconfig`.
	#[arg(long, env = "OAT_CONFIG", value_name = "PATH")]
	config: Option<PathBuf>,
	/// Log exchanges to stderr.
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();

	init_tracing(cli.verbose);

	let output = run(&cli).await?;
	let mut stdout = io::stdout().lock();

	if cli.no_newline {
		write!(stdout, "{output}")?;
	} else {
		writeln!(stdout, "{output}")?;
	}

	stdout.flush()?;

	Ok(())
}

fn init_tracing(verbose: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(if verbose { "oat=debug,oauth2_tracker=debug" } else { "warn" })
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

async fn run(cli: &Cli) -> Result<String> {
	let path = match &cli.config {
		Some(path) => path.clone(),
		None => OatConfig::default_path()
			.ok_or_eyre("Cannot locate the home directory; pass --config.")?,
	};
	let config = OatConfig::load(&path)?;
	let (name, client) = config.client(cli.client.as_deref())?;
	let flow = match (&cli.user, &cli.username, &cli.password) {
		(Some(user), _, _) => {
			let user = config.user(user)?;

			GrantFlow::password(&user.username, user.password.as_str())
		},
		(None, Some(username), Some(password)) => GrantFlow::password(username, password.as_str()),
		_ => GrantFlow::ClientCredentials,
	};
	let scope = client
		.scope
		.parse::<ScopeList>()
		.wrap_err_with(|| format!("Client {name:?} has an invalid scope."))?;
	let credentials = Credentials::new(&client.client_id, client.client_secret.as_str(), scope);
	let mut builder = TokenTracker::builder(
		parse_endpoint("token", &client.token_endpoint)?,
		credentials,
		flow,
	);

	if let Some(endpoint) = &client.token_info_endpoint {
		builder = builder.introspection_endpoint(parse_endpoint("introspection", endpoint)?);
	}

	let tracker = builder.build()?;

	tracing::debug!(client = name, grant = %tracker.grant_type(), "Requesting access token.");

	let token = tracker.get_token().await?;

	if cli.token_info {
		let info = tracker.get_token_information().await?;

		return Ok(serde_json::to_string_pretty(info.as_map())?);
	}

	Ok(token.expose().to_owned())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn user_flags_select_the_password_grant() {
		let cli = Cli::try_parse_from(["oat", "-c", "a", "--username", "u", "--password", "p", "-n"])
			.expect("Flags should parse.");

		assert_eq!(cli.client.as_deref(), Some("a"));
		assert!(cli.no_newline);
		assert!(!cli.token_info);
		assert!(Cli::try_parse_from(["oat", "--username", "u"]).is_err());
		assert!(Cli::try_parse_from(["oat", "-u", "bob", "--username", "u", "--password", "p"]).is_err());
	}
}
