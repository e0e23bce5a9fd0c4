// self
use crate::{_prelude::*, auth::TokenSecret};

/// OAuth 2.0 grant types a tracker can use to obtain tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Client Credentials grant for app-only tokens.
	ClientCredentials,
	/// Resource Owner Password grant, used once to bootstrap a refresh token.
	Password,
	/// Refresh Token grant.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::Password => "password",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Grant flow a tracker is configured with.
#[derive(Clone, PartialEq, Eq)]
pub enum GrantFlow {
	/// Re-exchange the client credentials on every renewal.
	ClientCredentials,
	/// Exchange the user's password once, then renew through the issued refresh token.
	Password {
		/// Resource owner username.
		username: String,
		/// Resource owner password.
		password: TokenSecret,
	},
	/// Start from a refresh token obtained elsewhere.
	Refresh {
		/// Refresh token to redeem.
		refresh_token: TokenSecret,
	},
}
impl GrantFlow {
	/// Builds a password flow.
	pub fn password(username: impl Into<String>, password: impl Into<TokenSecret>) -> Self {
		Self::Password { username: username.into(), password: password.into() }
	}

	/// Builds a refresh flow seeded with `refresh_token`.
	pub fn refresh(refresh_token: impl Into<TokenSecret>) -> Self {
		Self::Refresh { refresh_token: refresh_token.into() }
	}

	/// Grant type the flow starts with.
	pub fn grant_type(&self) -> GrantType {
		match self {
			Self::ClientCredentials => GrantType::ClientCredentials,
			Self::Password { .. } => GrantType::Password,
			Self::Refresh { .. } => GrantType::RefreshToken,
		}
	}
}
impl Debug for GrantFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ClientCredentials => f.write_str("ClientCredentials"),
			Self::Password { username, .. } => f
				.debug_struct("Password")
				.field("username", username)
				.field("password", &"<redacted>")
				.finish(),
			Self::Refresh { .. } =>
				f.debug_struct("Refresh").field("refresh_token", &"<redacted>").finish(),
		}
	}
}

/// How the next exchange is performed.
///
/// A password flow turns into [`Renewal::RefreshToken`] after its first successful
/// exchange; the password does not survive that transition.
#[derive(Clone)]
pub(crate) enum Renewal {
	ClientCredentials,
	Password { username: String, password: TokenSecret },
	RefreshToken { refresh_token: Option<TokenSecret> },
}
impl Renewal {
	pub(crate) fn grant_type(&self) -> GrantType {
		match self {
			Self::ClientCredentials => GrantType::ClientCredentials,
			Self::Password { .. } => GrantType::Password,
			Self::RefreshToken { .. } => GrantType::RefreshToken,
		}
	}

	pub(crate) fn refresh_token(&self) -> Option<&TokenSecret> {
		match self {
			Self::RefreshToken { refresh_token } => refresh_token.as_ref(),
			_ => None,
		}
	}

	/// State after adopting a token response that carried `issued`.
	pub(crate) fn after_exchange(&self, issued: Option<TokenSecret>) -> Self {
		match self {
			Self::ClientCredentials => Self::ClientCredentials,
			Self::Password { .. } => Self::RefreshToken { refresh_token: issued },
			Self::RefreshToken { refresh_token } =>
				Self::RefreshToken { refresh_token: issued.or_else(|| refresh_token.clone()) },
		}
	}
}
impl From<GrantFlow> for Renewal {
	fn from(flow: GrantFlow) -> Self {
		match flow {
			GrantFlow::ClientCredentials => Self::ClientCredentials,
			GrantFlow::Password { username, password } => Self::Password { username, password },
			GrantFlow::Refresh { refresh_token } =>
				Self::RefreshToken { refresh_token: Some(refresh_token) },
		}
	}
}
