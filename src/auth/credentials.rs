//! OAuth client credentials presented to the token endpoint.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, TokenSecret},
};

/// Client identifier, secret, and requested scope. Immutable once configured.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	client_id: String,
	client_secret: TokenSecret,
	scope: ScopeList,
}
impl Credentials {
	/// Creates credentials for the provided client.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		scope: ScopeList,
	) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into(), scope }
	}

	/// OAuth 2.0 client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Client secret used for HTTP Basic authentication.
	pub fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}

	/// Requested scope list.
	pub fn scope(&self) -> &ScopeList {
		&self.scope
	}

	/// Renders the `Authorization: Basic ...` header value.
	///
	/// The id and secret are joined verbatim with `:` before encoding.
	pub fn basic_authorization(&self) -> String {
		let raw = format!("{}:{}", self.client_id, self.client_secret.expose());

		format!("Basic {}", STANDARD.encode(raw))
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("scope", &self.scope)
			.finish()
	}
}
