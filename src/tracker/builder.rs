// self
use crate::{
	_prelude::*,
	auth::Credentials,
	clock::{Clock, SystemClock},
	error::ConfigError,
	exchange::{ExchangeClient, TransportErrorMapper},
	http::TokenHttpClient,
	tracker::{DEFAULT_SAFETY_MARGIN, GrantFlow, TokenTracker},
};
#[cfg(feature = "reqwest")]
use crate::{exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

/// Parses an endpoint URL, labelling failures with the endpoint's role.
pub fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
}

/// Builder for [`TokenTracker`] values.
#[derive(Clone)]
pub struct TokenTrackerBuilder {
	/// Token endpoint used for every grant.
	pub token_endpoint: Url,
	/// Optional introspection endpoint.
	pub introspection_endpoint: Option<Url>,
	/// Client credentials presented to the token endpoint.
	pub credentials: Credentials,
	/// Grant flow the tracker starts with.
	pub flow: GrantFlow,
	/// Margin subtracted from the expiry before a token counts as stale.
	pub safety_margin: Duration,
	/// Time source for expiry arithmetic.
	pub clock: Arc<dyn Clock>,
}
impl TokenTrackerBuilder {
	/// Creates a new builder with the default safety margin and the system clock.
	pub fn new(token_endpoint: Url, credentials: Credentials, flow: GrantFlow) -> Self {
		Self {
			token_endpoint,
			introspection_endpoint: None,
			credentials,
			flow,
			safety_margin: DEFAULT_SAFETY_MARGIN,
			clock: Arc::new(SystemClock),
		}
	}

	/// Sets the introspection endpoint used by safe retrieval and token information.
	pub fn introspection_endpoint(mut self, url: Url) -> Self {
		self.introspection_endpoint = Some(url);

		self
	}

	/// Overrides the safety margin (defaults to 10 seconds). Negative values clamp to zero.
	pub fn safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Replaces the clock.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Builds a tracker on top of a caller-provided transport + mapper pair.
	pub fn build_with_http_client<C, M>(
		self,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> TokenTracker<C, M>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let exchange = ExchangeClient::with_http_client(http_client, mapper).with_clock(self.clock);

		TokenTracker::from_parts(
			exchange,
			self.credentials,
			self.token_endpoint,
			self.introspection_endpoint,
			self.flow,
			self.safety_margin,
		)
	}

	/// Builds a tracker backed by [`ReqwestHttpClient::new`].
	#[cfg(feature = "reqwest")]
	pub fn build(self) -> Result<TokenTracker<ReqwestHttpClient, ReqwestTransportErrorMapper>> {
		let http_client = ReqwestHttpClient::new()?;

		Ok(self.build_with_http_client(http_client, ReqwestTransportErrorMapper))
	}
}
impl Debug for TokenTrackerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenTrackerBuilder")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("introspection_endpoint", &self.introspection_endpoint.as_ref().map(Url::as_str))
			.field("credentials", &self.credentials)
			.field("flow", &self.flow)
			.field("safety_margin", &self.safety_margin)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::ScopeList;

	fn builder() -> TokenTrackerBuilder {
		TokenTrackerBuilder::new(
			Url::parse("https://auth.example.com/token").expect("Test URL should parse."),
			Credentials::new("client", "secret", ScopeList::default()),
			GrantFlow::ClientCredentials,
		)
	}

	#[test]
	fn safety_margin_defaults_to_ten_seconds_and_clamps() {
		assert_eq!(builder().safety_margin, Duration::seconds(10));
		assert_eq!(builder().safety_margin(Duration::seconds(-5)).safety_margin, Duration::ZERO);
		assert_eq!(
			builder().safety_margin(Duration::seconds(30)).safety_margin,
			Duration::seconds(30)
		);
	}

	#[test]
	fn parse_endpoint_rejects_empty_and_relative_urls() {
		assert!(matches!(
			parse_endpoint("token", ""),
			Err(ConfigError::InvalidEndpoint { endpoint: "token", .. })
		));
		assert!(matches!(
			parse_endpoint("introspection", "/tokeninfo"),
			Err(ConfigError::InvalidEndpoint { endpoint: "introspection", .. })
		));
		assert_eq!(
			parse_endpoint("token", " https://auth.example.com/token ")
				.expect("Endpoint should parse.")
				.as_str(),
			"https://auth.example.com/token"
		);
	}

	#[test]
	fn debug_output_redacts_credentials() {
		let rendered = format!("{:?}", builder());

		assert!(rendered.contains("auth.example.com"));
		assert!(!rendered.contains("\"secret\""));
	}
}
