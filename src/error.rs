//! Tracker-level error types shared by the exchange client and the token tracker.

// self
use crate::_prelude::*;

/// Tracker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Endpoint answered with a non-2xx status or a non-JSON content type.
	#[error(
		"Endpoint returned status {} and Content-Type {}.",
		display_status(.status),
		.content_type.as_deref().unwrap_or("<none>")
	)]
	Endpoint {
		/// HTTP status code, when a response was received.
		status: Option<u16>,
		/// Raw `Content-Type` header value, if any.
		content_type: Option<String>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Authorization server reported an OAuth `error` field.
	#[error("Token endpoint returned an OAuth error: {error}.")]
	OAuth {
		/// Server-reported `error` value, verbatim.
		error: String,
		/// Optional `error_description` value.
		description: Option<String>,
		/// HTTP status code of the response.
		status: Option<u16>,
	},
	/// Response body could not be turned into a token or introspection result.
	#[error(transparent)]
	MalformedResponse(#[from] MalformedResponseError),
	/// Renewal requires a refresh token the authorization server never issued.
	#[error("No refresh token is available to renew the access token.")]
	NoRefreshToken,
	/// Cached token is inside the safety margin or past its expiry, so it is not sent for
	/// introspection.
	#[error("The cached token is stale (expires at {expired_at}).")]
	Expired {
		/// Cached expiry instant.
		expired_at: OffsetDateTime,
	},
	/// No token has been acquired yet.
	#[error("No token has been acquired yet.")]
	NoToken,
}
impl Error {
	/// Returns `true` for failures a caller may reasonably retry later.
	///
	/// The tracker itself never retries; this is a hint for caller-side policies.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Endpoint { status, .. } => matches!(status, Some(429) | Some(500..=599)),
			Self::OAuth { error, .. } =>
				error == "temporarily_unavailable" || error == "server_error",
			_ => false,
		}
	}

	/// Returns the OAuth `error` code when the server reported one.
	pub fn oauth_error(&self) -> Option<&str> {
		match self {
			Self::OAuth { error, .. } => Some(error),
			_ => None,
		}
	}
}

fn display_status(status: &Option<u16>) -> String {
	status.map(|code| code.to_string()).unwrap_or_else(|| "<none>".into())
}

/// Configuration and validation failures raised before any request is sent.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Endpoint URL is empty or cannot be parsed.
	#[error("The {endpoint} endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Introspection was requested but no introspection endpoint is configured.
	#[error("No introspection endpoint is configured.")]
	MissingIntrospectionEndpoint,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label (`token` or `introspection`).
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request did not complete within the configured timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint label (`token` or `introspection`).
		endpoint: &'static str,
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an OAuth endpoint.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint label (`token` or `introspection`).
		endpoint: &'static str,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout.
	pub fn timeout(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Timeout { endpoint, source: Box::new(src) }
	}
}

/// A 2xx JSON response that does not carry what the caller needs.
#[derive(Debug, ThisError)]
pub enum MalformedResponseError {
	/// Body is not the expected JSON shape.
	#[error("Response body is not valid JSON for this endpoint.")]
	Json {
		/// Structured parsing failure, including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: Option<u16>,
	},
	/// Token response lacks `access_token`.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
	/// `access_token` holds characters a bearer header cannot carry.
	#[error("Token endpoint returned an access_token with non-printable or non-ASCII characters.")]
	InvalidAccessToken,
	/// Token response lacks `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// `expires_in` is negative, not a number, or out of range.
	#[error("Token endpoint returned an invalid expires_in value: {value}.")]
	InvalidExpiresIn {
		/// Raw JSON rendering of the offending value.
		value: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn endpoint_error_renders_status_and_content_type() {
		let err = Error::Endpoint {
			status: Some(502),
			content_type: Some("text/html".into()),
			retry_after: None,
		};

		assert_eq!(err.to_string(), "Endpoint returned status 502 and Content-Type text/html.");

		let err = Error::Endpoint { status: None, content_type: None, retry_after: None };

		assert_eq!(err.to_string(), "Endpoint returned status <none> and Content-Type <none>.");
	}

	#[test]
	fn transient_hint_covers_transport_and_server_errors() {
		let io = Error::from(TransportError::Io(std::io::Error::other("reset")));

		assert!(io.is_transient());
		assert!(
			Error::Endpoint { status: Some(503), content_type: None, retry_after: None }
				.is_transient()
		);
		assert!(
			!Error::Endpoint { status: Some(404), content_type: None, retry_after: None }
				.is_transient()
		);

		let oauth =
			Error::OAuth { error: "invalid_client".into(), description: None, status: Some(401) };

		assert!(!oauth.is_transient());
		assert_eq!(oauth.oauth_error(), Some("invalid_client"));
		assert!(!Error::NoRefreshToken.is_transient());
	}

	#[test]
	fn expired_error_reads_as_stale() {
		let expired_at = time::macros::datetime!(2025-01-01 00:00 UTC);
		let message = Error::Expired { expired_at }.to_string();

		assert!(message.starts_with("The cached token is stale (expires at 2025-01-01"));
		assert!(!message.contains("expired at"));
	}
}
