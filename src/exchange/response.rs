//! Decoding of token endpoint and introspection responses.

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	HttpResponse,
	http::{StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::MalformedResponseError,
	http::parse_retry_after,
};

/// Token endpoint answer after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenResponse {
	/// Bearer token.
	pub access_token: TokenSecret,
	/// Absolute expiry: receive time plus `expires_in`.
	pub expires_at: OffsetDateTime,
	/// Refresh token, when the server issued (or rotated) one.
	pub refresh_token: Option<TokenSecret>,
	/// Scope string echoed by the server, if any.
	pub scope: Option<String>,
	/// Token type echoed by the server, if any.
	pub token_type: Option<String>,
}

/// Introspection result: a JSON object whose schema belongs to the authorization server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Introspection(Map<String, Value>);
impl Introspection {
	/// Wraps a decoded JSON object.
	pub fn new(map: Map<String, Value>) -> Self {
		Self(map)
	}

	/// Returns `false` only when the server explicitly reported `"active": false`.
	///
	/// Token-info endpoints that predate RFC 7662 omit the field; their answers count as active.
	pub fn is_active(&self) -> bool {
		!matches!(self.0.get("active"), Some(Value::Bool(false)))
	}

	/// Looks up a single field.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Borrows the underlying JSON object.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Consumes the wrapper and returns the JSON object.
	pub fn into_map(self) -> Map<String, Value> {
		self.0
	}
}
impl Deref for Introspection {
	type Target = Map<String, Value>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl From<Map<String, Value>> for Introspection {
	fn from(map: Map<String, Value>) -> Self {
		Self(map)
	}
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	scope: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Seconds(f64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Option<f64> {
		match self {
			ExpiresIn::Seconds(value) => Some(*value),
			ExpiresIn::Text(raw) => raw.trim().parse::<f64>().ok(),
		}
	}

	fn render(&self) -> String {
		match self {
			ExpiresIn::Seconds(value) => value.to_string(),
			ExpiresIn::Text(raw) => format!("{raw:?}"),
		}
	}
}

/// Decodes a token endpoint response received at `received_at`.
pub(crate) fn decode_token_response(
	response: &HttpResponse,
	received_at: OffsetDateTime,
) -> Result<TokenResponse> {
	let status = response.status();
	let object = decode_json_object(response)?;

	if let Some(err) = oauth_error(&object, status) {
		return Err(err);
	}
	if !status.is_success() {
		return Err(endpoint_error(response));
	}

	let raw: RawTokenResponse = serde_path_to_error::deserialize(Value::Object(object))
		.map_err(|source| MalformedResponseError::Json {
			source,
			status: Some(status.as_u16()),
		})?;
	let access_token = raw
		.access_token
		.filter(|token| !token.is_empty())
		.ok_or(MalformedResponseError::MissingAccessToken)?;

	// RFC 6750 `b64token` characters are all visible ASCII.
	if !access_token.bytes().all(|byte| byte.is_ascii_graphic()) {
		return Err(MalformedResponseError::InvalidAccessToken.into());
	}

	let expires_in = raw.expires_in.ok_or(MalformedResponseError::MissingExpiresIn)?;
	let expires_at = expiry_from(&expires_in, received_at)?;

	Ok(TokenResponse {
		access_token: TokenSecret::new(access_token),
		expires_at,
		refresh_token: raw.refresh_token.filter(|token| !token.is_empty()).map(TokenSecret::new),
		scope: raw.scope,
		token_type: raw.token_type,
	})
}

/// Decodes an introspection response. Any non-2xx status is an error even with a JSON body.
pub(crate) fn decode_introspection(response: &HttpResponse) -> Result<Introspection> {
	if !response.status().is_success() || !is_json(content_type(response)) {
		return Err(endpoint_error(response));
	}

	let object = parse_object(response)?;

	Ok(Introspection(object))
}

fn decode_json_object(response: &HttpResponse) -> Result<Map<String, Value>> {
	if !is_json(content_type(response)) {
		return Err(endpoint_error(response));
	}

	match parse_object(response) {
		Ok(object) => Ok(object),
		Err(_) if !response.status().is_success() => Err(endpoint_error(response)),
		Err(err) => Err(err),
	}
}

fn parse_object(response: &HttpResponse) -> Result<Map<String, Value>> {
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		MalformedResponseError::Json { source, status: Some(response.status().as_u16()) }.into()
	})
}

fn oauth_error(object: &Map<String, Value>, status: StatusCode) -> Option<Error> {
	let error = match object.get("error")? {
		Value::Null => return None,
		Value::String(code) => code.clone(),
		other => other.to_string(),
	};
	let description =
		object.get("error_description").and_then(Value::as_str).map(ToOwned::to_owned);

	Some(Error::OAuth { error, description, status: Some(status.as_u16()) })
}

fn expiry_from(expires_in: &ExpiresIn, received_at: OffsetDateTime) -> Result<OffsetDateTime> {
	let invalid = || MalformedResponseError::InvalidExpiresIn { value: expires_in.render() };
	let seconds = expires_in.seconds().filter(|secs| secs.is_finite() && *secs >= 0.0);
	let seconds = seconds.ok_or_else(invalid)?;

	// Fractional seconds are truncated.
	received_at
		.checked_add(Duration::seconds(seconds.trunc() as i64))
		.ok_or_else(|| invalid().into())
}

fn endpoint_error(response: &HttpResponse) -> Error {
	Error::Endpoint {
		status: Some(response.status().as_u16()),
		content_type: content_type(response).map(ToOwned::to_owned),
		retry_after: parse_retry_after(response.headers()),
	}
}

fn content_type(response: &HttpResponse) -> Option<&str> {
	response.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
}

fn is_json(content_type: Option<&str>) -> bool {
	content_type
		.map(|value| value.trim_start().to_ascii_lowercase().starts_with("application/json"))
		.unwrap_or(false)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const RECEIVED: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	fn response(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
		let mut builder = oauth2::http::Response::builder().status(status);

		if let Some(value) = content_type {
			builder = builder.header(CONTENT_TYPE, value);
		}

		builder.body(body.as_bytes().to_vec()).expect("Test response should build.")
	}

	#[test]
	fn success_computes_absolute_expiry() {
		let resp = response(
			200,
			Some("application/json; charset=utf-8"),
			r#"{"access_token":"abc","expires_in":3600,"token_type":"bearer"}"#,
		);
		let token = decode_token_response(&resp, RECEIVED).expect("Token response should decode.");

		assert_eq!(token.access_token.expose(), "abc");
		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(token.refresh_token, None);
		assert_eq!(token.token_type.as_deref(), Some("bearer"));
	}

	#[test]
	fn expires_in_accepts_fractions_and_strings() {
		let resp =
			response(200, Some("application/json"), r#"{"access_token":"a","expires_in":59.9}"#);
		let token = decode_token_response(&resp, RECEIVED).expect("Fractional expiry decodes.");

		assert_eq!(token.expires_at, RECEIVED + Duration::seconds(59));

		let resp =
			response(200, Some("application/json"), r#"{"access_token":"a","expires_in":"120"}"#);
		let token = decode_token_response(&resp, RECEIVED).expect("String expiry decodes.");

		assert_eq!(token.expires_at, RECEIVED + Duration::seconds(120));
	}

	#[test]
	fn oauth_error_wins_over_status_and_missing_fields() {
		let resp = response(
			400,
			Some("application/json"),
			r#"{"error":"invalid_client","error_description":"unknown client"}"#,
		);
		let err = decode_token_response(&resp, RECEIVED).expect_err("OAuth error must surface.");

		match err {
			Error::OAuth { error, description, status } => {
				assert_eq!(error, "invalid_client");
				assert_eq!(description.as_deref(), Some("unknown client"));
				assert_eq!(status, Some(400));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		let resp = response(200, Some("application/json"), r#"{"error":"access_denied"}"#);
		let err = decode_token_response(&resp, RECEIVED).expect_err("OAuth error must surface.");

		assert_eq!(err.oauth_error(), Some("access_denied"));
	}

	#[test]
	fn non_json_content_type_is_endpoint_error() {
		let resp = response(502, Some("text/html"), "<html>bad gateway</html>");
		let err = decode_token_response(&resp, RECEIVED).expect_err("HTML must be rejected.");

		assert!(matches!(
			err,
			Error::Endpoint { status: Some(502), content_type: Some(ref ct), .. } if ct == "text/html"
		));

		let resp = response(200, None, r#"{"access_token":"a","expires_in":1}"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::Endpoint { content_type: None, .. })
		));
	}

	#[test]
	fn non_success_json_without_error_is_endpoint_error() {
		let resp = response(500, Some("application/json"), r#"{"message":"boom"}"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::Endpoint { status: Some(500), .. })
		));

		let resp = response(503, Some("application/json"), "not json");

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::Endpoint { status: Some(503), .. })
		));
	}

	#[test]
	fn missing_fields_are_malformed() {
		let resp = response(200, Some("application/json"), r#"{"expires_in":10}"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::MalformedResponse(MalformedResponseError::MissingAccessToken))
		));

		let resp = response(200, Some("application/json"), r#"{"access_token":"a"}"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::MalformedResponse(MalformedResponseError::MissingExpiresIn))
		));

		let resp = response(200, Some("application/json"), r#"{"access_token":"a","expires_in":-5}"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::MalformedResponse(MalformedResponseError::InvalidExpiresIn { .. }))
		));

		let resp =
			response(200, Some("application/json"), r#"{"access_token":"a b","expires_in":5}"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::MalformedResponse(MalformedResponseError::InvalidAccessToken))
		));

		let resp = response(200, Some("application/json"), r#"["access_token"]"#);

		assert!(matches!(
			decode_token_response(&resp, RECEIVED),
			Err(Error::MalformedResponse(MalformedResponseError::Json { .. }))
		));
	}

	#[test]
	fn wrong_field_type_reports_path() {
		let resp = response(200, Some("application/json"), r#"{"access_token":42,"expires_in":1}"#);
		let err = decode_token_response(&resp, RECEIVED).expect_err("Numeric token is malformed.");

		match err {
			Error::MalformedResponse(MalformedResponseError::Json { source, .. }) =>
				assert_eq!(source.path().to_string(), "access_token"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn introspection_requires_success_status() {
		let resp = response(401, Some("application/json"), r#"{"active":false}"#);

		assert!(matches!(
			decode_introspection(&resp),
			Err(Error::Endpoint { status: Some(401), .. })
		));

		let resp = response(200, Some("application/json"), r#"{"active":true,"sub":"svc"}"#);
		let info = decode_introspection(&resp).expect("Introspection should decode.");

		assert!(info.is_active());
		assert_eq!(info.get("sub").and_then(Value::as_str), Some("svc"));
	}

	#[test]
	fn introspection_activity_defaults_to_true() {
		assert!(Introspection::default().is_active());

		let mut map = Map::new();

		map.insert("active".into(), Value::Bool(false));

		assert!(!Introspection::new(map).is_active());
	}
}
