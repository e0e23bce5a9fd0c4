//! Stateless token exchange client.
//!
//! [`ExchangeClient`] performs exactly one HTTP request per call: the three token
//! endpoint grants (`client_credentials`, `password`, `refresh_token`) and the
//! introspection lookup. Token requests are form-encoded `POST`s authenticated with
//! HTTP Basic; introspection is a `GET` carrying the bearer token. Responses are
//! classified into the crate's [`Error`] taxonomy and never retried here.

mod response;

pub use response::*;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	clock::{Clock, SystemClock},
	error::{ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::{self, ExchangeKind, ExchangeOutcome, ExchangeSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Maps HTTP transport failures into tracker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a tracker error.
	fn map_transport_error(
		&self,
		kind: ExchangeKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		kind: ExchangeKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(kind, *inner),
			other => map_generic_transport_error(kind, meta, other),
		}
	}
}

/// Maps the transport-agnostic [`HttpClientError`] variants.
///
/// Custom mappers can delegate here for everything except their own transport variant.
pub fn map_generic_transport_error<E>(
	kind: ExchangeKind,
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<E>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let endpoint = kind.endpoint();

	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		_ => TransportError::Other {
			endpoint,
			message: match meta.and_then(|value| value.status) {
				Some(status) => format!("unrecognized transport failure after status {status}"),
				None => "unrecognized transport failure".into(),
			},
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(kind: ExchangeKind, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::timeout(kind.endpoint(), err).into();
	}

	TransportError::network(kind.endpoint(), err).into()
}

/// Stateless client for the token and introspection endpoints.
///
/// The struct only bundles the transport, the transport error mapper, and the clock
/// used to turn `expires_in` into an absolute instant; clones share all three.
pub struct ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	clock: Arc<dyn Clock>,
}
impl<C, M> ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http_client: http_client.into(),
			error_mapper: mapper.into(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the clock used to compute expiry instants.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Clock shared with the tracker.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Performs the `client_credentials` grant.
	pub async fn exchange_client_credentials(
		&self,
		endpoint: &Url,
		credentials: &Credentials,
	) -> Result<TokenResponse> {
		let scope = credentials.scope().joined();
		let mut form = vec![("grant_type", "client_credentials")];

		push_scope(&mut form, &scope);

		self.token_call(ExchangeKind::ClientCredentials, endpoint, credentials, &form).await
	}

	/// Performs the `password` grant, asking for a refresh token via `access_type=offline`.
	pub async fn exchange_password(
		&self,
		endpoint: &Url,
		credentials: &Credentials,
		username: &str,
		password: &TokenSecret,
	) -> Result<TokenResponse> {
		let scope = credentials.scope().joined();
		let mut form = vec![
			("grant_type", "password"),
			("access_type", "offline"),
			("username", username),
			("password", password.expose()),
		];

		push_scope(&mut form, &scope);

		self.token_call(ExchangeKind::Password, endpoint, credentials, &form).await
	}

	/// Performs the `refresh_token` grant.
	pub async fn exchange_refresh_token(
		&self,
		endpoint: &Url,
		credentials: &Credentials,
		refresh_token: &TokenSecret,
	) -> Result<TokenResponse> {
		let scope = credentials.scope().joined();
		let mut form =
			vec![("grant_type", "refresh_token"), ("refresh_token", refresh_token.expose())];

		push_scope(&mut form, &scope);

		self.token_call(ExchangeKind::RefreshToken, endpoint, credentials, &form).await
	}

	/// Looks up `token` at the introspection endpoint.
	pub async fn introspect(&self, endpoint: &Url, token: &TokenSecret) -> Result<Introspection> {
		const KIND: ExchangeKind = ExchangeKind::Introspection;

		let span = ExchangeSpan::new(KIND, "introspect");

		obs::record_exchange_outcome(KIND, ExchangeOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = Request::builder()
					.method(Method::GET)
					.uri(endpoint.as_str())
					.header(AUTHORIZATION, format!("Bearer {}", token.expose()))
					.header(ACCEPT, JSON_CONTENT_TYPE)
					.body(Vec::new())
					.map_err(ConfigError::from)?;
				let response = self.send(KIND, request).await?;

				decode_introspection(&response)
			})
			.await;

		record_result(KIND, &result);

		result
	}

	async fn token_call(
		&self,
		kind: ExchangeKind,
		endpoint: &Url,
		credentials: &Credentials,
		form: &[(&str, &str)],
	) -> Result<TokenResponse> {
		let span = ExchangeSpan::new(kind, "token_call");

		obs::record_exchange_outcome(kind, ExchangeOutcome::Attempt);

		let result = span
			.instrument(async move {
				let body = {
					let mut serializer = FormSerializer::new(String::new());

					serializer.extend_pairs(form.iter().copied());
					serializer.finish().into_bytes()
				};
				let request = Request::builder()
					.method(Method::POST)
					.uri(endpoint.as_str())
					.header(AUTHORIZATION, credentials.basic_authorization())
					.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
					.header(ACCEPT, JSON_CONTENT_TYPE)
					.body(body)
					.map_err(ConfigError::from)?;
				let response = self.send(kind, request).await?;

				decode_token_response(&response, self.clock.now())
			})
			.await;

		record_result(kind, &result);

		result
	}

	async fn send(&self, kind: ExchangeKind, request: HttpRequest) -> Result<oauth2::HttpResponse> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());

		handle
			.call(request)
			.await
			.map_err(|err| self.error_mapper.map_transport_error(kind, meta.take().as_ref(), err))
	}
}
#[cfg(feature = "reqwest")]
impl ExchangeClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by [`ReqwestHttpClient::new`].
	pub fn new() -> Result<Self> {
		Ok(Self::with_http_client(ReqwestHttpClient::new()?, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			error_mapper: self.error_mapper.clone(),
			clock: self.clock.clone(),
		}
	}
}
impl<C, M> Debug for ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeClient").finish_non_exhaustive()
	}
}

fn push_scope<'a>(form: &mut Vec<(&'a str, &'a str)>, scope: &'a str) {
	if !scope.is_empty() {
		form.push(("scope", scope));
	}
}

fn record_result<T>(kind: ExchangeKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_exchange_outcome(kind, ExchangeOutcome::Success),
		Err(_) => obs::record_exchange_outcome(kind, ExchangeOutcome::Failure),
	}
}
