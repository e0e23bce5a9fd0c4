//! OAuth 2.0 token tracker: acquire, cache, validate, and refresh the bearer tokens your
//! service sends to other APIs, with single-flight renewals and classified errors.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod error;
pub mod exchange;
pub mod ext;
pub mod http;
pub mod obs;
pub mod tracker;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		task::{Context, Poll},
	};
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
	};
	// self
	use crate::{
		auth::{Credentials, ScopeList},
		exchange::{self, TransportErrorMapper},
		http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
		obs::ExchangeKind,
		tracker::{GrantFlow, TokenTracker, TokenTrackerBuilder},
	};
	#[cfg(feature = "reqwest")]
	use crate::{exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

	/// Client identifier used across tests.
	pub const CLIENT_ID: &str = "client-id";
	/// Client secret used across tests.
	pub const CLIENT_SECRET: &str = "client-secret";

	/// Tracker type alias used by fake-transport tests.
	pub type FakeTracker = TokenTracker<FakeHttpClient, FakeTransportErrorMapper>;

	/// Builds credentials for [`CLIENT_ID`]/[`CLIENT_SECRET`] with the given space-separated
	/// scope.
	pub fn test_credentials(scope: &str) -> Credentials {
		let scope = scope.parse::<ScopeList>().expect("Test scope should be valid.");

		Credentials::new(CLIENT_ID, CLIENT_SECRET, scope)
	}

	/// Starts a builder pointed at fake `https://auth.test` endpoints.
	pub fn fake_tracker_builder(flow: GrantFlow) -> TokenTrackerBuilder {
		let token_endpoint =
			Url::parse("https://auth.test/token").expect("Fake token endpoint should parse.");
		let introspection_endpoint =
			Url::parse("https://auth.test/tokeninfo").expect("Fake introspection URL should parse.");

		TokenTrackerBuilder::new(token_endpoint, test_credentials(""), flow)
			.introspection_endpoint(introspection_endpoint)
	}

	/// Finishes `builder` on top of `http`.
	pub fn build_fake_tracker(builder: TokenTrackerBuilder, http: &FakeHttpClient) -> FakeTracker {
		builder.build_with_http_client(http.clone(), FakeTransportErrorMapper)
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Finishes `builder` on top of [`test_reqwest_http_client`].
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_tracker(
		builder: TokenTrackerBuilder,
	) -> TokenTracker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
		builder.build_with_http_client(test_reqwest_http_client(), ReqwestTransportErrorMapper)
	}

	/// Error produced by [`FakeHttpClient`] when a scripted failure is replayed.
	#[derive(Debug, ThisError)]
	#[error("{0}")]
	pub struct FakeTransportError(pub String);

	/// Maps [`FakeTransportError`] through the generic transport classification.
	#[derive(Clone, Debug, Default)]
	pub struct FakeTransportErrorMapper;
	impl TransportErrorMapper<FakeTransportError> for FakeTransportErrorMapper {
		fn map_transport_error(
			&self,
			kind: ExchangeKind,
			metadata: Option<&ResponseMetadata>,
			error: HttpClientError<FakeTransportError>,
		) -> Error {
			exchange::map_generic_transport_error(kind, metadata, error)
		}
	}

	/// Request captured by [`FakeHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Request URI.
		pub uri: String,
		/// Request headers.
		pub headers: HeaderMap,
		/// Body decoded as UTF-8.
		pub body: String,
	}
	impl RecordedRequest {
		/// Returns a header as a string.
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers.get(name).and_then(|value| value.to_str().ok())
		}

		/// Decodes the form body into key/value pairs.
		pub fn form(&self) -> Vec<(String, String)> {
			url::form_urlencoded::parse(self.body.as_bytes()).into_owned().collect()
		}

		/// Returns the first form value for `key`.
		pub fn form_value(&self, key: &str) -> Option<String> {
			self.form().into_iter().find(|(name, _)| name == key).map(|(_, value)| value)
		}
	}

	enum FakeReply {
		Response(HttpResponse),
		Failure(String),
	}

	#[derive(Default)]
	struct FakeState {
		replies: Mutex<VecDeque<FakeReply>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}

	/// Scripted transport: replays queued replies in order and records every request.
	///
	/// Running out of replies yields a transport failure.
	#[derive(Clone, Default)]
	pub struct FakeHttpClient(Arc<FakeState>);
	impl FakeHttpClient {
		/// Queues a JSON reply.
		pub fn push_json(&self, status: u16, body: serde_json::Value) {
			self.push_raw(status, Some("application/json"), &body.to_string());
		}

		/// Queues a successful token response.
		pub fn push_token(&self, access_token: &str, expires_in: i64, refresh_token: Option<&str>) {
			let mut body = serde_json::json!({
				"access_token": access_token,
				"expires_in": expires_in,
				"token_type": "Bearer",
			});

			if let Some(refresh_token) = refresh_token {
				body["refresh_token"] = refresh_token.into();
			}

			self.push_json(200, body);
		}

		/// Queues a reply with an arbitrary content type and body.
		pub fn push_raw(&self, status: u16, content_type: Option<&str>, body: &str) {
			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Test status code should be valid.");

			if let Some(content_type) = content_type {
				response.headers_mut().insert(
					CONTENT_TYPE,
					HeaderValue::from_str(content_type).expect("Test content type should be valid."),
				);
			}

			self.0.replies.lock().push_back(FakeReply::Response(response));
		}

		/// Queues a transport failure.
		pub fn push_failure(&self, message: &str) {
			self.0.replies.lock().push_back(FakeReply::Failure(message.into()));
		}

		/// Requests received so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.requests.lock().clone()
		}

		/// Number of requests received so far.
		pub fn call_count(&self) -> usize {
			self.0.requests.lock().len()
		}
	}
	impl Debug for FakeHttpClient {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("FakeHttpClient").field("calls", &self.call_count()).finish()
		}
	}
	impl TokenHttpClient for FakeHttpClient {
		type Handle = FakeHandle;
		type TransportError = FakeTransportError;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			FakeHandle { state: self.0.clone(), slot }
		}
	}

	/// Handle returned by [`FakeHttpClient`].
	pub struct FakeHandle {
		state: Arc<FakeState>,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for FakeHandle {
		type Error = HttpClientError<FakeTransportError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			Box::pin(async move {
				self.slot.take();
				self.state.requests.lock().push(RecordedRequest {
					method: request.method().to_string(),
					uri: request.uri().to_string(),
					headers: request.headers().clone(),
					body: String::from_utf8_lossy(request.body()).into_owned(),
				});

				// Let other tasks observe the in-flight exchange.
				YieldOnce(false).await;

				let reply = self.state.replies.lock().pop_front();

				match reply {
					Some(FakeReply::Response(response)) => {
						self.slot.store(ResponseMetadata {
							status: Some(response.status().as_u16()),
							retry_after: None,
						});

						Ok(response)
					},
					Some(FakeReply::Failure(message)) =>
						Err(HttpClientError::Reqwest(Box::new(FakeTransportError(message)))),
					None => Err(HttpClientError::Other("no scripted reply left".into())),
				}
			})
		}
	}

	struct YieldOnce(bool);
	impl Future for YieldOnce {
		type Output = ();

		fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
			if self.0 {
				return Poll::Ready(());
			}

			self.0 = true;
			cx.waker().wake_by_ref();

			Poll::Pending
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "cli")]
use {clap as _, color_eyre as _, dirs as _, tokio as _, toml as _, tracing_subscriber as _};
#[cfg(test)] use {color_eyre as _, httpmock as _};
