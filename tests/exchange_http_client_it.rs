// self
use oauth2_tracker::{
	_preludet::*,
	auth::TokenSecret,
	exchange::{ExchangeClient, TransportErrorMapper},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::ExchangeKind,
	oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	tracker::{GrantFlow, TokenTracker, TokenTrackerBuilder},
};

#[derive(Debug)]
enum ThrottledError {
	Throttled,
}
impl Display for ThrottledError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for ThrottledError {}

#[derive(Clone, Copy)]
struct ThrottledHttpClient {
	retry_after: Duration,
}
impl TokenHttpClient for ThrottledHttpClient {
	type Handle = ThrottledHandle;
	type TransportError = ThrottledError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ThrottledHandle { slot, retry_after: self.retry_after }
	}
}

struct ThrottledHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for ThrottledHandle {
	type Error = HttpClientError<ThrottledError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, _request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(ThrottledError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	calls: Arc<Mutex<Vec<(ExchangeKind, Option<ResponseMetadata>)>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded(&self) -> Vec<(ExchangeKind, Option<ResponseMetadata>)> {
		self.calls.lock().clone()
	}
}
impl TransportErrorMapper<ThrottledError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		kind: ExchangeKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ThrottledError>,
	) -> Error {
		self.calls.lock().push((kind, meta.cloned()));

		match err {
			HttpClientError::Reqwest(_) => Error::Endpoint {
				status: meta.and_then(|value| value.status),
				content_type: None,
				retry_after: meta.and_then(|value| value.retry_after),
			},
			other => oauth2_tracker::exchange::map_generic_transport_error(kind, meta, other),
		}
	}
}

fn token_endpoint() -> Url {
	Url::parse("https://mock.example.com/token").expect("Failed to parse mock token endpoint URL.")
}

#[tokio::test]
async fn custom_transport_surfaces_metadata_to_the_mapper() {
	let mapper = RecordingTransportErrorMapper::default();
	let client: ExchangeClient<ThrottledHttpClient, RecordingTransportErrorMapper> =
		ExchangeClient::with_http_client(
			ThrottledHttpClient { retry_after: Duration::seconds(5) },
			mapper.clone(),
		);
	let err = client
		.exchange_refresh_token(&token_endpoint(), &test_credentials("read"), &TokenSecret::new("rt"))
		.await
		.expect_err("Request should be throttled with HTTP 429.");

	match err {
		Error::Endpoint { status, retry_after, .. } => {
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let recorded = mapper.recorded();

	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].0, ExchangeKind::RefreshToken);
	assert_eq!(recorded[0].1.as_ref().and_then(|meta| meta.status), Some(429));
}

#[tokio::test]
async fn tracker_over_custom_transport_keeps_an_empty_state_on_failure() {
	let mapper = Arc::new(RecordingTransportErrorMapper::default());
	let tracker: TokenTracker<ThrottledHttpClient, RecordingTransportErrorMapper> =
		TokenTrackerBuilder::new(
			token_endpoint(),
			test_credentials(""),
			GrantFlow::ClientCredentials,
		)
		.build_with_http_client(
			ThrottledHttpClient { retry_after: Duration::seconds(30) },
			mapper.clone(),
		);
	let err = tracker.get_token().await.expect_err("Throttled exchanges should fail.");

	assert!(err.is_transient());
	assert!(tracker.state().is_empty());
	assert_eq!(mapper.recorded()[0].0, ExchangeKind::ClientCredentials);
}

#[tokio::test]
async fn fake_transport_records_the_introspection_request() {
	let http = FakeHttpClient::default();
	let client: ExchangeClient<FakeHttpClient, FakeTransportErrorMapper> =
		ExchangeClient::with_http_client(http.clone(), FakeTransportErrorMapper);

	http.push_json(200, serde_json::json!({ "active": true, "client_id": CLIENT_ID }));

	let info = client
		.introspect(
			&Url::parse("https://mock.example.com/tokeninfo").expect("URL should parse."),
			&TokenSecret::new("abc"),
		)
		.await
		.expect("Introspection should succeed.");

	assert!(info.is_active());

	let request = &http.requests()[0];

	assert_eq!(request.method, "GET");
	assert_eq!(request.uri, "https://mock.example.com/tokeninfo");
	assert_eq!(request.header("authorization"), Some("Bearer abc"));
	assert_eq!(request.header("accept"), Some("application/json"));
	assert!(request.body.is_empty());
}

#[tokio::test]
async fn refresh_exchange_surfaces_rotated_tokens() {
	let http = FakeHttpClient::default();
	let client: ExchangeClient<FakeHttpClient, FakeTransportErrorMapper> =
		ExchangeClient::with_http_client(http.clone(), FakeTransportErrorMapper);

	http.push_token("abc", 3600, Some("rt-2"));

	let response = client
		.exchange_refresh_token(&token_endpoint(), &test_credentials("a b"), &TokenSecret::new("rt-1"))
		.await
		.expect("Refresh exchange should succeed.");

	assert_eq!(response.access_token.expose(), "abc");
	assert_eq!(response.refresh_token.map(|token| token.expose().to_owned()).as_deref(), Some("rt-2"));
	assert_eq!(
		http.requests()[0].form(),
		vec![
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("refresh_token".to_owned(), "rt-1".to_owned()),
			("scope".to_owned(), "a b".to_owned()),
		]
	);
}
