//! Token tracker: cache, validate, and renew one bearer token.
//!
//! A [`TokenTracker`] owns one set of client credentials, one [`GrantFlow`], and the
//! cached token state. [`TokenTracker::get_token`] serves the cached token until it is
//! within the safety margin of its expiry and renews it otherwise. Renewals pass through
//! a per-tracker single-flight guard, so concurrent callers racing past an expired cache
//! trigger exactly one exchange and all observe its result. Exchange results are applied
//! in one write-locked step; a failed exchange leaves the cache untouched.

mod builder;
mod flow;
mod state;

pub use builder::*;
pub use flow::*;
pub use state::*;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	clock::Clock,
	error::ConfigError,
	exchange::{ExchangeClient, Introspection, TokenResponse, TransportErrorMapper},
	http::TokenHttpClient,
	obs::{self, ExchangeKind},
};
#[cfg(feature = "reqwest")]
use crate::{exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

/// Margin applied when no other value is configured.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(10);

#[cfg(feature = "reqwest")]
/// Tracker specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenTracker = TokenTracker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Acquires, caches, validates, and renews a bearer token for one client.
pub struct TokenTracker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	exchange: ExchangeClient<C, M>,
	credentials: Credentials,
	token_endpoint: Url,
	introspection_endpoint: Option<Url>,
	safety_margin: Duration,
	inner: RwLock<Inner>,
	renew_guard: AsyncMutex<()>,
}
impl<C, M> TokenTracker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_parts(
		exchange: ExchangeClient<C, M>,
		credentials: Credentials,
		token_endpoint: Url,
		introspection_endpoint: Option<Url>,
		flow: GrantFlow,
		safety_margin: Duration,
	) -> Self {
		Self {
			exchange,
			credentials,
			token_endpoint,
			introspection_endpoint,
			safety_margin,
			inner: RwLock::new(Inner { renewal: flow.into(), cache: None }),
			renew_guard: AsyncMutex::new(()),
		}
	}

	/// Returns a valid bearer token, renewing it when the cached one is stale.
	///
	/// A token counts as fresh while `now < expires_at - safety_margin`; fresh tokens are
	/// returned without any network call.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		self.renew(Reuse::AnyFresh).await
	}

	/// Returns a bearer token confirmed by a live introspection call.
	///
	/// A fresh cached token is introspected on every call. A failed lookup forces a renewal;
	/// an inactive result additionally discards the cached token first. A stale or empty
	/// cache renews the token like [`Self::get_token`] without introspecting the new one.
	///
	/// Without an introspection endpoint every call fails with
	/// [`ConfigError::MissingIntrospectionEndpoint`], whatever the cache holds.
	pub async fn get_safe_token(&self) -> Result<TokenSecret> {
		let endpoint = self.require_introspection_endpoint()?;
		let Some(token) = self.fresh_token() else {
			return self.renew(Reuse::AnyFresh).await;
		};

		match self.exchange.introspect(endpoint, &token).await {
			Ok(introspection) if introspection.is_active() => {
				self.store_introspection(&token, introspection);

				Ok(token)
			},
			Ok(_) => {
				self.discard(&token, "introspection reported the token as inactive");

				self.renew(Reuse::FreshOtherThan(&token)).await
			},
			Err(_) => {
				obs::record_token_discarded("introspection failed");

				self.renew(Reuse::FreshOtherThan(&token)).await
			},
		}
	}

	/// Returns the introspection result for the cached token.
	///
	/// Fails with [`Error::NoToken`] before the first acquisition and with
	/// [`Error::Expired`] when the cached token is stale; neither case touches the network.
	/// A cached result is reused until the token is replaced.
	pub async fn get_token_information(&self) -> Result<Arc<Introspection>> {
		let now = self.clock().now();
		let token = {
			let inner = self.inner.read();
			let cached = inner.cache.as_ref().ok_or(Error::NoToken)?;

			if !cached.is_fresh_at(now, self.safety_margin) {
				return Err(Error::Expired { expired_at: cached.expires_at });
			}
			if let Some(introspection) = &cached.introspection {
				return Ok(introspection.clone());
			}

			cached.access_token.clone()
		};
		let endpoint = self.require_introspection_endpoint()?;
		let introspection = self.exchange.introspect(endpoint, &token).await?;

		Ok(self.store_introspection(&token, introspection))
	}

	/// Performs an exchange regardless of the cached token's freshness.
	pub async fn force_refresh(&self) -> Result<TokenSecret> {
		self.renew(Reuse::Never).await
	}

	/// Returns a snapshot of the cached state.
	pub fn state(&self) -> TokenState {
		let inner = self.inner.read();
		let refresh_token = inner.renewal.refresh_token().cloned();
		let grant_type = Some(inner.renewal.grant_type());

		match &inner.cache {
			Some(cached) => TokenState {
				access_token: Some(cached.access_token.clone()),
				expires_at: Some(cached.expires_at),
				refresh_token,
				introspection: cached.introspection.clone(),
				grant_type,
			},
			None => TokenState { refresh_token, grant_type, ..Default::default() },
		}
	}

	/// Expiry of the cached token, if any.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.inner.read().cache.as_ref().map(|cached| cached.expires_at)
	}

	/// Grant the next exchange will use.
	pub fn grant_type(&self) -> GrantType {
		self.inner.read().renewal.grant_type()
	}

	/// Drops the cached token. Renewal state (the refresh token, if any) is kept.
	pub fn invalidate(&self) {
		self.inner.write().cache = None;

		obs::record_token_discarded("invalidated by caller");
	}

	/// Configured safety margin.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Token endpoint used for every grant.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	/// Introspection endpoint, when configured.
	pub fn introspection_endpoint(&self) -> Option<&Url> {
		self.introspection_endpoint.as_ref()
	}

	/// Client credentials presented to the token endpoint.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	fn clock(&self) -> &Arc<dyn Clock> {
		self.exchange.clock()
	}

	fn fresh_token(&self) -> Option<TokenSecret> {
		let now = self.clock().now();
		let inner = self.inner.read();
		let cached = inner.cache.as_ref().filter(|c| c.is_fresh_at(now, self.safety_margin))?;

		obs::record_cache_hit(cached.expires_at);

		Some(cached.access_token.clone())
	}

	fn require_introspection_endpoint(&self) -> Result<&Url> {
		self.introspection_endpoint
			.as_ref()
			.ok_or_else(|| ConfigError::MissingIntrospectionEndpoint.into())
	}

	async fn renew(&self, reuse: Reuse<'_>) -> Result<TokenSecret> {
		let _singleflight = self.renew_guard.lock().await;

		if let Some(token) = self.reusable_token(reuse) {
			return Ok(token);
		}

		let renewal = self.inner.read().renewal.clone();
		let response = self.exchange_for(&renewal).await?;

		Ok(self.adopt(renewal.grant_type(), response))
	}

	// A caller that waited on the guard may find the token already renewed.
	fn reusable_token(&self, reuse: Reuse<'_>) -> Option<TokenSecret> {
		let stale = match reuse {
			Reuse::Never => return None,
			Reuse::AnyFresh => None,
			Reuse::FreshOtherThan(token) => Some(token),
		};
		let token = self.fresh_token()?;

		if stale == Some(&token) { None } else { Some(token) }
	}

	async fn exchange_for(&self, renewal: &Renewal) -> Result<TokenResponse> {
		let endpoint = &self.token_endpoint;
		let credentials = &self.credentials;

		match renewal {
			Renewal::ClientCredentials =>
				self.exchange.exchange_client_credentials(endpoint, credentials).await,
			Renewal::Password { username, password } =>
				self.exchange.exchange_password(endpoint, credentials, username, password).await,
			Renewal::RefreshToken { refresh_token: Some(refresh_token) } =>
				self.exchange.exchange_refresh_token(endpoint, credentials, refresh_token).await,
			Renewal::RefreshToken { refresh_token: None } => Err(Error::NoRefreshToken),
		}
	}

	fn adopt(&self, grant: GrantType, response: TokenResponse) -> TokenSecret {
		let TokenResponse { access_token, expires_at, refresh_token, .. } = response;

		obs::record_token_adopted(ExchangeKind::from(grant), expires_at, refresh_token.is_some());

		let mut inner = self.inner.write();

		inner.renewal = inner.renewal.after_exchange(refresh_token);
		inner.cache = Some(CachedToken::new(access_token.clone(), expires_at));

		access_token
	}

	// Only attaches the result when `token` is still the cached one.
	fn store_introspection(
		&self,
		token: &TokenSecret,
		introspection: Introspection,
	) -> Arc<Introspection> {
		let introspection = Arc::new(introspection);
		let mut inner = self.inner.write();

		if let Some(cached) = inner.cache.as_mut().filter(|c| &c.access_token == token) {
			cached.introspection = Some(introspection.clone());
		}

		introspection
	}

	fn discard(&self, token: &TokenSecret, reason: &'static str) {
		let mut inner = self.inner.write();

		if inner.cache.as_ref().is_some_and(|c| &c.access_token == token) {
			inner.cache = None;

			obs::record_token_discarded(reason);
		}
	}
}
#[cfg(feature = "reqwest")]
impl TokenTracker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Starts building a tracker for `token_endpoint`.
	///
	/// Finish with [`TokenTrackerBuilder::build`] for the default reqwest transport or
	/// [`TokenTrackerBuilder::build_with_http_client`] for a custom one.
	pub fn builder(
		token_endpoint: Url,
		credentials: Credentials,
		flow: GrantFlow,
	) -> TokenTrackerBuilder {
		TokenTrackerBuilder::new(token_endpoint, credentials, flow)
	}
}
impl<C, M> Debug for TokenTracker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let inner = self.inner.read();

		f.debug_struct("TokenTracker")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("introspection_endpoint", &self.introspection_endpoint.as_ref().map(Url::as_str))
			.field("credentials", &self.credentials)
			.field("grant_type", &inner.renewal.grant_type())
			.field("expires_at", &inner.cache.as_ref().map(|c| c.expires_at))
			.field("safety_margin", &self.safety_margin)
			.finish_non_exhaustive()
	}
}

struct Inner {
	renewal: Renewal,
	cache: Option<CachedToken>,
}

#[derive(Clone, Copy)]
enum Reuse<'a> {
	Never,
	AnyFresh,
	FreshOtherThan(&'a TokenSecret),
}
