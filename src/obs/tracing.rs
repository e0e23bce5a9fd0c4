// self
use crate::{_prelude::*, obs::ExchangeKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedExchange<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedExchange<F> = F;

/// A span builder used around exchanges and tracker operations.
#[derive(Clone, Debug)]
pub struct ExchangeSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl ExchangeSpan {
	/// Creates a new span tagged with the provided exchange kind + stage.
	pub fn new(kind: ExchangeKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_tracker.exchange",
				kind = kind.as_str(),
				endpoint = kind.endpoint(),
				stage
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedExchange<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a cached token is served without a network call.
pub fn record_cache_hit(expires_at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(%expires_at, "Serving cached access token.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = expires_at;
	}
}

/// Emits a debug event when an exchange result replaces the cached token.
///
/// Only the grant, expiry, and whether a refresh token came back are logged.
pub fn record_token_adopted(kind: ExchangeKind, expires_at: OffsetDateTime, refresh_issued: bool) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(kind = kind.as_str(), %expires_at, refresh_issued, "Adopted new access token.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, expires_at, refresh_issued);
	}
}

/// Emits a debug event when a cached token is dropped before its expiry.
pub fn record_token_discarded(reason: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(reason, "Discarded cached access token.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = reason;
	}
}
