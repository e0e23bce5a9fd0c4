//! Bearer token sources and `Authorization` header helpers.

// crates.io
use oauth2::http::{HeaderValue, header::InvalidHeaderValue};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	exchange::TransportErrorMapper,
	http::TokenHttpClient,
	tracker::TokenTracker,
};
#[cfg(feature = "reqwest")] use crate::error::MalformedResponseError;

/// Boxed future returned by [`BearerTokenSource::bearer_token`].
pub type BearerFuture<'a, T = TokenSecret> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Anything that can hand out a bearer token for the next outbound request.
pub trait BearerTokenSource
where
	Self: Send + Sync,
{
	/// Returns the token to send.
	fn bearer_token(&self) -> BearerFuture<'_>;
}
impl<T> BearerTokenSource for Arc<T>
where
	T: ?Sized + BearerTokenSource,
{
	fn bearer_token(&self) -> BearerFuture<'_> {
		(**self).bearer_token()
	}
}
impl<C, M> BearerTokenSource for TokenTracker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn bearer_token(&self) -> BearerFuture<'_> {
		Box::pin(self.get_token())
	}
}

/// Token source that confirms the token through introspection before every use.
///
/// Wraps [`TokenTracker::get_safe_token`].
#[derive(Debug)]
pub struct SafeBearer<'a, C, M>(pub &'a TokenTracker<C, M>)
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>;
impl<C, M> BearerTokenSource for SafeBearer<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn bearer_token(&self) -> BearerFuture<'_> {
		Box::pin(self.0.get_safe_token())
	}
}

/// Renders `Bearer <token>` as a header value flagged as sensitive.
pub fn bearer_header_value(token: &TokenSecret) -> Result<HeaderValue, InvalidHeaderValue> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))?;

	value.set_sensitive(true);

	Ok(value)
}

/// Attaches tokens from a [`BearerTokenSource`] to reqwest requests.
#[cfg(feature = "reqwest")]
pub trait RequestBuilderExt
where
	Self: Sized,
{
	/// Fetches a token from `source` and sets the `Authorization` header.
	fn bearer_from<'a, S>(self, source: &'a S) -> BearerFuture<'a, Self>
	where
		S: ?Sized + BearerTokenSource;
}
#[cfg(feature = "reqwest")]
impl RequestBuilderExt for reqwest::RequestBuilder {
	fn bearer_from<'a, S>(self, source: &'a S) -> BearerFuture<'a, Self>
	where
		S: ?Sized + BearerTokenSource,
	{
		Box::pin(async move {
			let token = source.bearer_token().await?;
			let value = bearer_header_value(&token)
				.map_err(|_| Error::from(MalformedResponseError::InvalidAccessToken))?;

			Ok(self.header(reqwest::header::AUTHORIZATION, value))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn header_value_is_sensitive() {
		let value = bearer_header_value(&TokenSecret::new("abc")).expect("Token should render.");

		assert_eq!(value.to_str().expect("Header should be ASCII."), "Bearer abc");
		assert!(value.is_sensitive());
		assert!(bearer_header_value(&TokenSecret::new("bad\ntoken")).is_err());
	}
}
