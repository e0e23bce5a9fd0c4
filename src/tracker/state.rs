// self
use crate::{_prelude::*, auth::TokenSecret, exchange::Introspection, tracker::GrantType};

/// Snapshot of a tracker's cached facts.
///
/// Either every token field is populated or none is: `access_token` and `expires_at`
/// are always set together.
#[derive(Clone, Debug, Default)]
pub struct TokenState {
	/// Cached bearer token.
	pub access_token: Option<TokenSecret>,
	/// Absolute expiry of `access_token`.
	pub expires_at: Option<OffsetDateTime>,
	/// Refresh token used for the next renewal, when one is known.
	pub refresh_token: Option<TokenSecret>,
	/// Introspection result for `access_token`, if one was fetched.
	pub introspection: Option<Arc<Introspection>>,
	/// Grant the next renewal will use.
	pub grant_type: Option<GrantType>,
}
impl TokenState {
	/// Returns `true` when no token has been acquired.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none()
	}
}

#[derive(Clone)]
pub(crate) struct CachedToken {
	pub(crate) access_token: TokenSecret,
	pub(crate) expires_at: OffsetDateTime,
	pub(crate) introspection: Option<Arc<Introspection>>,
}
impl CachedToken {
	pub(crate) fn new(access_token: TokenSecret, expires_at: OffsetDateTime) -> Self {
		Self { access_token, expires_at, introspection: None }
	}

	/// Fresh while `now` is strictly before `expires_at - margin`.
	pub(crate) fn is_fresh_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		match self.expires_at.checked_sub(margin) {
			Some(deadline) => now < deadline,
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn freshness_excludes_the_margin_boundary() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = CachedToken::new("abc".into(), issued + Duration::seconds(3600));
		let margin = Duration::seconds(10);

		assert!(token.is_fresh_at(issued, margin));
		assert!(token.is_fresh_at(issued + Duration::seconds(3589), margin));
		assert!(!token.is_fresh_at(issued + Duration::seconds(3590), margin));
		assert!(!token.is_fresh_at(issued + Duration::seconds(3591), margin));
	}

	#[test]
	fn zero_lifetime_token_is_immediately_stale() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let token = CachedToken::new("abc".into(), now);

		assert!(!token.is_fresh_at(now, Duration::ZERO));
		assert!(TokenState::default().is_empty());
	}
}
