//! Optional observability helpers for exchanges.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_tracker.exchange` with the `kind`
//!   (grant or introspection) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `oauth2_tracker_exchange_total` counter for every
//!   attempt/success/failure, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, tracker::GrantType};

/// Network calls performed by the exchange client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
	/// `grant_type=client_credentials` token request.
	ClientCredentials,
	/// `grant_type=password` token request.
	Password,
	/// `grant_type=refresh_token` token request.
	RefreshToken,
	/// Token introspection request.
	Introspection,
}
impl ExchangeKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeKind::ClientCredentials => "client_credentials",
			ExchangeKind::Password => "password",
			ExchangeKind::RefreshToken => "refresh_token",
			ExchangeKind::Introspection => "introspection",
		}
	}

	/// Endpoint the call is sent to (`token` or `introspection`).
	pub const fn endpoint(self) -> &'static str {
		match self {
			ExchangeKind::Introspection => "introspection",
			_ => "token",
		}
	}
}
impl From<GrantType> for ExchangeKind {
	fn from(grant: GrantType) -> Self {
		match grant {
			GrantType::ClientCredentials => ExchangeKind::ClientCredentials,
			GrantType::Password => ExchangeKind::Password,
			GrantType::RefreshToken => ExchangeKind::RefreshToken,
		}
	}
}
impl Display for ExchangeKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeOutcome {
	/// Entry to an exchange.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl ExchangeOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeOutcome::Attempt => "attempt",
			ExchangeOutcome::Success => "success",
			ExchangeOutcome::Failure => "failure",
		}
	}
}
impl Display for ExchangeOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grant_types_map_to_token_endpoint_kinds() {
		assert_eq!(ExchangeKind::from(GrantType::Password), ExchangeKind::Password);
		assert_eq!(ExchangeKind::from(GrantType::RefreshToken).endpoint(), "token");
		assert_eq!(ExchangeKind::Introspection.endpoint(), "introspection");
		assert_eq!(ExchangeOutcome::Failure.to_string(), "failure");
	}
}
