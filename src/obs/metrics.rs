// self
use crate::obs::{ExchangeKind, ExchangeOutcome};

/// Records an exchange outcome via the global metrics recorder (when enabled).
pub fn record_exchange_outcome(kind: ExchangeKind, outcome: ExchangeOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_tracker_exchange_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_exchange_outcome_noop_without_recorder() {
		record_exchange_outcome(ExchangeKind::Introspection, ExchangeOutcome::Failure);
	}
}
