use derive_more::Display;

/// Failures surfaced by the chart engine.
///
/// Late or duplicate live bars are not errors: they come back as
/// [`UpsertOutcome::Ignored`](crate::domain::market_data::UpsertOutcome) and
/// only show up in the session counters.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ChartError {
    /// Malformed historical batch (unordered, duplicated or invalid bars).
    #[display(fmt = "Invalid input: {}", _0)]
    InvalidInput(String),
    /// A single live frame could not be decoded.
    #[display(fmt = "Decode error: {}", _0)]
    Decode(String),
    /// The live feed could not be opened or dropped.
    #[display(fmt = "Subscription failure: {}", _0)]
    SubscriptionFailure(String),
    /// The historical source failed.
    #[display(fmt = "Network error: {}", _0)]
    Network(String),
    /// A historical load finished after its session key was replaced.
    #[display(fmt = "Stale session: load discarded")]
    StaleSession,
    /// The chart was disposed; it accepts no further switches.
    #[display(fmt = "Chart disposed")]
    Disposed,
}

impl std::error::Error for ChartError {}

pub type ChartResult<T> = Result<T, ChartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ChartError::InvalidInput("duplicate open time".into()).to_string(),
            "Invalid input: duplicate open time"
        );
        assert_eq!(ChartError::StaleSession.to_string(), "Stale session: load discarded");
    }

    #[test]
    fn errors_compare_by_kind_and_message() {
        assert_eq!(ChartError::Disposed.to_string(), "Chart disposed");
        assert_ne!(ChartError::Network("a".into()), ChartError::Network("b".into()));
    }
}
