use crate::resilience::Backoff;
use crate::transport::TransportError;
use std::time::Duration;

/// What a single failed attempt looked like, as seen by a [`RetryPredicate`].
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    /// The service answered with a non-2xx status.
    Status(u16),
    /// The round trip itself failed.
    Transport(&'a TransportError),
}

/// Decides whether a failed attempt is worth retrying.
pub trait RetryPredicate: Send + Sync {
    fn should_retry(&self, outcome: AttemptOutcome<'_>) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(AttemptOutcome<'_>) -> bool + Send + Sync,
{
    fn should_retry(&self, outcome: AttemptOutcome<'_>) -> bool {
        self(outcome)
    }
}

/// Retries 5xx responses and connection-reset/timeout transport failures.
/// 4xx responses, 429 included, are returned to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPredicate;

impl RetryPredicate for DefaultRetryPredicate {
    fn should_retry(&self, outcome: AttemptOutcome<'_>) -> bool {
        match outcome {
            AttemptOutcome::Status(code) => (500..600).contains(&code),
            AttemptOutcome::Transport(e) => e.is_retryable(),
        }
    }
}

/// How to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Exhausted,
    Fail,
}

/// `attempt` is the number of attempts made so far (1-based).
pub(crate) fn decide(
    predicate: &dyn RetryPredicate,
    backoff: &dyn Backoff,
    outcome: AttemptOutcome<'_>,
    attempt: u32,
) -> Decision {
    if !predicate.should_retry(outcome) {
        return Decision::Fail;
    }
    match backoff.pause(attempt) {
        Some(delay) => Decision::Retry { delay },
        None => Decision::Exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{ExponentialBackoff, NoPauseBackoff};

    #[test]
    fn default_predicate_retries_only_server_errors() {
        let p = DefaultRetryPredicate;
        assert!(p.should_retry(AttemptOutcome::Status(500)));
        assert!(p.should_retry(AttemptOutcome::Status(503)));
        assert!(!p.should_retry(AttemptOutcome::Status(400)));
        assert!(!p.should_retry(AttemptOutcome::Status(429)));
        let reset = TransportError::ConnectionReset("peer".into());
        assert!(p.should_retry(AttemptOutcome::Transport(&reset)));
    }

    #[test]
    fn closures_are_predicates() {
        let only_429 = |o: AttemptOutcome<'_>| matches!(o, AttemptOutcome::Status(429));
        assert_eq!(
            decide(&only_429, &NoPauseBackoff, AttemptOutcome::Status(429), 1),
            Decision::Retry {
                delay: Duration::ZERO
            }
        );
        assert_eq!(
            decide(&only_429, &NoPauseBackoff, AttemptOutcome::Status(500), 1),
            Decision::Fail
        );
    }

    #[test]
    fn exhausted_when_backoff_stops() {
        let b = ExponentialBackoff::default().with_max_attempts(2);
        assert_eq!(
            decide(&DefaultRetryPredicate, &b, AttemptOutcome::Status(502), 2),
            Decision::Exhausted
        );
    }
}
