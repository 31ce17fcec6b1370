//! Decision model: what the host does after a pass.
//!
//! Decider は純粋関数（record + outcome → decision）。実行は host の worker が行う。

use std::time::Duration;

use super::{RetryPolicy, WorkRecord};
use crate::domain::PassOutcome;

/// The next action to take for a work.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The work is done.
    Finish,

    /// Run the whole pass again after a delay.
    Retry { delay: Duration, reason: String },

    /// Stop without success.
    GiveUp { reason: String },
}

pub trait Decider: Send + Sync {
    /// Decide the next action for a work whose latest pass ended with `outcome`.
    ///
    /// `work.attempts` already counts that pass.
    fn decide(&self, work: &WorkRecord, outcome: PassOutcome) -> Decision;
}

/// Attempt-based retry with exponential backoff:
/// - AllSucceeded → Finish
/// - HardFailureNoRetry → GiveUp (retrying cannot fix it)
/// - PartialFailureRetry → Retry while attempts < max_attempts, then GiveUp
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, work: &WorkRecord, outcome: PassOutcome) -> Decision {
        match outcome {
            PassOutcome::AllSucceeded => Decision::Finish,
            PassOutcome::HardFailureNoRetry => Decision::GiveUp {
                reason: work
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "hard failure".to_string()),
            },
            PassOutcome::PartialFailureRetry if work.attempts >= work.max_attempts => {
                Decision::GiveUp {
                    reason: format!(
                        "max attempts reached: {}/{}",
                        work.attempts, work.max_attempts
                    ),
                }
            }
            PassOutcome::PartialFailureRetry => {
                let delay = self.retry_policy.next_delay(work.attempts);
                Decision::Retry {
                    delay,
                    reason: format!(
                        "retry attempt {}/{} after {:?}",
                        work.attempts + 1,
                        work.max_attempts,
                        delay
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkId;
    use crate::host::WorkRequest;
    use rstest::rstest;
    use ulid::Ulid;

    fn work(attempts: u32, max_attempts: u32) -> WorkRecord {
        let mut record =
            WorkRecord::new(WorkId::from_ulid(Ulid::new()), WorkRequest::sync_all(), max_attempts);
        for _ in 0..attempts {
            record.start_attempt();
        }
        record
    }

    #[test]
    fn success_finishes() {
        let d = DefaultDecider::default();
        assert_eq!(d.decide(&work(1, 5), PassOutcome::AllSucceeded), Decision::Finish);
    }

    #[test]
    fn hard_failure_never_retries() {
        let d = DefaultDecider::default();
        let decision = d.decide(&work(1, 5), PassOutcome::HardFailureNoRetry);
        assert!(matches!(decision, Decision::GiveUp { .. }));
    }

    #[rstest]
    #[case(1, 5, Some(30))]
    #[case(2, 5, Some(60))]
    #[case(4, 5, Some(240))]
    #[case(5, 5, None)]
    fn partial_failure_retries_until_budget(
        #[case] attempts: u32,
        #[case] max_attempts: u32,
        #[case] delay_secs: Option<u64>,
    ) {
        let d = DefaultDecider::new(RetryPolicy::standard());
        let decision = d.decide(&work(attempts, max_attempts), PassOutcome::PartialFailureRetry);
        match (decision, delay_secs) {
            (Decision::Retry { delay, .. }, Some(secs)) => {
                assert_eq!(delay, Duration::from_secs(secs))
            }
            (Decision::GiveUp { reason }, None) => assert!(reason.contains("max attempts")),
            (other, expected) => panic!("unexpected {other:?}, expected delay {expected:?}"),
        }
    }
}
