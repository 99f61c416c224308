use crate::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-option counts for a closed poll
///
/// Handed to [`RevealCoordinator::reveal`] by value and consumed there.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    pub poll_id: PollId,

    /// Counts aligned with the poll's options
    pub counts: Vec<u64>,

    /// Number of ballots the counts were computed over
    pub source_ballot_count: u64,
}

impl TallyResult {
    /// Sum of all counts, `None` on overflow
    pub fn total(&self) -> Option<u64> {
        checked_total(&self.counts)
    }
}

/// Computes tallies for closed polls via the cryptographic service
#[derive(Clone)]
pub struct TallyEngine {
    registry: PollRegistry,
    service: Arc<dyn CryptoService>,
    timeout: Duration,
}

impl TallyEngine {
    pub fn new(registry: PollRegistry, service: Arc<dyn CryptoService>) -> Self {
        let timeout = registry.settings().service_timeout();
        TallyEngine {
            registry,
            service,
            timeout,
        }
    }

    /// Tally every accepted ballot of a closed poll
    ///
    /// Individual ballots are only ever opened inside the service. The result
    /// is checked against the ledger before it is returned.
    pub async fn compute_tally(&self, poll_id: PollId) -> Result<TallyResult, Error> {
        let poll = self.registry.get_poll(poll_id)?;
        poll.require_state(PollState::Closed)?;

        // Closed polls take no more ballots, so this set is final
        let ballots = self.registry.store().ballots(poll_id);
        check_ballot_set(&poll, &ballots)?;

        let aggregate = self
            .service
            .aggregate(poll_id, poll.option_count(), &ballots);
        let counts = match tokio::time::timeout(self.timeout, aggregate).await {
            Ok(Ok(counts)) => counts,
            Ok(Err(ServiceError::Rejected(reason))) => {
                warn!(%poll_id, %reason, "aggregation rejected");
                return Err(Error::TallyIntegrityError { poll_id, reason });
            }
            Ok(Err(ServiceError::Unavailable(reason))) => {
                warn!(%poll_id, %reason, "aggregation service failed");
                return Err(Error::ServiceUnavailable(reason));
            }
            Err(_) => {
                warn!(%poll_id, timeout = ?self.timeout, "aggregation timed out");
                return Err(Error::ServiceUnavailable(format!(
                    "aggregation timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let tally = TallyResult {
            poll_id,
            counts,
            source_ballot_count: ballots.len() as u64,
        };
        check_aggregate(&poll, &tally)?;

        info!(%poll_id, ballots = tally.source_ballot_count, "tally computed");
        Ok(tally)
    }
}

// The gathered set must be exactly the ledger: complete and free of duplicates
fn check_ballot_set(poll: &Poll, ballots: &[Ballot]) -> Result<(), Error> {
    if ballots.len() as u64 != poll.vote_count {
        return Err(Error::TallyIntegrityError {
            poll_id: poll.id,
            reason: format!(
                "ledger holds {} ballots but vote count is {}",
                ballots.len(),
                poll.vote_count
            ),
        });
    }

    let mut voters = HashSet::with_capacity(ballots.len());
    for ballot in ballots {
        if ballot.poll_id != poll.id {
            return Err(Error::TallyIntegrityError {
                poll_id: poll.id,
                reason: format!("ledger returned a ballot of poll {}", ballot.poll_id),
            });
        }
        if !voters.insert(ballot.voter) {
            return Err(Error::TallyIntegrityError {
                poll_id: poll.id,
                reason: format!("{} appears twice in the ledger", ballot.voter),
            });
        }
    }
    Ok(())
}

fn check_aggregate(poll: &Poll, tally: &TallyResult) -> Result<(), Error> {
    if tally.counts.len() != poll.option_count() {
        return Err(Error::TallyIntegrityError {
            poll_id: poll.id,
            reason: format!(
                "aggregate has {} counts for {} options",
                tally.counts.len(),
                poll.option_count()
            ),
        });
    }
    match tally.total() {
        Some(total) if total == poll.vote_count => Ok(()),
        Some(total) => Err(Error::TallyIntegrityError {
            poll_id: poll.id,
            reason: format!(
                "aggregate sums to {} but vote count is {}",
                total, poll.vote_count
            ),
        }),
        None => Err(Error::TallyIntegrityError {
            poll_id: poll.id,
            reason: "aggregate counts overflow".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    // Returns whatever counts it was built with
    struct FixedAggregate(Vec<u64>);

    #[async_trait]
    impl CryptoService for FixedAggregate {
        async fn verify(&self, _request: VerificationRequest<'_>) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn aggregate(
            &self,
            _poll_id: PollId,
            _option_count: usize,
            _ballots: &[Ballot],
        ) -> Result<Vec<u64>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    // Fails every aggregation the same way, optionally after a delay
    struct FailingAggregate {
        error: ServiceError,
        delay: Duration,
    }

    #[async_trait]
    impl CryptoService for FailingAggregate {
        async fn verify(&self, _request: VerificationRequest<'_>) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn aggregate(
            &self,
            _poll_id: PollId,
            _option_count: usize,
            _ballots: &[Ballot],
        ) -> Result<Vec<u64>, ServiceError> {
            tokio::time::sleep(self.delay).await;
            Err(self.error.clone())
        }
    }

    async fn closed_poll_with_votes(
        service: Arc<dyn CryptoService>,
        votes: &[u8],
    ) -> (PollRegistry, TallyEngine, PollId) {
        let clock = ManualClock::new(0);
        let settings = Settings::default();
        let registry = PollRegistry::new(
            Arc::new(MemStore::new()),
            Arc::new(clock.clone()),
            settings.clone(),
        );
        let sealer = Arc::new(LocalCryptoService::new());
        let ledger = BallotLedger::new(
            registry.clone(),
            AttestationVerifier::new(sealer.clone(), &settings),
        );

        let (_, creator) = generate_identity();
        let poll_id = registry
            .create_poll(creator, PollSpec::new("Pick", vec!["a", "b", "c"], 60))
            .unwrap();

        for option in votes {
            let (_, voter) = generate_identity();
            let submission = sealer.seal_vote(poll_id, &voter, *option, 3).unwrap();
            ledger.submit(poll_id, voter, submission).await.unwrap();
        }

        let engine = TallyEngine::new(registry.clone(), service);
        assert!(matches!(
            engine.compute_tally(poll_id).await,
            Err(Error::InvalidState { .. })
        ));

        clock.advance(60);
        registry.close_poll(poll_id, &creator).await.unwrap();
        (registry, engine, poll_id)
    }

    #[tokio::test]
    async fn rejects_inconsistent_aggregates() {
        let (_registry, engine, poll_id) =
            closed_poll_with_votes(Arc::new(FixedAggregate(vec![1, 0, 0])), &[0, 1]).await;
        assert!(matches!(
            engine.compute_tally(poll_id).await,
            Err(Error::TallyIntegrityError { .. })
        ));

        let (_registry, engine, poll_id) =
            closed_poll_with_votes(Arc::new(FixedAggregate(vec![1, 1])), &[0, 1]).await;
        assert!(matches!(
            engine.compute_tally(poll_id).await,
            Err(Error::TallyIntegrityError { .. })
        ));

        let (_registry, engine, poll_id) =
            closed_poll_with_votes(Arc::new(FixedAggregate(vec![0, 1, 1])), &[0, 1]).await;
        let tally = engine.compute_tally(poll_id).await.unwrap();
        assert_eq!(tally.source_ballot_count, 2);
    }

    #[tokio::test]
    async fn tallies_a_closed_poll() {
        // The tallying service must hold the key the ballots were sealed under
        let clock = ManualClock::new(0);
        let settings = Settings::default();
        let registry = PollRegistry::new(
            Arc::new(MemStore::new()),
            Arc::new(clock.clone()),
            settings.clone(),
        );
        let service = Arc::new(LocalCryptoService::new());
        let ledger = BallotLedger::new(
            registry.clone(),
            AttestationVerifier::new(service.clone(), &settings),
        );
        let engine = TallyEngine::new(registry.clone(), service.clone());

        let (_, creator) = generate_identity();
        let poll_id = registry
            .create_poll(creator, PollSpec::new("Pick", vec!["a", "b", "c"], 60))
            .unwrap();
        for option in [2u8, 0, 2, 2].iter() {
            let (_, voter) = generate_identity();
            let submission = service.seal_vote(poll_id, &voter, *option, 3).unwrap();
            ledger.submit(poll_id, voter, submission).await.unwrap();
        }

        clock.advance(60);
        registry.close_poll(poll_id, &creator).await.unwrap();

        let tally = engine.compute_tally(poll_id).await.unwrap();
        assert_eq!(tally.counts, vec![1, 0, 3]);
        assert_eq!(tally.total(), Some(4));

        // Idempotent
        assert_eq!(engine.compute_tally(poll_id).await.unwrap(), tally);
    }

    #[tokio::test]
    async fn empty_poll_tallies_to_zero() {
        let (_registry, engine, poll_id) =
            closed_poll_with_votes(Arc::new(FixedAggregate(vec![0, 0, 0])), &[]).await;
        let tally = engine.compute_tally(poll_id).await.unwrap();
        assert_eq!(tally.counts, vec![0, 0, 0]);
        assert_eq!(tally.source_ballot_count, 0);
    }

    #[tokio::test]
    async fn overflowing_aggregate_is_an_integrity_error() {
        let (_registry, engine, poll_id) = closed_poll_with_votes(
            Arc::new(FixedAggregate(vec![u64::MAX, 3, 0])),
            &[0, 1],
        )
        .await;
        assert!(matches!(
            engine.compute_tally(poll_id).await,
            Err(Error::TallyIntegrityError { .. })
        ));
    }

    #[tokio::test]
    async fn service_failures_are_reported_by_kind() {
        let rejecting = Arc::new(FailingAggregate {
            error: ServiceError::Rejected("ballot does not decrypt".into()),
            delay: Duration::from_millis(0),
        });
        let (registry, engine, poll_id) = closed_poll_with_votes(rejecting, &[0, 1]).await;
        let err = engine.compute_tally(poll_id).await.unwrap_err();
        assert!(matches!(err, Error::TallyIntegrityError { .. }));
        assert!(!err.is_retryable());
        assert_eq!(registry.get_poll(poll_id).unwrap().state, PollState::Closed);

        let down = Arc::new(FailingAggregate {
            error: ServiceError::Unavailable("tally node offline".into()),
            delay: Duration::from_millis(0),
        });
        let (registry, engine, poll_id) = closed_poll_with_votes(down, &[0, 1]).await;
        let err = engine.compute_tally(poll_id).await.unwrap_err();
        assert_eq!(err, Error::ServiceUnavailable("tally node offline".into()));
        assert!(err.is_retryable());
        assert_eq!(registry.get_poll(poll_id).unwrap().state, PollState::Closed);
        assert!(registry.results(poll_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn slow_aggregation_times_out_as_retryable() {
        let clock = ManualClock::new(0);
        let mut settings = Settings::default();
        settings.service_timeout_ms = 20;
        let registry = PollRegistry::new(
            Arc::new(MemStore::new()),
            Arc::new(clock.clone()),
            settings,
        );
        let slow = Arc::new(FailingAggregate {
            error: ServiceError::Unavailable("never reached".into()),
            delay: Duration::from_secs(5),
        });
        let engine = TallyEngine::new(registry.clone(), slow);

        let (_, creator) = generate_identity();
        let poll_id = registry
            .create_poll(creator, PollSpec::new("Pick", vec!["a", "b"], 60))
            .unwrap();
        clock.advance(60);
        registry.close_poll(poll_id, &creator).await.unwrap();

        let err = engine.compute_tally(poll_id).await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(registry.get_poll(poll_id).unwrap().state, PollState::Closed);
    }
}
