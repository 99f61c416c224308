use crate::*;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Exclusive access to one poll
///
/// Held while a ballot is appended, while a poll closes and while results are
/// committed, so those operations are totally ordered per poll.
pub(crate) struct PollGuard {
    pub(crate) poll_id: PollId,
    _guard: OwnedMutexGuard<()>,
}

/// One lock per poll. Polls never contend with each other.
#[derive(Default)]
struct PollLocks {
    locks: DashMap<PollId, Arc<Mutex<()>>>,
}

impl PollLocks {
    async fn lock(&self, poll_id: PollId) -> PollGuard {
        let lock = Arc::clone(&*self.locks.entry(poll_id).or_default());
        PollGuard {
            poll_id,
            _guard: lock.lock_owned().await,
        }
    }
}

struct RegistryInner {
    store: Arc<dyn Store>,
    clock: MonotonicClock,
    settings: Settings,
    locks: PollLocks,
    events: EventBus,
}

/// Authoritative source of poll metadata and lifecycle state
///
/// No other component changes a poll's `state` or `results`. Cloning is cheap
/// and clones share state.
#[derive(Clone)]
pub struct PollRegistry {
    inner: Arc<RegistryInner>,
}

impl PollRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, settings: Settings) -> Self {
        let events = EventBus::new(settings.event_capacity);
        PollRegistry {
            inner: Arc::new(RegistryInner {
                store,
                clock: MonotonicClock::new(clock),
                settings,
                locks: PollLocks::default(),
                events,
            }),
        }
    }

    /// Current time, never earlier than any time previously observed
    pub fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.inner.events.subscribe()
    }

    /// Create a new open poll owned by `creator`
    pub fn create_poll(&self, creator: Identity, spec: PollSpec) -> Result<PollId, Error> {
        spec.validate(&self.inner.settings)?;

        let now = self.now();
        let end_time = now
            .checked_add(spec.duration)
            .ok_or_else(|| Error::InvalidInput("duration overflows the clock".to_owned()))?;

        let id = self.inner.store.reserve_poll_id()?;
        let poll = Poll {
            id,
            creator,
            question: spec.question,
            options: spec.options,
            created_at: now,
            end_time,
            state: PollState::Open,
            vote_count: 0,
            results: None,
        };
        let event = PollEvent::PollCreated {
            poll_id: id,
            creator,
            question: poll.question.clone(),
            end_time,
        };
        self.inner.store.insert_poll(poll)?;

        info!(poll_id = %id, %creator, end_time, "poll created");
        self.inner.events.publish(event);
        Ok(id)
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<Poll, Error> {
        self.inner.store.require_poll(poll_id)
    }

    /// Close an open poll once its deadline has passed. Only the creator may close.
    pub async fn close_poll(&self, poll_id: PollId, caller: &Identity) -> Result<Poll, Error> {
        let _guard = self.lock_poll(poll_id).await;

        let mut poll = self.get_poll(poll_id)?;
        poll.require_creator(caller)?;
        poll.require_state(PollState::Open)?;

        let now = self.now();
        if now < poll.end_time {
            return Err(Error::TooEarly {
                poll_id,
                end_time: poll.end_time,
                now,
            });
        }

        poll.close()?;
        self.inner.store.update_poll(&poll)?;

        info!(%poll_id, vote_count = poll.vote_count, "poll closed");
        Ok(poll)
    }

    /// Record `tally` as the permanent results of a closed poll
    ///
    /// Only reachable through [`RevealCoordinator::reveal`].
    pub(crate) async fn commit_results(
        &self,
        poll_id: PollId,
        caller: &Identity,
        tally: TallyResult,
    ) -> Result<Poll, Error> {
        let _guard = self.lock_poll(poll_id).await;

        let mut poll = self.get_poll(poll_id)?;
        poll.require_creator(caller)?;
        poll.require_state(PollState::Closed)?;

        if tally.poll_id != poll_id {
            return Err(Error::TallyMismatch {
                poll_id,
                reason: format!("tally was computed for poll {}", tally.poll_id),
            });
        }
        if tally.source_ballot_count != poll.vote_count {
            return Err(Error::TallyMismatch {
                poll_id,
                reason: format!(
                    "tally covers {} ballots but {} were accepted",
                    tally.source_ballot_count, poll.vote_count
                ),
            });
        }

        poll.reveal(tally.counts)?;
        self.inner.store.update_poll(&poll)?;

        let counts = poll.results.clone().unwrap_or_default();
        info!(%poll_id, ?counts, "results revealed");
        self.inner
            .events
            .publish(PollEvent::ResultsRevealed { poll_id, counts });
        Ok(poll)
    }

    /// Revealed results, or `None` while the poll is still open or closed
    pub fn results(&self, poll_id: PollId) -> Result<Option<Vec<u64>>, Error> {
        Ok(self.get_poll(poll_id)?.results)
    }

    /// Number of poll ids assigned so far
    pub fn poll_count(&self) -> u64 {
        self.inner.store.poll_count()
    }

    pub fn polls_by_creator(&self, creator: &Identity) -> Vec<PollId> {
        self.inner.store.polls_by_creator(creator)
    }

    /// Polls still accepting ballots, newest first
    pub fn live_polls(&self, limit: usize) -> Vec<Poll> {
        let now = self.now();
        self.inner
            .store
            .poll_ids()
            .into_iter()
            .rev()
            .filter_map(|id| self.inner.store.get_poll(id))
            .filter(|poll| poll.is_open_at(now))
            .take(limit)
            .collect()
    }

    pub(crate) async fn lock_poll(&self, poll_id: PollId) -> PollGuard {
        let guard = self.inner.locks.lock(poll_id).await;
        debug!(%poll_id, "poll lock acquired");
        guard
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.inner.events
    }
}
