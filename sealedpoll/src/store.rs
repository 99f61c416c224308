use crate::*;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A poll and ballot store
///
/// Implementations back the registry and the ledger. Each method must apply
/// atomically: in particular `append_ballot` stores the ballot and bumps the
/// poll's `vote_count` as a single step, so a crash can never leave the two
/// out of step. Failures to reach the backing store are reported as
/// [`Error::ServiceUnavailable`].
pub trait Store: Send + Sync {
    /// Reserve the next poll id. Ids are never handed out twice.
    fn reserve_poll_id(&self) -> Result<PollId, Error>;

    /// Number of ids reserved so far
    fn poll_count(&self) -> u64;

    fn insert_poll(&self, poll: Poll) -> Result<(), Error>;

    fn get_poll(&self, id: PollId) -> Option<Poll>;

    /// Persist a lifecycle change (`state` and `results`).
    ///
    /// `vote_count` is owned by `append_ballot` and is not written here.
    fn update_poll(&self, poll: &Poll) -> Result<(), Error>;

    /// Store a ballot and increment its poll's `vote_count`, returning the updated poll
    fn append_ballot(&self, ballot: Ballot) -> Result<Poll, Error>;

    fn get_ballot(&self, poll_id: PollId, voter: &Identity) -> Option<Ballot>;

    /// All ballots of a poll, in acceptance order
    fn ballots(&self, poll_id: PollId) -> Vec<Ballot>;

    /// All poll ids, ascending
    fn poll_ids(&self) -> Vec<PollId>;

    fn polls_by_creator(&self, creator: &Identity) -> Vec<PollId>;

    fn polls_voted_by(&self, voter: &Identity) -> Vec<PollId>;

    /// Get a poll that must exist
    fn require_poll(&self, id: PollId) -> Result<Poll, Error> {
        self.get_poll(id).ok_or(Error::NotFound(id))
    }

    fn has_ballot(&self, poll_id: PollId, voter: &Identity) -> bool {
        self.get_ballot(poll_id, voter).is_some()
    }
}

#[derive(Default)]
struct MemInner {
    next_id: u64,
    polls: BTreeMap<PollId, Poll>,
    ballots: BTreeMap<PollId, IndexMap<Identity, Ballot>>,
    by_creator: BTreeMap<Identity, Vec<PollId>>,
    by_voter: BTreeMap<Identity, Vec<PollId>>,
}

/// A simple store that keeps everything in memory
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    // A poisoned lock only means a reader panicked; the maps themselves are
    // only ever mutated in single, complete steps.
    fn read(&self) -> RwLockReadGuard<'_, MemInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemStore {
    fn reserve_poll_id(&self) -> Result<PollId, Error> {
        let mut inner = self.write();
        let id = PollId(inner.next_id);
        inner.next_id = inner
            .next_id
            .checked_add(1)
            .ok_or_else(|| Error::ServiceUnavailable("poll id space exhausted".to_owned()))?;
        Ok(id)
    }

    fn poll_count(&self) -> u64 {
        self.read().next_id
    }

    fn insert_poll(&self, poll: Poll) -> Result<(), Error> {
        let mut inner = self.write();
        if inner.polls.contains_key(&poll.id) {
            return Err(Error::InvalidInput(format!("poll {} already exists", poll.id)));
        }
        inner
            .by_creator
            .entry(poll.creator)
            .or_default()
            .push(poll.id);
        inner.ballots.insert(poll.id, IndexMap::new());
        inner.polls.insert(poll.id, poll);
        Ok(())
    }

    fn get_poll(&self, id: PollId) -> Option<Poll> {
        self.read().polls.get(&id).cloned()
    }

    fn update_poll(&self, poll: &Poll) -> Result<(), Error> {
        let mut inner = self.write();
        let stored = inner.polls.get_mut(&poll.id).ok_or(Error::NotFound(poll.id))?;
        stored.state = poll.state;
        stored.results = poll.results.clone();
        Ok(())
    }

    fn append_ballot(&self, ballot: Ballot) -> Result<Poll, Error> {
        let mut inner = self.write();
        let MemInner {
            polls,
            ballots,
            by_voter,
            ..
        } = &mut *inner;

        let poll = polls
            .get_mut(&ballot.poll_id)
            .ok_or(Error::NotFound(ballot.poll_id))?;
        let poll_ballots = ballots.entry(ballot.poll_id).or_default();

        if poll_ballots.contains_key(&ballot.voter) {
            return Err(Error::AlreadyVoted {
                poll_id: ballot.poll_id,
                voter: ballot.voter,
            });
        }

        by_voter.entry(ballot.voter).or_default().push(ballot.poll_id);
        poll_ballots.insert(ballot.voter, ballot);
        poll.vote_count += 1;

        Ok(poll.clone())
    }

    fn get_ballot(&self, poll_id: PollId, voter: &Identity) -> Option<Ballot> {
        self.read()
            .ballots
            .get(&poll_id)
            .and_then(|ballots| ballots.get(voter))
            .cloned()
    }

    fn ballots(&self, poll_id: PollId) -> Vec<Ballot> {
        self.read()
            .ballots
            .get(&poll_id)
            .map(|ballots| ballots.values().cloned().collect())
            .unwrap_or_default()
    }

    fn poll_ids(&self) -> Vec<PollId> {
        self.read().polls.keys().copied().collect()
    }

    fn polls_by_creator(&self, creator: &Identity) -> Vec<PollId> {
        self.read()
            .by_creator
            .get(creator)
            .cloned()
            .unwrap_or_default()
    }

    fn polls_voted_by(&self, voter: &Identity) -> Vec<PollId> {
        self.read().by_voter.get(voter).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_poll(store: &MemStore, creator: Identity) -> Poll {
        let poll = Poll {
            id: store.reserve_poll_id().unwrap(),
            creator,
            question: "Lunch?".to_owned(),
            options: vec!["Pizza".to_owned(), "Salad".to_owned()],
            created_at: 10,
            end_time: 20,
            state: PollState::Open,
            vote_count: 0,
            results: None,
        };
        store.insert_poll(poll.clone()).unwrap();
        poll
    }

    fn ballot(poll_id: PollId, voter: Identity, sequence: u64) -> Ballot {
        Ballot {
            poll_id,
            voter,
            encrypted_option: EncryptedOption(vec![1, 2, 3]),
            attestation: Attestation(vec![4, 5, 6]),
            accepted_at: LedgerPosition {
                sequence,
                timestamp: 11,
            },
        }
    }

    #[test]
    fn ids_are_sequential() {
        let store = MemStore::new();
        assert_eq!(store.reserve_poll_id().unwrap(), PollId(0));
        assert_eq!(store.reserve_poll_id().unwrap(), PollId(1));
        assert_eq!(store.poll_count(), 2);
    }

    #[test]
    fn append_keeps_vote_count_in_step() {
        let store = MemStore::new();
        let (_, creator) = generate_identity();
        let (_, alice) = generate_identity();
        let (_, bob) = generate_identity();
        let poll = new_poll(&store, creator);

        let updated = store.append_ballot(ballot(poll.id, alice, 0)).unwrap();
        assert_eq!(updated.vote_count, 1);
        store.append_ballot(ballot(poll.id, bob, 1)).unwrap();

        // A duplicate is refused and changes nothing
        assert_eq!(
            store.append_ballot(ballot(poll.id, alice, 2)),
            Err(Error::AlreadyVoted {
                poll_id: poll.id,
                voter: alice
            })
        );
        assert_eq!(store.get_poll(poll.id).unwrap().vote_count, 2);
        assert_eq!(store.ballots(poll.id).len(), 2);
        assert_eq!(store.ballots(poll.id)[0].voter, alice);

        assert!(store.has_ballot(poll.id, &bob));
        assert_eq!(store.polls_voted_by(&alice), vec![poll.id]);
        assert_eq!(store.polls_by_creator(&creator), vec![poll.id]);

        // Ballots for unknown polls are refused
        assert_eq!(
            store.append_ballot(ballot(PollId(99), alice, 0)),
            Err(Error::NotFound(PollId(99)))
        );
    }

    #[test]
    fn update_does_not_touch_vote_count() {
        let store = MemStore::new();
        let (_, creator) = generate_identity();
        let (_, alice) = generate_identity();
        let mut poll = new_poll(&store, creator);
        store.append_ballot(ballot(poll.id, alice, 0)).unwrap();

        poll.state = PollState::Closed;
        store.update_poll(&poll).unwrap();

        let stored = store.require_poll(poll.id).unwrap();
        assert_eq!(stored.state, PollState::Closed);
        assert_eq!(stored.vote_count, 1);
        assert_eq!(store.require_poll(PollId(5)), Err(Error::NotFound(PollId(5))));
    }
}
