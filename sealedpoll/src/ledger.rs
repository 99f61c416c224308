use crate::*;
use tracing::debug;

/// Append-only record of accepted ballots, one per voter per poll
#[derive(Clone)]
pub struct BallotLedger {
    registry: PollRegistry,
    verifier: AttestationVerifier,
}

impl BallotLedger {
    pub fn new(registry: PollRegistry, verifier: AttestationVerifier) -> Self {
        BallotLedger { registry, verifier }
    }

    /// Submit a ballot for `voter` in `poll_id`
    ///
    /// The poll must be open with its deadline still ahead, the voter must not
    /// have voted yet, and the attestation must verify. The open/first-ballot
    /// checks are repeated under the poll's lock right before the append, so a
    /// ballot can never land after the poll closed or next to an earlier
    /// ballot from the same voter. On any failure nothing is recorded.
    pub async fn submit(
        &self,
        poll_id: PollId,
        voter: Identity,
        submission: BallotSubmission,
    ) -> Result<Ballot, Error> {
        let poll = self.check_can_vote(poll_id, &voter, self.registry.now())?;

        // The service call may be slow; it must not hold up other voters
        self.verifier
            .verify(
                poll_id,
                &voter,
                &submission.encrypted_option,
                &submission.attestation,
                poll.option_count(),
            )
            .await?;

        let guard = self.registry.lock_poll(poll_id).await;
        let now = self.registry.now();
        let poll = self.check_can_vote(guard.poll_id, &voter, now)?;

        let position = LedgerPosition {
            sequence: poll.vote_count,
            timestamp: now,
        };
        let ballot = Ballot::accept(poll_id, voter, submission, position);
        let updated = self.registry.store().append_ballot(ballot.clone())?;
        drop(guard);

        debug!(
            %poll_id,
            %voter,
            sequence = position.sequence,
            vote_count = updated.vote_count,
            "ballot accepted"
        );
        self.registry
            .events()
            .publish(PollEvent::VoteCast { poll_id, voter });
        Ok(ballot)
    }

    fn check_can_vote(
        &self,
        poll_id: PollId,
        voter: &Identity,
        now: Timestamp,
    ) -> Result<Poll, Error> {
        let poll = self.registry.get_poll(poll_id)?;
        if !poll.is_open_at(now) {
            return Err(Error::PollNotOpen(poll_id));
        }
        if self.registry.store().has_ballot(poll_id, voter) {
            return Err(Error::AlreadyVoted {
                poll_id,
                voter: *voter,
            });
        }
        Ok(poll)
    }

    pub fn has_voted(&self, poll_id: PollId, voter: &Identity) -> Result<bool, Error> {
        self.registry.get_poll(poll_id)?;
        Ok(self.registry.store().has_ballot(poll_id, voter))
    }

    pub fn ballot(&self, poll_id: PollId, voter: &Identity) -> Result<Option<Ballot>, Error> {
        self.registry.get_poll(poll_id)?;
        Ok(self.registry.store().get_ballot(poll_id, voter))
    }

    /// All ballots of a poll in acceptance order
    pub fn ballots(&self, poll_id: PollId) -> Result<Vec<Ballot>, Error> {
        self.registry.get_poll(poll_id)?;
        Ok(self.registry.store().ballots(poll_id))
    }

    /// Polls in which `voter` has a ballot
    pub fn polls_voted_by(&self, voter: &Identity) -> Vec<PollId> {
        self.registry.store().polls_voted_by(voter)
    }
}
