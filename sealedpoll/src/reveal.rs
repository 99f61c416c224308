use crate::*;
use tracing::debug;

/// Drives a closed poll to Revealed
///
/// The only way a poll's results are ever set.
#[derive(Clone)]
pub struct RevealCoordinator {
    registry: PollRegistry,
    tally_engine: TallyEngine,
}

impl RevealCoordinator {
    pub fn new(registry: PollRegistry, tally_engine: TallyEngine) -> Self {
        RevealCoordinator {
            registry,
            tally_engine,
        }
    }

    /// Reveal the results of a closed poll
    ///
    /// When no tally is supplied one is computed. Either way the tally is
    /// checked against the ledger before it is committed, and a failure leaves
    /// the poll Closed with no results.
    pub async fn reveal(
        &self,
        poll_id: PollId,
        caller: &Identity,
        tally: Option<TallyResult>,
    ) -> Result<Poll, Error> {
        let poll = self.registry.get_poll(poll_id)?;
        poll.require_creator(caller)?;
        poll.require_state(PollState::Closed)?;

        let tally = match tally {
            Some(tally) => tally,
            None => {
                debug!(%poll_id, "no tally supplied, computing");
                self.tally_engine.compute_tally(poll_id).await?
            }
        };

        self.registry.commit_results(poll_id, caller, tally).await
    }
}
