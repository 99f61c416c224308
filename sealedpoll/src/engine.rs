use crate::*;
use std::sync::Arc;

/// All components wired together over one store, clock and cryptographic service
#[derive(Clone)]
pub struct PollEngine {
    registry: PollRegistry,
    ledger: BallotLedger,
    tally_engine: TallyEngine,
    coordinator: RevealCoordinator,
}

impl PollEngine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        service: Arc<dyn CryptoService>,
        settings: Settings,
    ) -> Self {
        let verifier = AttestationVerifier::new(service.clone(), &settings);
        let registry = PollRegistry::new(store, clock, settings);
        let ledger = BallotLedger::new(registry.clone(), verifier);
        let tally_engine = TallyEngine::new(registry.clone(), service);
        let coordinator = RevealCoordinator::new(registry.clone(), tally_engine.clone());

        PollEngine {
            registry,
            ledger,
            tally_engine,
            coordinator,
        }
    }

    /// An engine over a fresh [`MemStore`]
    pub fn in_memory(
        clock: Arc<dyn Clock>,
        service: Arc<dyn CryptoService>,
        settings: Settings,
    ) -> Self {
        PollEngine::new(Arc::new(MemStore::new()), clock, service, settings)
    }

    pub fn registry(&self) -> &PollRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &BallotLedger {
        &self.ledger
    }

    pub fn tally_engine(&self) -> &TallyEngine {
        &self.tally_engine
    }

    pub fn coordinator(&self) -> &RevealCoordinator {
        &self.coordinator
    }

    pub fn create_poll(&self, creator: Identity, spec: PollSpec) -> Result<PollId, Error> {
        self.registry.create_poll(creator, spec)
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<Poll, Error> {
        self.registry.get_poll(poll_id)
    }

    pub async fn submit(
        &self,
        poll_id: PollId,
        voter: Identity,
        submission: BallotSubmission,
    ) -> Result<Ballot, Error> {
        self.ledger.submit(poll_id, voter, submission).await
    }

    pub async fn close_poll(&self, poll_id: PollId, caller: &Identity) -> Result<Poll, Error> {
        self.registry.close_poll(poll_id, caller).await
    }

    pub async fn compute_tally(&self, poll_id: PollId) -> Result<TallyResult, Error> {
        self.tally_engine.compute_tally(poll_id).await
    }

    pub async fn reveal(
        &self,
        poll_id: PollId,
        caller: &Identity,
        tally: Option<TallyResult>,
    ) -> Result<Poll, Error> {
        self.coordinator.reveal(poll_id, caller, tally).await
    }
}
