use crate::*;
use tokio::sync::broadcast;

/// Informational events published after a state change commits
///
/// Subscribers that fall behind lose the oldest events; nothing in the
/// lifecycle depends on delivery.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum PollEvent {
    PollCreated {
        poll_id: PollId,
        creator: Identity,
        question: String,
        end_time: Timestamp,
    },
    VoteCast {
        poll_id: PollId,
        voter: Identity,
    },
    ResultsRevealed {
        poll_id: PollId,
        counts: Vec<u64>,
    },
}

impl PollEvent {
    pub fn poll_id(&self) -> PollId {
        match self {
            PollEvent::PollCreated { poll_id, .. } => *poll_id,
            PollEvent::VoteCast { poll_id, .. } => *poll_id,
            PollEvent::ResultsRevealed { poll_id, .. } => *poll_id,
        }
    }
}

#[derive(Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<PollEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, event: PollEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }
}
