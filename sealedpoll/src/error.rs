use crate::*;

use thiserror::Error;

/// Error types
///
/// Every operation of the poll lifecycle reports one of these. Only
/// [`Error::ServiceUnavailable`] is retryable: the remaining kinds are
/// terminal for the request that produced them and leave state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("sealedpoll: invalid input: {0}")]
    InvalidInput(String),

    #[error("sealedpoll: poll {0} not found")]
    NotFound(PollId),

    #[error("sealedpoll: {caller} is not the creator of poll {poll_id}")]
    Unauthorized { poll_id: PollId, caller: Identity },

    #[error("sealedpoll: poll {poll_id} is {actual}, expected {expected}")]
    InvalidState {
        poll_id: PollId,
        actual: PollState,
        expected: PollState,
    },

    #[error("sealedpoll: poll {poll_id} ends at {end_time}, it is now {now}")]
    TooEarly {
        poll_id: PollId,
        end_time: Timestamp,
        now: Timestamp,
    },

    #[error("sealedpoll: poll {0} is not accepting ballots")]
    PollNotOpen(PollId),

    #[error("sealedpoll: {voter} has already voted in poll {poll_id}")]
    AlreadyVoted { poll_id: PollId, voter: Identity },

    #[error("sealedpoll: invalid attestation: {0}")]
    InvalidAttestation(String),

    #[error("sealedpoll: tally for poll {poll_id} does not match the ledger: {reason}")]
    TallyMismatch { poll_id: PollId, reason: String },

    #[error("sealedpoll: tally integrity error for poll {poll_id}: {reason}")]
    TallyIntegrityError { poll_id: PollId, reason: String },

    #[error("sealedpoll: service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("sealedpoll: configuration error: {0}")]
    Configuration(String),

    #[error("sealedpoll: invalid identity - invalid hexidecimal")]
    IdentityBadHex,

    #[error("sealedpoll: invalid identity - wrong length")]
    IdentityBadLen,
}

impl Error {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ServiceUnavailable(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Errors reported by a [`CryptoService`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service examined the input and refused it.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The service could not be reached or failed internally.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_service_failures_are_retryable() {
        assert!(Error::ServiceUnavailable("timeout".into()).is_retryable());
        assert!(!Error::PollNotOpen(PollId(1)).is_retryable());
        assert!(!Error::InvalidAttestation("bad proof".into()).is_retryable());
        assert!(!Error::InvalidState {
            poll_id: PollId(1),
            actual: PollState::Closed,
            expected: PollState::Open,
        }
        .is_retryable());
    }
}
