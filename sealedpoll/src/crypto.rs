use crate::*;
use async_trait::async_trait;

/// Everything the cryptographic service needs to check one ballot
#[derive(Clone, Copy, Debug)]
pub struct VerificationRequest<'a> {
    pub poll_id: PollId,
    pub voter: &'a Identity,
    pub encrypted_option: &'a EncryptedOption,
    pub attestation: &'a Attestation,
    pub option_count: usize,
}

/// The external cryptographic service
///
/// Both operations must be pure with respect to poll and ballot state, and
/// idempotent: calling them again with the same inputs yields the same answer.
#[async_trait]
pub trait CryptoService: Send + Sync {
    /// Succeeds only if the attestation proves that `encrypted_option` holds an
    /// index in `[0, option_count)` and that it was produced for exactly this
    /// `(poll_id, voter, encrypted_option)`.
    async fn verify(&self, request: VerificationRequest<'_>) -> Result<(), ServiceError>;

    /// Count ballots per option without exposing any individual ballot
    async fn aggregate(
        &self,
        poll_id: PollId,
        option_count: usize,
        ballots: &[Ballot],
    ) -> Result<Vec<u64>, ServiceError>;
}
