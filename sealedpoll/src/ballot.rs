use crate::*;

/// Ciphertext of an option index, opaque to the core
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct EncryptedOption(#[serde(with = "hex_serde")] pub Vec<u8>);

/// Proof that an [`EncryptedOption`] holds a valid option index and was produced
/// for one specific poll and voter
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Attestation(#[serde(with = "hex_serde")] pub Vec<u8>);

impl AsRef<[u8]> for EncryptedOption {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Attestation {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// What a voter hands in: an encrypted option and its attestation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BallotSubmission {
    pub encrypted_option: EncryptedOption,
    pub attestation: Attestation,
}

/// Where a ballot landed in its poll's ledger
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct LedgerPosition {
    /// Zero-based acceptance order within the poll
    pub sequence: u64,
    pub timestamp: Timestamp,
}

/// An accepted ballot
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub poll_id: PollId,
    pub voter: Identity,
    pub encrypted_option: EncryptedOption,
    pub attestation: Attestation,
    pub accepted_at: LedgerPosition,
}

impl Ballot {
    pub(crate) fn accept(
        poll_id: PollId,
        voter: Identity,
        submission: BallotSubmission,
        accepted_at: LedgerPosition,
    ) -> Self {
        Ballot {
            poll_id,
            voter,
            encrypted_option: submission.encrypted_option,
            attestation: submission.attestation,
            accepted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_serialize_as_hex() {
        let submission = BallotSubmission {
            encrypted_option: EncryptedOption(vec![0xde, 0xad]),
            attestation: Attestation(vec![0xbe, 0xef]),
        };

        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["encrypted_option"], "dead");
        assert_eq!(json["attestation"], "beef");

        let back: BallotSubmission = serde_json::from_value(json).unwrap();
        assert_eq!(back, submission);
    }
}
