use crate::*;
use async_trait::async_trait;
use digest::Digest;
use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use rand::Rng;
use std::convert::TryFrom;
use tracing::debug;

const NONCE_LEN: usize = 16;
const CIPHERTEXT_LEN: usize = NONCE_LEN + 1;

/// An in-process stand-in for the external cryptographic service
///
/// Option indices are sealed under a key only this service holds, and every
/// sealed ballot is signed together with the poll, voter and option count it
/// was produced for. Good enough to exercise the lifecycle end to end; it is
/// not a homomorphic scheme and `aggregate` opens each ballot internally.
pub struct LocalCryptoService {
    keypair: Keypair,
    sealing_key: [u8; 32],
}

// Everything an attestation commits to
#[derive(Serialize)]
struct AttestationPackage<'a> {
    poll_id: PollId,
    voter: &'a Identity,
    encrypted_option: &'a EncryptedOption,
    option_count: u64,
}

impl LocalCryptoService {
    pub fn new() -> Self {
        let mut csprng = rand::rngs::OsRng {};
        LocalCryptoService {
            keypair: Keypair::generate(&mut csprng),
            sealing_key: csprng.gen(),
        }
    }

    /// Public key attestations are checked against
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    /// Encrypt `option` for `voter` in `poll_id` and attest that it is below `option_count`
    pub fn seal_vote(
        &self,
        poll_id: PollId,
        voter: &Identity,
        option: u8,
        option_count: usize,
    ) -> Result<BallotSubmission, Error> {
        if option as usize >= option_count {
            return Err(Error::InvalidInput(format!(
                "option {} is out of range for {} options",
                option, option_count
            )));
        }

        let mut csprng = rand::rngs::OsRng {};
        let nonce: [u8; NONCE_LEN] = csprng.gen();

        let mut ciphertext = Vec::with_capacity(CIPHERTEXT_LEN);
        ciphertext.extend_from_slice(&nonce);
        ciphertext.push(option ^ self.pad(poll_id, voter, &nonce));
        let encrypted_option = EncryptedOption(ciphertext);

        let package = attestation_bytes(poll_id, voter, &encrypted_option, option_count)
            .map_err(|e| Error::ServiceUnavailable(e.to_string()))?;
        let signature = self.keypair.sign(&package);

        Ok(BallotSubmission {
            encrypted_option,
            attestation: Attestation(signature.to_bytes().to_vec()),
        })
    }

    fn pad(&self, poll_id: PollId, voter: &Identity, nonce: &[u8]) -> u8 {
        let mut hasher = sha2::Sha512::new();
        hasher.update(b"sealedpoll-seal");
        hasher.update(&self.sealing_key);
        hasher.update(&poll_id.0.to_le_bytes());
        hasher.update(voter.as_bytes());
        hasher.update(nonce);
        hasher.finalize()[0]
    }

    fn open(
        &self,
        poll_id: PollId,
        voter: &Identity,
        encrypted_option: &EncryptedOption,
    ) -> Result<u8, ServiceError> {
        let bytes = encrypted_option.as_ref();
        if bytes.len() != CIPHERTEXT_LEN {
            return Err(ServiceError::Rejected("malformed ciphertext".to_owned()));
        }
        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        Ok(sealed[0] ^ self.pad(poll_id, voter, nonce))
    }
}

impl Default for LocalCryptoService {
    fn default() -> Self {
        LocalCryptoService::new()
    }
}

fn attestation_bytes(
    poll_id: PollId,
    voter: &Identity,
    encrypted_option: &EncryptedOption,
    option_count: usize,
) -> Result<Vec<u8>, serde_cbor::Error> {
    let package = AttestationPackage {
        poll_id,
        voter,
        encrypted_option,
        option_count: option_count as u64,
    };
    serde_cbor::to_vec(&package)
}

#[async_trait]
impl CryptoService for LocalCryptoService {
    async fn verify(&self, request: VerificationRequest<'_>) -> Result<(), ServiceError> {
        let signature = Signature::try_from(request.attestation.as_ref())
            .map_err(|_| ServiceError::Rejected("malformed attestation".to_owned()))?;

        let package = attestation_bytes(
            request.poll_id,
            request.voter,
            request.encrypted_option,
            request.option_count,
        )
        .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        self.keypair
            .public
            .verify_strict(&package, &signature)
            .map_err(|_| {
                ServiceError::Rejected(
                    "attestation is not bound to this poll, voter and ciphertext".to_owned(),
                )
            })?;

        let option = self.open(request.poll_id, request.voter, request.encrypted_option)?;
        if option as usize >= request.option_count {
            return Err(ServiceError::Rejected(format!(
                "option index out of range for {} options",
                request.option_count
            )));
        }

        Ok(())
    }

    async fn aggregate(
        &self,
        poll_id: PollId,
        option_count: usize,
        ballots: &[Ballot],
    ) -> Result<Vec<u64>, ServiceError> {
        let mut counts = vec![0u64; option_count];
        for ballot in ballots {
            if ballot.poll_id != poll_id {
                return Err(ServiceError::Rejected(format!(
                    "ballot from poll {} in tally of poll {}",
                    ballot.poll_id, poll_id
                )));
            }
            let option = self.open(poll_id, &ballot.voter, &ballot.encrypted_option)? as usize;
            match counts.get_mut(option) {
                Some(count) => *count += 1,
                None => {
                    return Err(ServiceError::Rejected(
                        "ballot holds an out-of-range option".to_owned(),
                    ))
                }
            }
        }

        debug!(%poll_id, ballots = ballots.len(), "aggregated ballots");
        Ok(counts)
    }
}
