use crate::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Gatekeeper between ballot submission and the ledger
///
/// Runs cheap well-formedness checks locally, then asks the cryptographic
/// service to check the attestation under a bounded timeout. A rejection
/// affects only the ballot being checked.
#[derive(Clone)]
pub struct AttestationVerifier {
    service: Arc<dyn CryptoService>,
    timeout: Duration,
    max_ballot_bytes: usize,
}

impl AttestationVerifier {
    pub fn new(service: Arc<dyn CryptoService>, settings: &Settings) -> Self {
        AttestationVerifier {
            service,
            timeout: settings.service_timeout(),
            max_ballot_bytes: settings.max_ballot_bytes,
        }
    }

    /// Verify a ballot for `(poll_id, voter)`
    ///
    /// Returns `InvalidAttestation` when the ballot is refused and
    /// `ServiceUnavailable` when the service failed or timed out.
    pub async fn verify(
        &self,
        poll_id: PollId,
        voter: &Identity,
        encrypted_option: &EncryptedOption,
        attestation: &Attestation,
        option_count: usize,
    ) -> Result<(), Error> {
        self.check_well_formed(encrypted_option, attestation, option_count)?;

        let request = VerificationRequest {
            poll_id,
            voter,
            encrypted_option,
            attestation,
            option_count,
        };

        match tokio::time::timeout(self.timeout, self.service.verify(request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ServiceError::Rejected(reason))) => {
                warn!(%poll_id, %voter, %reason, "attestation rejected");
                Err(Error::InvalidAttestation(reason))
            }
            Ok(Err(ServiceError::Unavailable(reason))) => {
                warn!(%poll_id, %reason, "verification service failed");
                Err(Error::ServiceUnavailable(reason))
            }
            Err(_) => {
                warn!(%poll_id, timeout = ?self.timeout, "verification timed out");
                Err(Error::ServiceUnavailable(format!(
                    "verification timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }

    fn check_well_formed(
        &self,
        encrypted_option: &EncryptedOption,
        attestation: &Attestation,
        option_count: usize,
    ) -> Result<(), Error> {
        if option_count < 2 {
            return Err(Error::InvalidAttestation(format!(
                "no valid option index among {} options",
                option_count
            )));
        }
        if encrypted_option.as_ref().is_empty() {
            return Err(Error::InvalidAttestation("empty ciphertext".to_owned()));
        }
        if attestation.as_ref().is_empty() {
            return Err(Error::InvalidAttestation("empty attestation".to_owned()));
        }
        if encrypted_option.as_ref().len() > self.max_ballot_bytes
            || attestation.as_ref().len() > self.max_ballot_bytes
        {
            return Err(Error::InvalidAttestation(format!(
                "ballot payload larger than {} bytes",
                self.max_ballot_bytes
            )));
        }
        Ok(())
    }
}
