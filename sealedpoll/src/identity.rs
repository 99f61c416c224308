use crate::*;
use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use std::convert::TryInto;
use std::str::FromStr;

/// Caller identity
///
/// The 32 bytes of an ed25519 public key. Identities are supplied by the
/// caller's environment and trusted verbatim; the core only compares them.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Identity(#[serde(with = "IdentityBytesHex")] [u8; 32]);

impl Identity {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| Error::IdentityBadLen)?;
        Ok(Identity(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Interpret the identity as an ed25519 public key
    pub fn public_key(&self) -> Result<PublicKey, ed25519_dalek::SignatureError> {
        PublicKey::from_bytes(&self.0)
    }
}

impl From<PublicKey> for Identity {
    fn from(public: PublicKey) -> Self {
        Identity(public.to_bytes())
    }
}

impl From<&PublicKey> for Identity {
    fn from(public: &PublicKey) -> Self {
        Identity(public.to_bytes())
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| Error::IdentityBadHex)?;
        Identity::from_bytes(&bytes)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let mut csprng = rand::rngs::OsRng {};
    let Keypair { public, secret } = Keypair::generate(&mut csprng);
    (secret, public)
}

/// Generate a fresh keypair and return the secret together with its identity
pub fn generate_identity() -> (SecretKey, Identity) {
    let (secret, public) = generate_keypair();
    (secret, public.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_string_roundtrip() {
        let (_secret, identity) = generate_identity();

        let stringed = identity.to_string();
        assert_eq!(stringed.len(), 64);
        assert_eq!(Identity::from_str(&stringed).unwrap(), identity);
        assert!(identity.public_key().is_ok());
    }

    #[test]
    fn identity_serializes_as_hex() {
        let (_secret, identity) = generate_identity();

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json, serde_json::Value::String(identity.to_string()));
        let back: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(back, identity);

        let short = serde_json::Value::String("abcd".to_owned());
        assert!(serde_json::from_value::<Identity>(short).is_err());
    }

    #[test]
    fn bad_identities() {
        assert_eq!(Identity::from_str("zz"), Err(Error::IdentityBadHex));
        assert_eq!(Identity::from_str("abcd"), Err(Error::IdentityBadLen));
    }
}
