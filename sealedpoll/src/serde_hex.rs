use std::borrow::Cow;
use std::convert::TryInto;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum IdentityBytesHex {}

impl Hex<[u8; 32]> for IdentityBytesHex {
    type Error = String;

    fn create_bytes(bytes: &[u8; 32]) -> Cow<[u8]> {
        bytes.as_ref().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<[u8; 32], String> {
        bytes
            .try_into()
            .map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))
    }
}
