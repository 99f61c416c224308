#[macro_use]
extern crate serde;

mod attestation;
mod ballot;
mod clock;
mod crypto;
mod engine;
mod error;
mod events;
mod identity;
mod ledger;
mod local;
mod poll;
mod registry;
mod reveal;
mod serde_hex;
mod settings;
mod store;
mod tally;

pub use attestation::*;
pub use ballot::*;
pub use clock::*;
pub use crypto::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use identity::*;
pub use ledger::*;
pub use local::*;
pub use poll::*;
pub use registry::*;
pub use reveal::*;
pub use serde_hex::*;
pub use settings::*;
pub use store::*;
pub use tally::*;
