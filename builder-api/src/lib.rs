pub mod blinded_block_provider;
mod error;
pub mod relay;
mod serde;
pub mod signing;
pub mod types;

pub use blinded_block_provider::BlindedBlockProvider;
pub use error::{ApiError, Error};
pub use relay::{Relay, RelayEntry, RelayEntryError};
