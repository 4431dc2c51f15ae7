pub mod contracts;
pub mod crypto;
pub mod error;
pub mod links;
pub mod trigger;
pub mod types;

pub use contracts::{ChainReader, RegistryClient};
pub use error::{ChainError, TriggerError};
pub use types::*;
