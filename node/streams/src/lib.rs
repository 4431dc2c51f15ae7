//! Client for the data streams lookup service.
//!
//! Upkeeps that need off-chain data revert with `StreamsLookup`; the decoded
//! request is served either per feed (v0.2) or in one bulk call (v0.3).

pub mod client;
pub mod error;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::{Credentials, StreamsClient};
pub use error::{FailureKind, FeedFailure, RequestError, StreamsError};
pub use request::{decode_streams_lookup, LookupVersion, StreamsLookupRequest};
pub use retry::RetryConfig;
pub use transport::{HttpResponse, ReqwestTransport, StreamsTransport, TransportError};
