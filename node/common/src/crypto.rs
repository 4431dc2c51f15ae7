use ethers::types::H256;
use ethers::utils::keccak256;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::{Trigger, UpkeepId, WorkId};

type HmacSha256 = Hmac<Sha256>;

/// Compute SHA256 hash
pub fn sha256(data: &[u8]) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    H256::from_slice(&hasher.finalize())
}

/// Signature for an authenticated data streams request.
///
/// The signed string is `METHOD PATH hex(sha256(body)) clientID timestamp`,
/// where `path` includes the query string exactly as sent.
pub fn generate_hmac(
    method: &str,
    path: &str,
    body: &[u8],
    client_id: &str,
    secret: &str,
    timestamp_millis: i64,
) -> String {
    let message = format!(
        "{} {} {} {} {}",
        method,
        path,
        hex::encode(sha256(body)),
        client_id,
        timestamp_millis
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Upkeep id as a 32 byte big-endian word
pub fn upkeep_id_bytes(id: UpkeepId) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    id.to_big_endian(&mut bytes);
    bytes
}

/// Dedup key for an upkeep evaluated against a trigger
pub fn upkeep_work_id(id: UpkeepId, trigger: &Trigger) -> WorkId {
    let mut preimage = upkeep_id_bytes(id).to_vec();
    if let Trigger::Log(log) = trigger {
        preimage.extend_from_slice(&log.identifier());
    }
    WorkId(keccak256(preimage))
}
