//! Small shared helpers.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use serde_json::Value;

/// Construct an empty metadata map with the crate's standard hasher.
#[must_use]
pub fn new_metadata_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}

/// Stable fingerprint of a JSON value, used to detect repeated tool calls
/// with identical arguments. `serde_json` serializes object keys in sorted
/// order, so semantically equal objects hash equally.
#[must_use]
pub fn argument_fingerprint(value: &Value) -> u64 {
    let mut hasher = FxHasher::default();
    value.to_string().hash(&mut hasher);
    hasher.finish()
}

/// Digest of a message history, recorded before and after each step so a
/// report shows which steps changed the transcript. Timestamps are left out
/// to keep the digest stable across replays of the same content.
#[must_use]
pub fn message_digest(messages: &[crate::message::Message]) -> u64 {
    let mut hasher = FxHasher::default();
    for message in messages {
        message.role.to_string().hash(&mut hasher);
        message.content.hash(&mut hasher);
        for call in &message.tool_calls {
            call.name.hash(&mut hasher);
            argument_fingerprint(&call.arguments).hash(&mut hasher);
        }
        message.tool_call_id.hash(&mut hasher);
    }
    hasher.finish()
}
