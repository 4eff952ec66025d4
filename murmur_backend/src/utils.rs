//! Shared helpers and constants.

use chrono::Utc;
use serde::{Deserialize, Deserializer};

pub const APP_NAME: &str = "murmur_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Deserializes a field that distinguishes "absent" from "explicitly null".
/// Wrap the target in `Option<Option<T>>` and pair with `#[serde(default)]`:
/// absent stays `None`, `null` becomes `Some(None)`, a value `Some(Some(v))`.
pub fn deserialize_patch<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
