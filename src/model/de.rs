//! Deserialization helpers for editor JSON, which writes `null` for unset values.
use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the default value of `T`
pub fn deserialize_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let value: Option<T> = Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
