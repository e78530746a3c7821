//! Serde helpers for the reader's string-typed wire fields.
//!
//! The reader reports every numeric and boolean tag field as a JSON string
//! (`"antennaPort": "3"`). Fields keep their native Rust types and are
//! routed through [`as_string`] with `#[serde(with = "...")]`.

/// Encode a value through its [`Display`](core::fmt::Display) impl and
/// decode it back through [`FromStr`](core::str::FromStr).
pub mod as_string {
    use core::fmt::Display;
    use core::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serialize `value` as a JSON string.
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    /// Deserialize a JSON string and parse it into `T`.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
