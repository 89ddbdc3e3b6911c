//! Shared serialization/deserialization utilities for configuration
//!
//! This module provides common serde helpers used across configuration types.

/// Helper module for Duration serialization as milliseconds
///
/// Reconnect delays and connect timeouts are sub-second in practice, so they
/// are stored as a u64 millisecond count in TOML/JSON files.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "vl_core::config::serde_utils::duration_millis")]
///     delay: Duration,
/// }
/// ```
pub mod duration_millis {
    use serde::{self, ser, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Millisecond count of `duration`, rejecting values past `u64::MAX`
    fn to_millis<E: ser::Error>(duration: &Duration) -> Result<u64, E> {
        u64::try_from(duration.as_millis()).map_err(E::custom)
    }

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(to_millis::<S::Error>(duration)?)
    }

    /// Deserialize a Duration from milliseconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }

    /// Same encoding for optional durations; `None` is omitted or null
    pub mod option {
        use serde::{self, Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&super::to_millis::<S::Error>(d)?),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let millis = Option::<u64>::deserialize(deserializer)?;
            Ok(millis.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_millis")]
        delay: Duration,
        #[serde(default, with = "duration_millis::option")]
        timeout: Option<Duration>,
    }

    #[test]
    fn test_duration_millis_serialize() {
        let config = TestConfig {
            delay: Duration::from_millis(1500),
            timeout: None,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"delay":1500,"timeout":null}"#);
    }

    #[test]
    fn test_duration_millis_deserialize() {
        let json = r#"{"delay":250,"timeout":30000}"#;
        let config: TestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.delay, Duration::from_millis(250));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_duration_beyond_u64_millis_is_an_error() {
        let config = TestConfig {
            delay: Duration::MAX,
            timeout: None,
        };
        assert!(serde_json::to_string(&config).is_err());

        let config = TestConfig {
            delay: Duration::from_millis(1),
            timeout: Some(Duration::MAX),
        };
        assert!(serde_json::to_string(&config).is_err());
    }

    #[test]
    fn test_optional_duration_missing() {
        let config: TestConfig = serde_json::from_str(r#"{"delay":1000}"#).unwrap();
        assert_eq!(config.timeout, None);
    }
}
