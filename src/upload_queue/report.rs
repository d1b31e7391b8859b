//! Report returned by the upload endpoint.
//!
//! `encounterTime` arrives as Unix epoch seconds, either as a JSON number or
//! as a string of digits, and is kept as an absolute UTC instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    /// Fight duration in seconds
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub id: String,
    /// Server-side semantic error, independent of the HTTP status
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub encounter: Encounter,
    /// Unix epoch when the service omits it (e.g. reports carrying `error`)
    #[serde(rename = "encounterTime", with = "epoch_seconds", default)]
    pub encounter_time: DateTime<Utc>,
}

impl Report {
    pub fn has_server_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn encounter_duration(&self) -> Duration {
        Duration::from_secs(self.encounter.duration)
    }
}

/// Serde adapter for epoch-second timestamps
pub mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Number(i64),
        Text(String),
    }

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(time.timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Number(n) => n,
            RawTimestamp::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|e| de::Error::custom(format!("invalid timestamp {:?}: {}", text, e)))?,
        };

        DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", seconds)))
    }
}
