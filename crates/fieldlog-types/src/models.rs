use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

// -- Status --

/// Lifecycle state of a capture. Any value may be written at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl CaptureStatus {
    pub const ALL: [CaptureStatus; 4] = [
        CaptureStatus::Draft,
        CaptureStatus::Submitted,
        CaptureStatus::Approved,
        CaptureStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureStatus::Draft => "draft",
            CaptureStatus::Submitted => "submitted",
            CaptureStatus::Approved => "approved",
            CaptureStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capture status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for CaptureStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaptureStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// -- Water quality --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaterQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl WaterQuality {
    pub const ALL: [WaterQuality; 5] = [
        WaterQuality::Excellent,
        WaterQuality::Good,
        WaterQuality::Fair,
        WaterQuality::Poor,
        WaterQuality::VeryPoor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WaterQuality::Excellent => "excellent",
            WaterQuality::Good => "good",
            WaterQuality::Fair => "fair",
            WaterQuality::Poor => "poor",
            WaterQuality::VeryPoor => "very-poor",
        }
    }

    /// Parse the free-text form value. Blank or unknown values yield `None`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_ascii_lowercase();
        WaterQuality::ALL.into_iter().find(|q| q.as_str() == needle)
    }
}

impl fmt::Display for WaterQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Captures --

/// Measurement payload stored as a schema-less JSON object.
///
/// Numeric readings stay strings: they are only parsed when statistics are
/// computed, so whatever the observer typed is preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureData {
    pub location: String,
    pub date: String,
    pub time: String,
    pub temperature: String,
    pub humidity: String,
    pub wind_speed: String,
    pub water_level: String,
    pub water_quality: String,
    pub observations: String,
    pub photo_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data: CaptureData,
    pub status: CaptureStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A capture as composed by the entry form, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCapture {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data: CaptureData,
    #[serde(default = "default_status")]
    pub status: CaptureStatus,
}

fn default_status() -> CaptureStatus {
    CaptureStatus::Draft
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in CaptureStatus::ALL {
            assert_eq!(status.as_str().parse::<CaptureStatus>().unwrap(), status);
        }
        assert!("archived".parse::<CaptureStatus>().is_err());
    }

    #[test]
    fn water_quality_lenient_parse() {
        assert_eq!(WaterQuality::parse_lenient(" Very-Poor "), Some(WaterQuality::VeryPoor));
        assert_eq!(WaterQuality::parse_lenient("good"), Some(WaterQuality::Good));
        assert_eq!(WaterQuality::parse_lenient(""), None);
        assert_eq!(WaterQuality::parse_lenient("murky"), None);
    }

    #[test]
    fn capture_data_uses_camel_case_keys() {
        let data = CaptureData {
            wind_speed: "4".into(),
            water_level: "1.2".into(),
            photo_urls: vec!["http://x/a.jpg".into()],
            ..CaptureData::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["windSpeed"], "4");
        assert_eq!(json["waterLevel"], "1.2");
        assert_eq!(json["photoUrls"][0], "http://x/a.jpg");
    }

    #[test]
    fn capture_data_missing_keys_default_to_empty() {
        let data: CaptureData = serde_json::from_str(r#"{"location":"Lake X"}"#).unwrap();
        assert_eq!(data.location, "Lake X");
        assert!(data.temperature.is_empty());
        assert!(data.photo_urls.is_empty());
    }

    #[test]
    fn new_capture_defaults_to_draft() {
        let capture: NewCapture = serde_json::from_str(r#"{"title":"Site A"}"#).unwrap();
        assert_eq!(capture.status, CaptureStatus::Draft);
        assert!(capture.description.is_none());
    }
}
