//! Wire-format observation records and the ingestion-boundary parser.
//!
//! Producers emit one JSON object per observation:
//!
//! ```json
//! {"id":"obs-1","commonName":"Mourning Dove","count":7,
//!  "observationDate":"2024-05-01T07:30:00","latitude":32.7,"longitude":-117.1,
//!  "county":"San Diego","observerId":"obsr42","dataType":"HISTORICAL",
//!  "timestamp":1714548600000}
//! ```
//!
//! Parsing either yields a complete [`Observation`] or a [`RecordError`];
//! the engine never sees a partially parsed record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key::SpeciesKey;
use crate::observation::{Observation, ObservationClass};

/// `dataType` value that routes a record to baseline learning.
pub const HISTORICAL_DATA_TYPE: &str = "HISTORICAL";

/// Why a record was rejected at the boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("count must be non-negative, got {0}")]
    NegativeCount(i64),

    #[error("timestamp {0} ms is out of range")]
    TimestampOutOfRange(i64),

    #[error("invalid value for `{field}`: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Raw record as produced upstream. Every field is optional at this layer so
/// that absence is reported as a typed error instead of a serde message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Producer timestamp, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Ground-truth label from synthetic generators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_anomaly: Option<bool>,
}

impl ObservationRecord {
    /// Parse and validate a single JSON line.
    pub fn parse_line(line: &str) -> Result<Observation, RecordError> {
        let record: ObservationRecord =
            serde_json::from_str(line).map_err(|e| RecordError::Json(e.to_string()))?;
        record.into_observation()
    }

    /// Validate the record and convert it into an engine observation.
    pub fn into_observation(self) -> Result<Observation, RecordError> {
        let species = required_text(self.common_name, "commonName")?;
        let location = required_text(self.county, "county")?;

        let count = self.count.ok_or(RecordError::MissingField("count"))?;
        if count < 0 {
            return Err(RecordError::NegativeCount(count));
        }

        let data_type = self.data_type.ok_or(RecordError::MissingField("dataType"))?;
        let class = if data_type == HISTORICAL_DATA_TYPE {
            ObservationClass::Historical
        } else {
            ObservationClass::Live
        };

        let millis = self.timestamp.ok_or(RecordError::MissingField("timestamp"))?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or(RecordError::TimestampOutOfRange(millis))?;

        if let Some(date) = self.observation_date.as_deref() {
            parse_observation_date(date)?;
        }
        check_coordinate("latitude", self.latitude, 90.0)?;
        check_coordinate("longitude", self.longitude, 180.0)?;

        Ok(Observation {
            key: SpeciesKey::new(species, location),
            count: count as u64,
            timestamp,
            class,
            id: self.id,
            labeled_anomaly: self.is_anomaly,
        })
    }
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, RecordError> {
    let value = value.ok_or(RecordError::MissingField(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RecordError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

fn check_coordinate(field: &'static str, value: Option<f64>, limit: f64) -> Result<(), RecordError> {
    match value {
        Some(v) if !v.is_finite() || v.abs() > limit => Err(RecordError::InvalidField {
            field,
            message: format!("{} outside [-{}, {}]", v, limit, limit),
        }),
        _ => Ok(()),
    }
}

/// Accepts RFC 3339, zone-less ISO 8601 date-times, and bare dates.
pub fn parse_observation_date(value: &str) -> Result<NaiveDateTime, RecordError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Some(dt) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }
    Err(RecordError::InvalidField {
        field: "observationDate",
        message: format!("unrecognized date `{}`", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "id": "obs-1",
            "commonName": "Mourning Dove",
            "count": 7,
            "observationDate": "2024-05-01T07:30:00",
            "latitude": 32.7,
            "longitude": -117.1,
            "county": "San Diego",
            "observerId": "obsr42",
            "dataType": "HISTORICAL",
            "timestamp": 1_714_548_600_000i64
        })
    }

    fn parse(value: &serde_json::Value) -> Result<Observation, RecordError> {
        ObservationRecord::parse_line(&value.to_string())
    }

    #[test]
    fn parses_historical_record() {
        let obs = parse(&base()).unwrap();
        assert_eq!(obs.key, SpeciesKey::new("Mourning Dove", "San Diego"));
        assert_eq!(obs.count, 7);
        assert_eq!(obs.class, ObservationClass::Historical);
        assert_eq!(obs.timestamp.timestamp_millis(), 1_714_548_600_000);
        assert_eq!(obs.id.as_deref(), Some("obs-1"));
        assert_eq!(obs.labeled_anomaly, None);
    }

    #[test]
    fn non_historical_is_live() {
        for data_type in ["SYNTHETIC", "LIVE", "historical"] {
            let mut v = base();
            v["dataType"] = json!(data_type);
            assert_eq!(parse(&v).unwrap().class, ObservationClass::Live, "{data_type}");
        }
    }

    #[test]
    fn carries_ground_truth_label() {
        let mut v = base();
        v["isAnomaly"] = json!(true);
        assert_eq!(parse(&v).unwrap().labeled_anomaly, Some(true));
    }

    #[test]
    fn missing_required_fields() {
        for field in ["commonName", "county", "count", "dataType", "timestamp"] {
            let mut v = base();
            v.as_object_mut().unwrap().remove(field);
            assert_eq!(parse(&v), Err(RecordError::MissingField(field)), "{field}");
        }
    }

    #[test]
    fn descriptive_fields_are_optional() {
        let mut v = base();
        for field in ["id", "observationDate", "latitude", "longitude", "observerId"] {
            v.as_object_mut().unwrap().remove(field);
        }
        assert!(parse(&v).is_ok());
    }

    #[test]
    fn rejects_blank_key_parts() {
        let mut v = base();
        v["county"] = json!("   ");
        assert_eq!(parse(&v), Err(RecordError::EmptyField("county")));
    }

    #[test]
    fn trims_key_parts() {
        let mut v = base();
        v["commonName"] = json!("  Mourning Dove ");
        assert_eq!(parse(&v).unwrap().key.species, "Mourning Dove");
    }

    #[test]
    fn rejects_negative_count() {
        let mut v = base();
        v["count"] = json!(-2);
        assert_eq!(parse(&v), Err(RecordError::NegativeCount(-2)));
    }

    #[test]
    fn rejects_fractional_count_as_json_error() {
        let mut v = base();
        v["count"] = json!(2.5);
        assert!(matches!(parse(&v), Err(RecordError::Json(_))));
    }

    #[test]
    fn rejects_out_of_range_timestamp() {
        let mut v = base();
        v["timestamp"] = json!(i64::MAX);
        assert_eq!(parse(&v), Err(RecordError::TimestampOutOfRange(i64::MAX)));
    }

    #[test]
    fn rejects_bad_date_and_coordinates() {
        let mut v = base();
        v["observationDate"] = json!("yesterday");
        assert!(matches!(
            parse(&v),
            Err(RecordError::InvalidField { field: "observationDate", .. })
        ));

        let mut v = base();
        v["latitude"] = json!(123.0);
        assert!(matches!(
            parse(&v),
            Err(RecordError::InvalidField { field: "latitude", .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ObservationRecord::parse_line("{not json"),
            Err(RecordError::Json(_))
        ));
        assert!(matches!(
            ObservationRecord::parse_line("[1,2,3]"),
            Err(RecordError::Json(_))
        ));
    }

    #[test]
    fn date_formats() {
        assert!(parse_observation_date("2024-05-01T07:30:00").is_ok());
        assert!(parse_observation_date("2024-05-01T07:30:00.250").is_ok());
        assert!(parse_observation_date("2024-05-01T07:30:00Z").is_ok());
        assert!(parse_observation_date("2024-05-01T07:30:00-07:00").is_ok());
        assert!(parse_observation_date("2024-05-01").is_ok());
        assert!(parse_observation_date("05/01/2024").is_err());
    }
}
