use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Times are stored and exchanged as wall-clock "HH:MM" strings. No timezone
/// is attached anywhere in the scheduling data model.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse(s: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map_err(|_| format!("Invalid time of day: {}", s))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{self, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time {
                Some(t) => serializer.serialize_some(&t.format("%H:%M").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value: Option<String> = Option::deserialize(deserializer)?;
            value
                .map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakWindow {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub opening_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub closing_time: NaiveTime,
    pub duration_minutes: i32,
    #[serde(default)]
    pub break_times: Vec<BreakWindow>,
    pub doctor_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub opening_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub closing_time: NaiveTime,
    pub duration_minutes: i32,
    #[serde(default)]
    pub break_times: Vec<BreakWindow>,
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm::option")]
    pub opening_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub closing_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub break_times: Option<Vec<BreakWindow>>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Availability not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Referenced doctor not found: {0}")]
    InvalidDoctor(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Availability has scheduled appointments")]
    HasActiveAppointments,

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn availability_round_trips_hhmm_times() {
        let row = json!({
            "id": "5b41ce3a-9f16-4a3e-bd28-3d36a4f5d02a",
            "date": "2026-09-01",
            "opening_time": "09:00",
            "closing_time": "12:00",
            "duration_minutes": 30,
            "break_times": [{"start_time": "10:00", "end_time": "10:30"}],
            "doctor_id": "9a21cd3a-0f16-4a3e-bd28-3d36a4f5d02b",
            "owner_id": "7c31ce3a-9f16-4a3e-bd28-3d36a4f5d02c",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        });

        let availability: Availability = serde_json::from_value(row).unwrap();
        assert_eq!(availability.opening_time.format("%H:%M").to_string(), "09:00");
        assert_eq!(availability.break_times.len(), 1);

        let back = serde_json::to_value(&availability).unwrap();
        assert_eq!(back["closing_time"], "12:00");
        assert_eq!(back["break_times"][0]["end_time"], "10:30");
    }

    #[test]
    fn postgres_time_with_seconds_is_accepted() {
        let window: BreakWindow =
            serde_json::from_value(json!({"start_time": "10:00:00", "end_time": "10:30:00"}))
                .unwrap();
        assert_eq!(window.start_time.format("%H:%M").to_string(), "10:00");
    }

    #[test]
    fn update_request_fields_default_to_none() {
        let request: UpdateAvailabilityRequest = serde_json::from_value(json!({
            "closing_time": "17:00"
        }))
        .unwrap();
        assert!(request.date.is_none());
        assert!(request.opening_time.is_none());
        assert_eq!(
            request.closing_time.unwrap().format("%H:%M").to_string(),
            "17:00"
        );
    }
}
