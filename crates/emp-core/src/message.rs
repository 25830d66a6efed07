use crate::{EmployeeRecord, Error, Result};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const MESSAGE_TYPE_HEADER: &str = "message-type";
pub const TIMESTAMP_HEADER: &str = "timestamp";
pub const EMPLOYEE_MESSAGE_TYPE: &str = "employee-data";

/// Employee record as carried in a message value.
///
/// Identical to [`EmployeeRecord`] except that `hire_date` is a full
/// ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeEvent {
    pub emp_no: i64,
    pub employee_name: String,
    pub gender: String,
    #[serde(with = "iso_timestamp")]
    pub hire_date: DateTime<Utc>,
    pub dept_no: String,
    pub dept_name: String,
    pub title: String,
    pub salary: i64,
}

impl From<&EmployeeRecord> for EmployeeEvent {
    fn from(record: &EmployeeRecord) -> Self {
        Self {
            emp_no: record.emp_no,
            employee_name: record.employee_name.clone(),
            gender: record.gender.clone(),
            hire_date: record.hire_date.and_time(NaiveTime::MIN).and_utc(),
            dept_no: record.dept_no.clone(),
            dept_name: record.dept_name.clone(),
            title: record.title.clone(),
            salary: record.salary,
        }
    }
}

impl EmployeeEvent {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a message value. Missing, malformed or out-of-range fields are
    /// reported as [`Error::Decode`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let event: EmployeeEvent =
            serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))?;

        if event.emp_no <= 0 {
            return Err(Error::Decode(format!("Invalid emp_no: {}", event.emp_no)));
        }
        if event.salary < 0 {
            return Err(Error::Decode(format!(
                "Negative salary for employee {}: {}",
                event.emp_no, event.salary
            )));
        }

        Ok(event)
    }
}

/// Outbound bus message: key, JSON value and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeMessage {
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl EmployeeMessage {
    pub fn from_record(record: &EmployeeRecord, timestamp_ms: i64) -> Result<Self> {
        let payload = EmployeeEvent::from(record).encode()?;

        Ok(Self {
            key: record.emp_no.to_string(),
            payload,
            headers: vec![
                (
                    MESSAGE_TYPE_HEADER.to_string(),
                    EMPLOYEE_MESSAGE_TYPE.to_string(),
                ),
                (TIMESTAMP_HEADER.to_string(), timestamp_ms.to_string()),
            ],
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        self.header(TIMESTAMP_HEADER).and_then(|v| v.parse().ok())
    }
}

/// Message delivered to the receiver by the consumer group.
#[derive(Debug, Clone, Default)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub headers: Vec<(String, String)>,
    pub payload: Option<Vec<u8>>,
}

impl ReceivedMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.header(MESSAGE_TYPE_HEADER)
    }

    /// Publish time carried in the `timestamp` header.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let millis: i64 = self.header(TIMESTAMP_HEADER)?.parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// RFC 3339 with millisecond precision on output; RFC 3339 or a bare
/// `YYYY-MM-DD` (UTC midnight) on input.
mod iso_timestamp {
    use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;

        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }

        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .map_err(|_| de::Error::custom(format!("invalid ISO-8601 timestamp: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee_record::tests::record;

    #[test]
    fn test_message_framing() {
        let message =
            EmployeeMessage::from_record(&record(10001, 60000, "1990-01-01"), 1_700_000_000_123)
                .unwrap();

        assert_eq!(message.key, "10001");
        assert_eq!(message.header(MESSAGE_TYPE_HEADER), Some("employee-data"));
        assert_eq!(message.header(TIMESTAMP_HEADER), Some("1700000000123"));
        assert_eq!(message.timestamp_ms(), Some(1_700_000_000_123));

        let event = EmployeeEvent::decode(&message.payload).unwrap();
        assert_eq!(message.key, event.emp_no.to_string());
    }

    #[test]
    fn test_wire_hire_date_is_full_timestamp() {
        let message = EmployeeMessage::from_record(&record(10001, 60000, "1990-01-01"), 0).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();

        assert_eq!(value["hire_date"], "1990-01-01T00:00:00.000Z");
        assert_eq!(value["emp_no"], 10001);
        assert_eq!(value["salary"], 60000);
    }

    #[test]
    fn test_decode_then_encode_is_stable() {
        let message = EmployeeMessage::from_record(&record(10002, 80000, "2020-01-01"), 0).unwrap();
        let reencoded = EmployeeEvent::decode(&message.payload).unwrap().encode().unwrap();

        assert_eq!(reencoded, message.payload);
    }

    #[test]
    fn test_decode_accepts_date_only_and_offsets() {
        let date_only = br#"{"emp_no":1,"employee_name":"A B","gender":"F","hire_date":"2000-06-01","dept_no":"d001","dept_name":"Marketing","title":"Staff","salary":45000}"#;
        let offset = br#"{"emp_no":1,"employee_name":"A B","gender":"F","hire_date":"2000-06-01T02:00:00+02:00","dept_no":"d001","dept_name":"Marketing","title":"Staff","salary":45000}"#;

        let a = EmployeeEvent::decode(date_only).unwrap();
        let b = EmployeeEvent::decode(offset).unwrap();
        assert_eq!(a.hire_date, b.hire_date);
    }

    #[test]
    fn test_decode_rejects_bad_values() {
        assert!(matches!(EmployeeEvent::decode(b"not json"), Err(Error::Decode(_))));
        assert!(matches!(
            EmployeeEvent::decode(br#"{"emp_no":1,"employee_name":"A"}"#),
            Err(Error::Decode(_))
        ));

        let negative = br#"{"emp_no":1,"employee_name":"A B","gender":"F","hire_date":"2000-06-01","dept_no":"d001","dept_name":"Marketing","title":"Staff","salary":-1}"#;
        assert!(matches!(EmployeeEvent::decode(negative), Err(Error::Decode(_))));

        let bad_date = br#"{"emp_no":1,"employee_name":"A B","gender":"F","hire_date":"yesterday","dept_no":"d001","dept_name":"Marketing","title":"Staff","salary":1}"#;
        assert!(matches!(EmployeeEvent::decode(bad_date), Err(Error::Decode(_))));
    }

    #[test]
    fn test_received_message_headers() {
        let message = ReceivedMessage {
            headers: vec![
                ("message-type".to_string(), "employee-data".to_string()),
                ("timestamp".to_string(), "0".to_string()),
            ],
            ..Default::default()
        };

        assert_eq!(message.message_type(), Some("employee-data"));
        assert_eq!(message.published_at(), Utc.timestamp_millis_opt(0).single());
    }
}
