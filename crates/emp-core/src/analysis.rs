use std::fmt;

use crate::{EmployeeEvent, Error, ReceivedMessage, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Trait for per-message processing on the receiver side
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one delivered message. An error means the message is
    /// dropped; the consumer still moves past it.
    async fn handle(&self, message: &ReceivedMessage) -> Result<()>;
}

/// Salary band derived from the monthly salary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SalaryCategory {
    #[serde(rename = "Entry Level")]
    EntryLevel,
    #[serde(rename = "Mid Level")]
    MidLevel,
    #[serde(rename = "Senior Level")]
    SeniorLevel,
    #[serde(rename = "Executive Level")]
    ExecutiveLevel,
}

impl SalaryCategory {
    pub fn from_monthly_salary(salary: i64) -> Self {
        match salary {
            s if s < 40_000 => SalaryCategory::EntryLevel,
            s if s < 65_000 => SalaryCategory::MidLevel,
            s if s < 90_000 => SalaryCategory::SeniorLevel,
            _ => SalaryCategory::ExecutiveLevel,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryCategory::EntryLevel => "Entry Level",
            SalaryCategory::MidLevel => "Mid Level",
            SalaryCategory::SeniorLevel => "Senior Level",
            SalaryCategory::ExecutiveLevel => "Executive Level",
        }
    }
}

impl fmt::Display for SalaryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub employee_details: EmployeeEvent,
    pub annual_salary: i64,
    pub years_of_service: u32,
    pub salary_category: SalaryCategory,
}

/// Completed anniversaries of the hire date at `now`, in UTC. Zero when the
/// hire date lies in the future.
///
/// This is calendar arithmetic, not `floor(elapsed / 365.25 days)`: the two
/// differ around anniversaries, e.g. 2000-03-01 to 2001-03-01 is one year
/// here and zero under the day-count formula.
pub fn years_of_service(hire_date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    now.date_naive()
        .years_since(hire_date.date_naive())
        .unwrap_or(0)
}

/// Decodes employee messages and derives salary and tenure figures
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer;

impl Analyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, event: EmployeeEvent, now: DateTime<Utc>) -> Result<AnalysisResult> {
        let annual_salary = event.salary.checked_mul(12).ok_or_else(|| {
            Error::Decode(format!("Salary out of range for employee {}", event.emp_no))
        })?;

        Ok(AnalysisResult {
            annual_salary,
            years_of_service: years_of_service(event.hire_date, now),
            salary_category: SalaryCategory::from_monthly_salary(event.salary),
            employee_details: event,
        })
    }

    pub fn process_at(&self, payload: &[u8], now: DateTime<Utc>) -> Result<AnalysisResult> {
        let event = EmployeeEvent::decode(payload)?;
        self.analyze(event, now)
    }

    pub fn process(&self, payload: &[u8]) -> Result<AnalysisResult> {
        self.process_at(payload, Utc::now())
    }

    fn log_summary(result: &AnalysisResult) {
        let e = &result.employee_details;
        info!("--- Employee Analysis ---");
        info!("Employee: {} (ID: {})", e.employee_name, e.emp_no);
        info!("Department: {} ({})", e.dept_name, e.dept_no);
        info!("Position: {}", e.title);
        info!("Gender: {}", e.gender);
        info!("Hired on: {}", e.hire_date.format("%Y-%m-%d"));
        info!("Years of service: {}", result.years_of_service);
        info!("Monthly salary: ${}", e.salary);
        info!("Annual salary: ${}", result.annual_salary);
        info!("Salary category: {}", result.salary_category);
        info!("-------------------------");
    }
}

#[async_trait]
impl MessageHandler for Analyzer {
    async fn handle(&self, message: &ReceivedMessage) -> Result<()> {
        info!(
            "Received message from partition {}, offset {}",
            message.partition, message.offset
        );
        info!(
            "Message type: {}, timestamp: {}",
            message.message_type().unwrap_or("<none>"),
            message
                .published_at()
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "<none>".to_string())
        );

        let payload = message
            .payload
            .as_deref()
            .ok_or_else(|| Error::Decode("Message has no value".to_string()))?;

        let result = self.process(payload)?;
        Self::log_summary(&result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn payload(salary: i64, hire_date: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "emp_no": 10001,
            "employee_name": "Georgi Facello",
            "gender": "M",
            "hire_date": hire_date,
            "dept_no": "d005",
            "dept_name": "Development",
            "title": "Senior Engineer",
            "salary": salary,
        }))
        .unwrap()
    }

    #[test]
    fn test_salary_category_boundaries() {
        assert_eq!(SalaryCategory::from_monthly_salary(0), SalaryCategory::EntryLevel);
        assert_eq!(SalaryCategory::from_monthly_salary(39_999), SalaryCategory::EntryLevel);
        assert_eq!(SalaryCategory::from_monthly_salary(40_000), SalaryCategory::MidLevel);
        assert_eq!(SalaryCategory::from_monthly_salary(64_999), SalaryCategory::MidLevel);
        assert_eq!(SalaryCategory::from_monthly_salary(65_000), SalaryCategory::SeniorLevel);
        assert_eq!(SalaryCategory::from_monthly_salary(89_999), SalaryCategory::SeniorLevel);
        assert_eq!(SalaryCategory::from_monthly_salary(90_000), SalaryCategory::ExecutiveLevel);
    }

    #[test]
    fn test_analysis_of_mid_level_employee() {
        let result = Analyzer::new()
            .process_at(&payload(45_000, "2000-06-01T00:00:00Z"), ts("2025-06-01T00:00:00Z"))
            .unwrap();

        assert_eq!(result.annual_salary, 540_000);
        assert_eq!(result.years_of_service, 25);
        assert_eq!(result.salary_category, SalaryCategory::MidLevel);
        assert_eq!(result.employee_details.emp_no, 10001);
    }

    #[test]
    fn test_years_of_service_edges() {
        let now = ts("2025-06-01T12:00:00Z");

        assert_eq!(years_of_service(ts("2025-06-01T00:00:00Z"), now), 0);
        assert_eq!(years_of_service(ts("2024-06-02T00:00:00Z"), now), 0);
        assert_eq!(years_of_service(ts("2024-06-01T00:00:00Z"), now), 1);
        assert_eq!(years_of_service(ts("2026-01-01T00:00:00Z"), now), 0);

        assert_eq!(
            years_of_service(ts("2000-03-01T00:00:00Z"), ts("2001-03-01T00:00:00Z")),
            1
        );
    }

    #[test]
    fn test_result_serializes_with_camel_case_fields() {
        let result = Analyzer::new()
            .process_at(&payload(95_000, "1990-01-01"), ts("2025-06-01T00:00:00Z"))
            .unwrap();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["annualSalary"], 1_140_000);
        assert_eq!(value["yearsOfService"], 35);
        assert_eq!(value["salaryCategory"], "Executive Level");
        assert_eq!(value["employeeDetails"]["hire_date"], "1990-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_handler_rejects_malformed_and_empty_messages() {
        let analyzer = Analyzer::new();
        let malformed = ReceivedMessage {
            payload: Some(b"{not json".to_vec()),
            ..Default::default()
        };
        let empty = ReceivedMessage::default();

        assert!(matches!(analyzer.handle(&malformed).await, Err(Error::Decode(_))));
        assert!(matches!(analyzer.handle(&empty).await, Err(Error::Decode(_))));

        let valid = ReceivedMessage {
            payload: Some(payload(30_000, "2010-03-15T00:00:00.000Z")),
            ..Default::default()
        };
        assert!(analyzer.handle(&valid).await.is_ok());
    }
}
