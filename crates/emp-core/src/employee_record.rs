use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum number of records held in one snapshot.
pub const SNAPSHOT_LIMIT: usize = 10;

/// Currently-active employee row, in its cached form.
///
/// `hire_date` serializes as a date-only `YYYY-MM-DD` string. The wire form
/// sent to the bus is [`crate::EmployeeEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub emp_no: i64,
    pub employee_name: String,
    pub gender: String,
    pub hire_date: NaiveDate,
    pub dept_no: String,
    pub dept_name: String,
    pub title: String,
    /// Monthly amount in native currency units
    pub salary: i64,
}

/// Bounded, `emp_no`-ordered set of records held by the emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(Vec<EmployeeRecord>);

impl Snapshot {
    /// Build a snapshot, sorting by `emp_no` and keeping at most
    /// [`SNAPSHOT_LIMIT`] records.
    pub fn new(mut records: Vec<EmployeeRecord>) -> Self {
        records.sort_by_key(|r| r.emp_no);
        records.truncate(SNAPSHOT_LIMIT);
        Self(records)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EmployeeRecord> {
        self.0.get(index)
    }

    pub fn records(&self) -> &[EmployeeRecord] {
        &self.0
    }

    /// Encode as the JSON array stored in the cache.
    pub fn to_cache_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Decode a cached JSON array, re-applying the ordering and size bound.
    pub fn from_cache_json(json: &str) -> Result<Self> {
        let records: Vec<EmployeeRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records))
    }
}

impl From<Vec<EmployeeRecord>> for Snapshot {
    fn from(records: Vec<EmployeeRecord>) -> Self {
        Self::new(records)
    }
}
