use async_trait::async_trait;
use chrono::NaiveDate;
use emp_core::{EmployeeRecord, Error, Result, Snapshot, SnapshotSource, SNAPSHOT_LIMIT};
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Currently-active employees: every history table filtered on the
/// `9999-01-01` sentinel, lowest `emp_no` first.
pub const ACTIVE_EMPLOYEES_QUERY: &str = r#"
SELECT
    e.emp_no,
    CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
    CAST(e.gender AS CHAR) AS gender,
    e.hire_date,
    d.dept_no,
    d.dept_name,
    t.title,
    s.salary
FROM employees e
INNER JOIN dept_emp de ON e.emp_no = de.emp_no
INNER JOIN departments d ON de.dept_no = d.dept_no
INNER JOIN titles t ON e.emp_no = t.emp_no
INNER JOIN salaries s ON e.emp_no = s.emp_no
WHERE de.to_date = '9999-01-01'
  AND t.to_date = '9999-01-01'
  AND s.to_date = '9999-01-01'
ORDER BY e.emp_no ASC
LIMIT ?
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Database holding the employees schema
    pub database: String,
}

fn default_port() -> u16 {
    3306
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: "root".to_string(),
            database: "employees".to_string(),
        }
    }
}

impl MysqlConfig {
    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    emp_no: i32,
    employee_name: String,
    gender: String,
    hire_date: NaiveDate,
    dept_no: String,
    dept_name: String,
    title: String,
    salary: i32,
}

impl From<EmployeeRow> for EmployeeRecord {
    fn from(row: EmployeeRow) -> Self {
        Self {
            emp_no: i64::from(row.emp_no),
            employee_name: row.employee_name,
            gender: row.gender,
            hire_date: row.hire_date,
            dept_no: row.dept_no,
            dept_name: row.dept_name,
            title: row.title,
            salary: i64::from(row.salary),
        }
    }
}

/// Snapshot loader over a single, lazily opened MySQL connection.
///
/// A failed query drops the connection so the next load reconnects.
pub struct MysqlSource {
    config: MysqlConfig,
    connection: Mutex<Option<MySqlConnection>>,
}

impl MysqlSource {
    pub fn new(config: MysqlConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<MySqlConnection> {
        info!(
            "Connecting to MySQL: {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );

        let conn = self
            .config
            .connect_options()
            .connect()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("Failed to connect to MySQL: {}", e)))?;

        info!("MySQL connection established");
        Ok(conn)
    }
}

#[async_trait]
impl SnapshotSource for MysqlSource {
    async fn load(&self) -> Result<Snapshot> {
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::SourceUnavailable("Not connected".to_string()))?;

        let result = sqlx::query_as::<_, EmployeeRow>(ACTIVE_EMPLOYEES_QUERY)
            .bind(SNAPSHOT_LIMIT as u32)
            .fetch_all(&mut *conn)
            .await;

        match result {
            Ok(rows) => {
                debug!("Active employees query returned {} rows", rows.len());
                let records = rows.into_iter().map(EmployeeRecord::from).collect();
                Ok(Snapshot::new(records))
            }
            Err(e) => {
                error!("Active employees query failed: {} (connection reset)", e);
                *guard = None;
                Err(Error::SourceUnavailable(format!("Query failed: {}", e)))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.connection.lock().await.take() {
            info!("Closing MySQL connection");
            conn.close()
                .await
                .map_err(|e| Error::SourceUnavailable(format!("Failed to close: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_selects_current_rows_in_order() {
        assert_eq!(ACTIVE_EMPLOYEES_QUERY.matches("'9999-01-01'").count(), 3);
        assert!(ACTIVE_EMPLOYEES_QUERY.contains("ORDER BY e.emp_no ASC"));
        assert!(ACTIVE_EMPLOYEES_QUERY.trim_end().ends_with("LIMIT ?"));
    }

    #[test]
    fn test_row_maps_to_cached_record() {
        let row = EmployeeRow {
            emp_no: 10001,
            employee_name: "Georgi Facello".to_string(),
            gender: "M".to_string(),
            hire_date: NaiveDate::from_ymd_opt(1986, 6, 26).unwrap(),
            dept_no: "d005".to_string(),
            dept_name: "Development".to_string(),
            title: "Senior Engineer".to_string(),
            salary: 88958,
        };

        let record = EmployeeRecord::from(row);
        let json = Snapshot::new(vec![record.clone()]).to_cache_json().unwrap();

        assert_eq!(record.emp_no, 10001);
        assert_eq!(record.salary, 88958);
        assert!(json.contains(r#""hire_date":"1986-06-26""#));
    }

    #[test]
    fn test_config_defaults() {
        let config: MysqlConfig = serde_json::from_str(
            r#"{"host": "db", "username": "app", "database": "employees"}"#,
        )
        .unwrap();

        assert_eq!(config.port, 3306);
        assert_eq!(config.password, "");
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let source = MysqlSource::new(MysqlConfig::default());
        assert!(source.close().await.is_ok());
    }
}
