mod mysql_source;

pub use mysql_source::{MysqlConfig, MysqlSource, ACTIVE_EMPLOYEES_QUERY};
