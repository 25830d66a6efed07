mod analysis;
mod cache;
mod emitter;
mod employee_record;
mod error;
mod message;
mod publisher;
mod source;
mod state;
pub mod shutdown;

pub use analysis::{
    years_of_service, AnalysisResult, Analyzer, MessageHandler, SalaryCategory,
};
pub use cache::{SnapshotCache, CACHE_KEY, DEFAULT_CACHE_TTL};
pub use emitter::{EmitOutcome, Emitter, EmitterConfig, EmitterStatus};
pub use employee_record::{EmployeeRecord, Snapshot, SNAPSHOT_LIMIT};
pub use error::{Error, Result};
pub use message::{
    EmployeeEvent, EmployeeMessage, ReceivedMessage, EMPLOYEE_MESSAGE_TYPE,
    MESSAGE_TYPE_HEADER, TIMESTAMP_HEADER,
};
pub use publisher::MessagePublisher;
pub use source::SnapshotSource;
pub use state::{Checkout, SnapshotState};
