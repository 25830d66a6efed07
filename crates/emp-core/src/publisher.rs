use crate::{EmployeeMessage, Result};
use async_trait::async_trait;

/// Trait for the bus producer the emitter publishes through
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one message and wait for the broker acknowledgment
    async fn publish(&self, message: EmployeeMessage) -> Result<()>;

    /// Flush pending messages and disconnect from the bus
    async fn disconnect(&self) -> Result<()>;
}
