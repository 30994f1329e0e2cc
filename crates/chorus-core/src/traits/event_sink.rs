use crate::models::SyncRecord;

/// Receives the structured records the engine publishes.
///
/// Injected at construction; implementations must not block.
pub trait IEventSink: Send + Sync {
    fn publish(&self, record: SyncRecord);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl IEventSink for NoopSink {
    fn publish(&self, _record: SyncRecord) {}
}
