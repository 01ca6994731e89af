mod consumer;
mod handle;
mod memory;
mod poller;
mod report;
mod store;
#[cfg(test)]
mod tests;

pub use consumer::DeliveryConsumer;
pub use handle::{DeliveryHandle, DeliveryStats};
pub use memory::MemoryCountStore;
pub use poller::DeliveryPoller;
pub use report::{
    BatchReport, OperationStatus, RecentEvent, RecoveryReport, ResetReport, SessionReport,
    StatsReport, StatusReport,
};
pub use store::{CountStore, DailyTotals, SessionTotals, StoreResult, StoredEvent};
