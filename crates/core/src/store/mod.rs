//! Persistence boundary for companies, services, counters, flights and tickets.

mod sqlite_store;
mod traits;

pub use sqlite_store::SqliteQueueStore;
pub use traits::{CounterFilter, QueueStore, StoreError, StoreTx, TicketFilter};
