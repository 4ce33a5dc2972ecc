pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod model;
pub mod store;

pub use bootstrap::{apply_registry, BootstrapError, BootstrapSummary};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig,
};
pub use dispatch::{
    Assignment, CompanyCount, CounterLoad, DayBoundary, DispatchConfig, DispatchError, Dispatcher,
    Registration, ServiceCount, Statistics, TicketAction, NO_ESTIMATE,
};
pub use model::{
    Company, Counter, CounterName, CounterStatus, Flight, InvalidCounterName, NewCompany,
    NewFlight, NewService, NewTicket, Service, Ticket, TicketStatus,
};
pub use store::{CounterFilter, QueueStore, SqliteQueueStore, StoreError, StoreTx, TicketFilter};
