//! HTTP surface of the guichet dispatch engine.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
