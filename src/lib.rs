// Public API for integration tests and library usage

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod pump;
pub mod registry;
pub mod server;
pub mod state;
pub mod transport;
pub mod types;
pub mod ws;

pub use error::{HubError, HubResult};
pub use hub::{Hub, Subscription};
