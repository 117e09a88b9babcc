//! Server runtime: configuration, request pipeline and platform simulation.

pub mod config;
pub mod infra;
pub mod pipeline;
pub mod server;
pub mod upstream;

pub use config::{AdapterConfig, DEFAULT_MAX_PAYLOAD_SIZE};
pub use pipeline::Pipeline;
pub use server::AdapterServer;
pub use upstream::wait_until_reachable;
