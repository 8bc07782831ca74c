#![forbid(unsafe_code)]

mod demo;
mod log_gateway;

pub use demo::DemoSource;
pub use log_gateway::LogGateway;
