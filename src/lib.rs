pub mod config;
pub mod constants;
pub mod engine;
pub mod logging;
pub mod physics;
pub mod ranks;
pub mod registry;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
