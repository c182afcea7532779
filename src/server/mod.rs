pub mod config;
mod http_layers;
mod listener;
pub mod metrics;
#[allow(clippy::module_inception)]
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use listener::{https_location, make_redirect_app, HttpServer};
pub use server::make_app;
