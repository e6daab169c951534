pub mod config;
pub mod mapper;
pub mod service;

pub use config::Config;
pub use service::{router, AppState};
