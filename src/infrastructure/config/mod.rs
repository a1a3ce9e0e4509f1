//! Application configuration.

mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, DispatchConfig, ServerConfig, Settings,
};
