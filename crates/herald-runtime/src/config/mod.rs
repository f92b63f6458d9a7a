//! Configuration module for the Herald runtime.
//!
//! This module provides layered configuration loading and validation for
//! the bot token, command verification, handler behaviour and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AuthConfig, CommandsConfig, HandlersConfig, HeraldConfig, LogFormat, LogLevel, LogOutput,
    LoggingConfig, SpanEventConfig, Token,
};
pub use validation::validate_config;
