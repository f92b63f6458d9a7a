//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CommandsConfig, HandlersConfig, HeraldConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    if let Some(token) = &config.auth.token
        && token.is_blank()
    {
        return Err(ConfigError::validation("auth.token is set but blank"));
    }

    validate_commands_config(&config.commands)?;
    validate_handlers_config(&config.handlers)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_commands_config(commands: &CommandsConfig) -> ConfigResult<()> {
    if let Some(prefix) = &commands.string_prefix
        && !prefix.is_empty()
        && prefix.trim().is_empty()
    {
        return Err(ConfigError::validation(
            "commands.string_prefix cannot consist only of whitespace",
        ));
    }
    Ok(())
}

fn validate_handlers_config(handlers: &HandlersConfig) -> ConfigResult<()> {
    if handlers.shutdown_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "handlers.shutdown_timeout_ms must be greater than 0",
        ));
    }

    for name in handlers.settings.keys() {
        if name.is_empty() || name.contains(' ') {
            return Err(ConfigError::validation(format!(
                "Invalid handler settings key: '{name}'"
            )));
        }
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(' ') {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{target}'"
            )));
        }
    }
    Ok(())
}
