//! Configuration validation.

use crate::schema::Config;

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        let server = &config.server;

        if server.id.trim().is_empty() {
            result.add_error(ValidationError::new("server.id", "Server id cannot be empty"));
        }

        if server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if server.read_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "server.read_timeout_secs",
                "read_timeout_secs must be greater than 0",
            ));
        } else if server.read_timeout_secs < 10 {
            result.add_warning(ValidationWarning::new(
                "server.read_timeout_secs",
                "read_timeout_secs is very low (<10), idle clients will be dropped quickly",
            ));
        }

        if server.write_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "server.write_timeout_secs",
                "write_timeout_secs must be greater than 0",
            ));
        }

        if server.write_timeout_secs > server.read_timeout_secs && server.read_timeout_secs > 0 {
            result.add_warning(ValidationWarning::new(
                "server.write_timeout_secs",
                "write_timeout_secs exceeds read_timeout_secs",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let logging = &config.logging;

        if !LOG_LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', expected one of {}",
                    logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        if logging.dir.is_empty() {
            result.add_error(ValidationError::new("logging.dir", "Log directory cannot be empty"));
        }

        if logging.max_files == 0 {
            result.add_warning(ValidationWarning::new(
                "logging.max_files",
                "max_files is 0, old log files will never be pruned",
            ));
        }
    }
}
