use std::net::SocketAddr;

use eyre::Result;

use crate::{
    config::models::{EngineConfig, RouteEntryConfig, SessionConfig},
    core::{engine::STOCK_MODULES, router::RouteEntry},
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid route template '{template}': {message}")]
    InvalidRoute { template: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Engine configuration validator
pub struct EngineConfigValidator;

impl EngineConfigValidator {
    /// Validate the entire engine configuration
    pub fn validate(config: &EngineConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.routes.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routes".to_string(),
            });
        } else {
            for entry in &config.routes {
                if let Err(e) = Self::validate_route(entry) {
                    errors.push(e);
                }
            }
        }

        if let Err(e) = Self::validate_session(&config.session) {
            errors.extend(e);
        }

        if config.stack.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "stack".to_string(),
            });
        } else {
            // A misnamed stack entry would otherwise surface only as a
            // request-time configuration error.
            for name in &config.stack {
                if !STOCK_MODULES.contains(&name.as_str()) {
                    errors.push(ValidationError::InvalidField {
                        field: "stack".to_string(),
                        message: format!("unknown stage module '{name}'"),
                    });
                }
            }
        }

        if config.modules.extensions.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "modules.extensions".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate one route entry against the template grammar
    fn validate_route(entry: &RouteEntryConfig) -> ValidationResult<()> {
        RouteEntry::parse(&entry.route, entry.preset.clone()).map_err(|e| {
            ValidationError::InvalidRoute {
                template: entry.route.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Validate session durations parse as humantime strings
    fn validate_session(session: &SessionConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("session.max_age", &session.max_age),
            ("session.sweep_interval", &session.sweep_interval),
        ] {
            if let Err(e) = humantime::parse_duration(value) {
                errors.push(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: format!("'{value}' is not a valid duration: {e}"),
                });
            }
        }

        if session.key_size == 0 {
            errors.push(ValidationError::InvalidField {
                field: "session.key_size".to_string(),
                message: "Session keys must be at least one byte".to_string(),
            });
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Format multiple validation errors into a readable message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let error_messages: Vec<String> = errors.iter().map(|e| format!("  • {e}")).collect();
        format!(
            "Found {} configuration error(s):\n{}",
            errors.len(),
            error_messages.join("\n")
        )
    }
}
