use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::model::CounterName;

/// Largest UTC offset `[dispatch] utc_offset_minutes` accepts, exclusive.
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Dispatch settings are usable
/// - Registry entries are internally consistent
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let code_length = config.dispatch.company_code_length;
    if code_length == 0 {
        return Err(invalid("dispatch.company_code_length cannot be 0"));
    }
    if let Some(offset) = config.dispatch.utc_offset_minutes {
        if offset.abs() >= MAX_OFFSET_MINUTES {
            return Err(invalid(format!(
                "dispatch.utc_offset_minutes must be within ±{} (got {})",
                MAX_OFFSET_MINUTES - 1,
                offset
            )));
        }
    }

    let mut company_codes = HashSet::new();
    for company in &config.companies {
        let code = company.code.trim().to_uppercase();
        // Company resolution slices a fixed-width prefix off flight numbers,
        // so codes of any other width would be unreachable or ambiguous.
        if code.chars().count() != code_length {
            return Err(invalid(format!(
                "company code '{}' must be exactly {} characters",
                company.code, code_length
            )));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!(
                "company code '{}' must be alphanumeric",
                company.code
            )));
        }
        if company.average_service_time_minutes == 0 {
            return Err(invalid(format!(
                "company {}: average_service_time_minutes must be positive",
                code
            )));
        }
        if !company_codes.insert(code.clone()) {
            return Err(invalid(format!("duplicate company code '{}'", code)));
        }
    }

    let mut service_names = HashSet::new();
    for service in &config.services {
        if !service.prefix.is_ascii_alphanumeric() {
            return Err(invalid(format!(
                "service '{}': prefix must be a single letter or digit",
                service.name
            )));
        }
        if !service_names.insert(service.name.trim().to_string()) {
            return Err(invalid(format!(
                "duplicate service name '{}'",
                service.name
            )));
        }
    }

    for flight in &config.flights {
        if flight.flight_number.trim().is_empty() {
            return Err(invalid("flight_number cannot be empty"));
        }
        if !company_codes.contains(&flight.company_code.trim().to_uppercase()) {
            return Err(invalid(format!(
                "flight {} references unknown company '{}'",
                flight.flight_number, flight.company_code
            )));
        }
    }

    let mut counter_names = HashSet::new();
    for counter in &config.counters {
        let name = CounterName::parse(&counter.name)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if !counter_names.insert(name.clone()) {
            return Err(invalid(format!("counter {} configured twice", name)));
        }
        if let Some(ref company) = counter.company {
            if !company_codes.contains(&company.trim().to_uppercase()) {
                return Err(invalid(format!(
                    "counter {} assigned to unknown company '{}'",
                    name, company
                )));
            }
        }
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}
