//! Configuration module for billing-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub const DEFAULT_ASAAS_API_URL: &str = "https://sandbox.asaas.com/api/v3";

/// Longest accepted offset for the first due date.
pub const MAX_DUE_DAYS: i64 = 365;

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub asaas: AsaasConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AsaasConfig {
    pub api_key: Secret<String>,
    pub api_base_url: String,
    /// Payment method offered on new subscriptions; `UNDEFINED` lets the payer choose.
    pub billing_type: String,
    /// Days from today until the first charge is due.
    pub due_in_days: i64,
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "billing-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2),
            },
            asaas: AsaasConfig {
                api_key: Secret::new(env::var("ASAAS_API_KEY").unwrap_or_default()),
                api_base_url: env::var("ASAAS_API_URL")
                    .unwrap_or_else(|_| DEFAULT_ASAAS_API_URL.to_string()),
                billing_type: env::var("ASAAS_BILLING_TYPE")
                    .unwrap_or_else(|_| "UNDEFINED".to_string()),
                due_in_days: validate_due_days(parse_env("ASAAS_DUE_DAYS", 0))?,
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn validate_due_days(days: i64) -> Result<i64, AppError> {
    if (0..=MAX_DUE_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "ASAAS_DUE_DAYS must be between 0 and {}, got {}",
            MAX_DUE_DAYS,
            days
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_days_within_range_are_accepted() {
        assert_eq!(validate_due_days(0).unwrap(), 0);
        assert_eq!(validate_due_days(7).unwrap(), 7);
        assert_eq!(validate_due_days(MAX_DUE_DAYS).unwrap(), MAX_DUE_DAYS);
    }

    #[test]
    fn due_days_out_of_range_are_config_errors() {
        for days in [-1, MAX_DUE_DAYS + 1, 200_000_000, i64::MAX] {
            assert!(
                matches!(validate_due_days(days), Err(AppError::ConfigError(_))),
                "days {days}"
            );
        }
    }
}
