use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::dispatch::DispatchConfig;
use crate::model::CounterStatus;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Airlines, applied at startup.
    #[serde(default)]
    pub companies: Vec<CompanyEntry>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    #[serde(default)]
    pub flights: Vec<FlightEntry>,
    /// Counter routing. Only mutates existing counters.
    #[serde(default)]
    pub counters: Vec<CounterEntry>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits on a locked database file.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("guichet.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// `[[companies]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompanyEntry {
    pub code: String,
    pub name: String,
    pub average_service_time_minutes: u32,
}

/// `[[services]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    pub prefix: char,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// `[[flights]]` entry. `departure_time` is an RFC 3339 string.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlightEntry {
    pub flight_number: String,
    pub company_code: String,
    pub departure_time: DateTime<Utc>,
    #[serde(default = "default_flight_status")]
    pub status: String,
}

fn default_flight_status() -> String {
    "ON_TIME".to_string()
}

/// `[[counters]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CounterEntry {
    /// Must name one of A1..A12, B1..B12.
    pub name: String,
    /// Company code the counter serves; omitted leaves it unassigned.
    #[serde(default)]
    pub company: Option<String>,
    /// Initial status; omitted keeps whatever the store holds.
    #[serde(default)]
    pub status: Option<CounterStatus>,
}

/// Sanitized config for API responses (registry reduced to counts)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub registry: RegistrySummary,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegistrySummary {
    pub companies: usize,
    pub services: usize,
    pub flights: usize,
    pub counters: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            dispatch: config.dispatch.clone(),
            registry: RegistrySummary {
                companies: config.companies.len(),
                services: config.services.len(),
                flights: config.flights.len(),
                counters: config.counters.len(),
            },
        }
    }
}
