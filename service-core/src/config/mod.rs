//! Settings shared by every service in the workspace.
//!
//! Service-specific configuration (stores, TTLs, CORS) lives in each
//! service's own config module; this covers only the part common to all
//! of them. Values come from an optional `configuration` file overlaid
//! with `APP__`-prefixed environment variables.

use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Listen address on all interfaces at the configured port.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_uses_the_configured_port() {
        let config = Config { port: 9090 };
        assert_eq!(config.bind_address().to_string(), "0.0.0.0:9090");
    }
}
