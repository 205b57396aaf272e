// Service configuration, loaded with the 'config' crate and 'dotenv'

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // JSON file with brands, models and listings served by the in-memory repository
    pub seed_path: String,
    // Search history is appended here as CSV; disabled when unset
    pub history_path: Option<String>,
    // HS256 secret for bearer tokens; without it every request is anonymous
    pub jwt_secret: Option<String>,

    pub default_page_size: u32,
    pub max_page_size: u32,

    pub cache_capacity: usize,
    pub reference_ttl_secs: u64,
    pub facet_ttl_secs: u64,
    pub counter_ttl_secs: u64,
    pub city_facet_limit: usize,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            // Add default values
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("seed_path", "data/seed.json")?
            .set_default("default_page_size", 20)?
            .set_default("max_page_size", 100)?
            .set_default("cache_capacity", 10_000)?
            .set_default("reference_ttl_secs", 3600)?
            .set_default("facet_ttl_secs", 300)?
            .set_default("counter_ttl_secs", 30)?
            .set_default("city_facet_limit", 50)?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_SERVER_ADDRESS)
            .add_source(Environment::with_prefix("APP").try_parsing(true));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            reference: Duration::from_secs(self.reference_ttl_secs),
            facets: Duration::from_secs(self.facet_ttl_secs),
            counters: Duration::from_secs(self.counter_ttl_secs),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            seed_path: "data/seed.json".to_string(),
            history_path: None,
            jwt_secret: None,
            default_page_size: 20,
            max_page_size: 100,
            cache_capacity: 10_000,
            reference_ttl_secs: 3600,
            facet_ttl_secs: 300,
            counter_ttl_secs: 30,
            city_facet_limit: 50,
        }
    }
}

/// Time-to-live per data volatility class.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    /// Brand list and other reference data.
    pub reference: Duration,
    /// Facet snapshots and other live-listing aggregates.
    pub facets: Duration,
    /// Global counters such as the number of live listings.
    pub counters: Duration,
}

