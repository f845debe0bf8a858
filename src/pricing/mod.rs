//! Instance type pricing
//!
//! Prices are keyed by `(instance type, availability zone)`. A `PriceSource`
//! loads a full snapshot once, signals readiness, and then answers point
//! lookups synchronously. Nothing in here re-prices after the initial load.
//!
//! ## Sources
//!
//! - `AwsPriceSource` (`aws` submodule): spot prices from EC2 spot price
//!   history or on-demand prices from the AWS Price List API.
//! - `StaticPriceSource`: an in-memory `PriceSnapshot`, ready immediately.
//!   Backs the `--price-file` option and the tests.

mod aws;

pub use aws::{parse_on_demand_price, AwsPriceSource};

use crate::error::{ConfigError, Result, SimError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Availability zone used for lookups in a region.
///
/// Always the region's first zone (`us-east-1` -> `us-east-1a`). The zone is
/// only a lookup key and is never checked against the live zone list.
pub fn first_zone(region: &str) -> String {
    format!("{}a", region)
}

/// Pricing mode requested from the price source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityType {
    #[default]
    Spot,
    OnDemand,
}

impl fmt::Display for CapacityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityType::Spot => write!(f, "spot"),
            CapacityType::OnDemand => write!(f, "on-demand"),
        }
    }
}

impl FromStr for CapacityType {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(CapacityType::Spot),
            "on-demand" | "ondemand" | "on_demand" => Ok(CapacityType::OnDemand),
            other => Err(ConfigError::InvalidValue {
                field: "capacity_type".to_string(),
                reason: format!("expected 'spot' or 'on-demand', got '{}'", other),
            }),
        }
    }
}

/// Synchronous point lookup of a price quote
pub trait PriceLookup {
    /// Price for an instance type in a zone, or `None` when there is no quote.
    fn price(&self, instance_type: &str, zone: &str) -> Option<f64>;
}

/// Asynchronously loaded price data
#[async_trait]
pub trait PriceSource: PriceLookup + Send + Sync {
    /// Resolves once the initial snapshot has been loaded.
    ///
    /// Fails if the load itself failed. May never resolve if the loader
    /// stalls; use `wait_until_ready` to bound the wait.
    async fn ready(&self) -> Result<()>;

    /// Every instance type the source has a quote for, in a stable order.
    fn instance_types(&self) -> Vec<String>;
}

/// Wait for the price source's initial snapshot, giving up after `max_wait`.
pub async fn wait_until_ready(source: &dyn PriceSource, max_wait: Duration) -> Result<()> {
    match tokio::time::timeout(max_wait, source.ready()).await {
        Ok(result) => result,
        Err(_) => Err(SimError::StalledReadiness {
            waited_secs: max_wait.as_secs(),
        }),
    }
}

/// One quote in a price file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub instance_type: String,
    pub zone: String,
    pub price: f64,
}

/// On-disk price snapshot (YAML or JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceFile {
    #[serde(default)]
    pub entries: Vec<PriceEntry>,
}

/// Immutable set of quotes taken at one point in time
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    prices: HashMap<(String, String), f64>,
    catalog: BTreeSet<String>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a quote. A later quote for the same key replaces the earlier one.
    pub fn insert(&mut self, instance_type: impl Into<String>, zone: impl Into<String>, price: f64) {
        let instance_type = instance_type.into();
        self.catalog.insert(instance_type.clone());
        self.prices.insert((instance_type, zone.into()), price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Instance types in lexicographic order
    pub fn instance_types(&self) -> Vec<String> {
        self.catalog.iter().cloned().collect()
    }

    /// Load a snapshot from a `.yaml`/`.yml` or `.json` price file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::NotFound(format!("{}: {}", path.display(), e))
        })?;

        let file: PriceFile = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "price_file".to_string(),
                    reason: format!(
                        "unsupported price file extension {:?} (expected .yaml, .yml or .json)",
                        other.unwrap_or("")
                    ),
                }
                .into())
            }
        };

        let mut snapshot = Self::new();
        for entry in file.entries {
            if !entry.price.is_finite() || entry.price < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "price_file".to_string(),
                    reason: format!(
                        "price for {} in {} must be a non-negative number, got {}",
                        entry.instance_type, entry.zone, entry.price
                    ),
                }
                .into());
            }
            snapshot.insert(entry.instance_type, entry.zone, entry.price);
        }
        debug!("Loaded {} quotes from {}", snapshot.len(), path.display());
        Ok(snapshot)
    }
}

impl PriceLookup for PriceSnapshot {
    fn price(&self, instance_type: &str, zone: &str) -> Option<f64> {
        self.prices
            .get(&(instance_type.to_string(), zone.to_string()))
            .copied()
    }
}

/// Price source over a fixed snapshot
pub struct StaticPriceSource {
    snapshot: PriceSnapshot,
}

impl StaticPriceSource {
    pub fn new(snapshot: PriceSnapshot) -> Self {
        Self { snapshot }
    }
}

impl PriceLookup for StaticPriceSource {
    fn price(&self, instance_type: &str, zone: &str) -> Option<f64> {
        self.snapshot.price(instance_type, zone)
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    fn instance_types(&self) -> Vec<String> {
        self.snapshot.instance_types()
    }
}
