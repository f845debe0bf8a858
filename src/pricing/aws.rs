//! AWS-backed price source
//!
//! The snapshot is loaded once in a background task and published through a
//! `watch` channel. Spot quotes come from EC2 spot price history (the latest
//! quote per instance type and zone). On-demand quotes come from the Price
//! List API, which is region-wide, so they are filed under the region's first
//! zone.

use super::{first_zone, CapacityType, PriceLookup, PriceSnapshot, PriceSource};
use crate::error::{Result, SimError};
use crate::retry::{ExponentialBackoffPolicy, RetryPolicy};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::primitives::DateTime;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_pricing::types::{Filter, FilterType};
use aws_sdk_pricing::Client as PricingClient;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The Price List API is only served from a few regions.
const PRICING_API_REGION: &str = "us-east-1";

const SPOT_PRODUCT_DESCRIPTION: &str = "Linux/UNIX";

#[derive(Debug, Clone)]
enum LoadState {
    Loading,
    Ready(Arc<PriceSnapshot>),
    Failed(String),
}

/// Price source backed by the EC2 and Price List APIs
pub struct AwsPriceSource {
    state: watch::Receiver<LoadState>,
}

impl AwsPriceSource {
    /// Start loading prices for `region` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(sdk_config: &SdkConfig, region: &str, capacity_type: CapacityType) -> Self {
        let (tx, rx) = watch::channel(LoadState::Loading);
        let region = region.to_string();

        match capacity_type {
            CapacityType::Spot => {
                let client = Ec2Client::new(sdk_config);
                tokio::spawn(async move {
                    let state = into_state(load_spot_prices(&client).await);
                    let _ = tx.send(state);
                });
            }
            CapacityType::OnDemand => {
                let pricing_config = aws_sdk_pricing::config::Builder::from(sdk_config)
                    .region(aws_sdk_pricing::config::Region::new(PRICING_API_REGION))
                    .build();
                let client = PricingClient::from_conf(pricing_config);
                tokio::spawn(async move {
                    let state = into_state(load_on_demand_prices(&client, &region).await);
                    let _ = tx.send(state);
                });
            }
        }

        Self::from_receiver(rx)
    }

    fn from_receiver(state: watch::Receiver<LoadState>) -> Self {
        Self { state }
    }

    fn snapshot(&self) -> Option<Arc<PriceSnapshot>> {
        match &*self.state.borrow() {
            LoadState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }
}

fn into_state(result: Result<PriceSnapshot>) -> LoadState {
    match result {
        Ok(snapshot) => {
            info!("Pricing data loaded ({} quotes)", snapshot.len());
            LoadState::Ready(Arc::new(snapshot))
        }
        Err(e) => {
            warn!("Failed to load pricing data: {}", e);
            LoadState::Failed(e.to_string())
        }
    }
}

impl PriceLookup for AwsPriceSource {
    fn price(&self, instance_type: &str, zone: &str) -> Option<f64> {
        self.snapshot()?.price(instance_type, zone)
    }
}

#[async_trait]
impl PriceSource for AwsPriceSource {
    async fn ready(&self) -> Result<()> {
        let mut rx = self.state.clone();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                LoadState::Ready(_) => return Ok(()),
                LoadState::Failed(message) => return Err(SimError::Pricing(message)),
                LoadState::Loading => {}
            }
            rx.changed().await.map_err(|_| {
                SimError::Pricing("pricing loader exited before publishing prices".to_string())
            })?;
        }
    }

    fn instance_types(&self) -> Vec<String> {
        self.snapshot()
            .map(|s| s.instance_types())
            .unwrap_or_default()
    }
}

async fn load_spot_prices(client: &Ec2Client) -> Result<PriceSnapshot> {
    let policy = ExponentialBackoffPolicy::for_cloud_api();
    // Asking for history starting now returns the current quote per type and zone.
    let now = DateTime::from(SystemTime::now());
    let mut latest: HashMap<(String, String), (i64, f64)> = HashMap::new();
    let mut next_token: Option<String> = None;

    loop {
        let token = next_token.clone();
        let response = policy
            .execute_with_retry(|| {
                let request = client
                    .describe_spot_price_history()
                    .product_descriptions(SPOT_PRODUCT_DESCRIPTION)
                    .start_time(now)
                    .set_next_token(token.clone());
                async move {
                    request.send().await.map_err(|e| {
                        SimError::Aws(format!("Failed to describe spot price history: {}", e))
                    })
                }
            })
            .await?;

        for quote in response.spot_price_history() {
            let (Some(instance_type), Some(zone), Some(price)) = (
                quote.instance_type(),
                quote.availability_zone(),
                quote.spot_price().and_then(parse_price),
            ) else {
                continue;
            };
            let timestamp = quote.timestamp().map(|t| t.secs()).unwrap_or(0);
            let key = (instance_type.as_str().to_string(), zone.to_string());
            match latest.get(&key) {
                Some((seen, _)) if *seen >= timestamp => {}
                _ => {
                    latest.insert(key, (timestamp, price));
                }
            }
        }

        next_token = response
            .next_token()
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    let mut snapshot = PriceSnapshot::new();
    for ((instance_type, zone), (_, price)) in latest {
        snapshot.insert(instance_type, zone, price);
    }
    debug!("Loaded {} spot quotes", snapshot.len());
    Ok(snapshot)
}

async fn load_on_demand_prices(client: &PricingClient, region: &str) -> Result<PriceSnapshot> {
    let policy = ExponentialBackoffPolicy::for_cloud_api();
    let filters = on_demand_filters(region)?;
    let zone = first_zone(region);
    let mut snapshot = PriceSnapshot::new();
    let mut next_token: Option<String> = None;

    loop {
        let token = next_token.clone();
        let response = policy
            .execute_with_retry(|| {
                let request = client
                    .get_products()
                    .service_code("AmazonEC2")
                    .set_filters(Some(filters.clone()))
                    .set_next_token(token.clone());
                async move {
                    request.send().await.map_err(|e| {
                        SimError::Aws(format!("Failed to get on-demand products: {}", e))
                    })
                }
            })
            .await?;

        for product in response.price_list() {
            match parse_on_demand_price(product) {
                Some((instance_type, price)) => snapshot.insert(instance_type, zone.clone(), price),
                None => debug!("Skipping price list entry without a usable on-demand price"),
            }
        }

        next_token = response
            .next_token()
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    debug!("Loaded {} on-demand quotes for {}", snapshot.len(), region);
    Ok(snapshot)
}

fn on_demand_filters(region: &str) -> Result<Vec<Filter>> {
    [
        ("regionCode", region),
        ("operatingSystem", "Linux"),
        ("tenancy", "Shared"),
        ("preInstalledSw", "NA"),
        ("capacitystatus", "Used"),
        ("marketoption", "OnDemand"),
        ("productFamily", "Compute Instance"),
    ]
    .into_iter()
    .map(|(field, value)| {
        Filter::builder()
            .r#type(FilterType::TermMatch)
            .field(field)
            .value(value)
            .build()
            .map_err(|e| SimError::Aws(format!("Invalid pricing filter {}: {}", field, e)))
    })
    .collect()
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

/// Extract `(instance type, hourly USD price)` from one Price List API product document.
///
/// Returns `None` for products without an instance type or without a
/// positive on-demand USD price (e.g. reservation-only SKUs).
pub fn parse_on_demand_price(product_json: &str) -> Option<(String, f64)> {
    let product: Value = serde_json::from_str(product_json).ok()?;
    let instance_type = product
        .pointer("/product/attributes/instanceType")?
        .as_str()?
        .to_string();

    let price = product
        .pointer("/terms/OnDemand")?
        .as_object()?
        .values()
        .filter_map(|term| term.get("priceDimensions")?.as_object())
        .flat_map(|dimensions| dimensions.values())
        .filter_map(|dimension| dimension.pointer("/pricePerUnit/USD")?.as_str())
        .filter_map(parse_price)
        .find(|p| *p > 0.0)?;

    Some((instance_type, price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::wait_until_ready;
    use std::time::Duration;

    const M5_LARGE: &str = r#"{
        "product": {
            "productFamily": "Compute Instance",
            "attributes": { "instanceType": "m5.large", "regionCode": "us-east-1" },
            "sku": "ABC123"
        },
        "terms": {
            "OnDemand": {
                "ABC123.JRTCKXETXF": {
                    "priceDimensions": {
                        "ABC123.JRTCKXETXF.6YS6EN2CT7": {
                            "unit": "Hrs",
                            "pricePerUnit": { "USD": "0.0960000000" }
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_on_demand_price() {
        let (instance_type, price) = parse_on_demand_price(M5_LARGE).unwrap();
        assert_eq!(instance_type, "m5.large");
        assert!((price - 0.096).abs() < 1e-9);
    }

    #[test]
    fn test_parse_on_demand_price_without_terms() {
        let json = r#"{"product":{"attributes":{"instanceType":"m5.large"}},"terms":{}}"#;
        assert!(parse_on_demand_price(json).is_none());
    }

    #[test]
    fn test_parse_on_demand_price_zero_price() {
        let json = M5_LARGE.replace("0.0960000000", "0.0000000000");
        assert!(parse_on_demand_price(&json).is_none());
    }

    #[test]
    fn test_parse_on_demand_price_garbage() {
        assert!(parse_on_demand_price("not json").is_none());
    }

    #[test]
    fn test_on_demand_filters_pin_one_sku_per_type() {
        let filters = on_demand_filters("eu-west-1").unwrap();
        let pairs: Vec<(&str, &str)> = filters.iter().map(|f| (f.field(), f.value())).collect();
        assert!(pairs.contains(&("regionCode", "eu-west-1")));
        assert!(pairs.contains(&("marketoption", "OnDemand")));
        assert!(pairs.contains(&("productFamily", "Compute Instance")));
        assert!(filters.iter().all(|f| *f.r#type() == FilterType::TermMatch));
    }

    fn loaded_snapshot() -> Arc<PriceSnapshot> {
        let mut snapshot = PriceSnapshot::new();
        snapshot.insert("m5.large", "us-east-1a", 0.096);
        snapshot.insert("c5.large", "us-east-1a", 0.085);
        Arc::new(snapshot)
    }

    #[tokio::test]
    async fn test_ready_after_load() {
        let (tx, rx) = watch::channel(LoadState::Loading);
        let source = AwsPriceSource::from_receiver(rx);
        assert!(source.instance_types().is_empty());
        assert_eq!(source.price("m5.large", "us-east-1a"), None);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(LoadState::Ready(loaded_snapshot()));
        });

        source.ready().await.unwrap();
        assert_eq!(source.instance_types(), vec!["c5.large", "m5.large"]);
        assert_eq!(source.price("m5.large", "us-east-1a"), Some(0.096));
    }

    #[tokio::test]
    async fn test_ready_reports_load_failure() {
        let (tx, rx) = watch::channel(LoadState::Loading);
        let source = AwsPriceSource::from_receiver(rx);
        tx.send(LoadState::Failed("throttled".to_string())).unwrap();

        match source.ready().await {
            Err(SimError::Pricing(message)) => assert_eq!(message, "throttled"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(source.instance_types().is_empty());
    }

    #[tokio::test]
    async fn test_ready_fails_when_loader_exits_early() {
        let (tx, rx) = watch::channel(LoadState::Loading);
        let source = AwsPriceSource::from_receiver(rx);
        drop(tx);

        match source.ready().await {
            Err(SimError::Pricing(message)) => assert!(message.contains("exited")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stuck_loader_times_out() {
        let (_tx, rx) = watch::channel(LoadState::Loading);
        let source = AwsPriceSource::from_receiver(rx);

        let result = wait_until_ready(&source, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SimError::StalledReadiness { .. })));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("0.0412"), Some(0.0412));
        assert_eq!(parse_price(" 1.5 "), Some(1.5));
        assert_eq!(parse_price("-1"), None);
        assert_eq!(parse_price("NaN"), None);
    }
}
