//! End-to-end replacement simulation
//!
//! `Simulation::new` validates the options and compiles the flexibility pattern,
//! so configuration mistakes surface before any pricing work starts.
//! `Simulation::run` then waits for the price source, builds the flexibility
//! set from its catalog and hands everything to the selector.

use crate::config::Options;
use crate::error::{ConfigError, Result};
use crate::flexibility::FlexibilityMatcher;
use crate::pricing::{
    first_zone, wait_until_ready, AwsPriceSource, PriceSnapshot, PriceSource, StaticPriceSource,
};
use crate::report::ReplacementReport;
use crate::selector::{select_candidates, SelectionRequest};
use aws_config::BehaviorVersion;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{info, warn};

pub struct Simulation {
    replacement: String,
    multiplier: f64,
    max_wait: Duration,
    matcher: FlexibilityMatcher,
    show_progress: bool,
}

impl Simulation {
    pub fn new(options: &Options) -> Result<Self> {
        let replacement = options.validate()?.to_string();
        let matcher = FlexibilityMatcher::new(&options.flexibility)?;

        if !(options.pricing_multiplier > 0.0 && options.pricing_multiplier <= 1.0) {
            warn!(
                "Pricing multiplier {} is outside (0, 1]; results may be trivial",
                options.pricing_multiplier
            );
        }

        Ok(Self {
            replacement,
            multiplier: options.pricing_multiplier,
            max_wait: Duration::from_secs(options.max_wait_secs),
            matcher,
            show_progress: false,
        })
    }

    /// Draw a spinner on stderr while waiting for prices
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self, source: &dyn PriceSource, region: &str) -> Result<ReplacementReport> {
        let pb = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .expect("Progress bar template should be valid"),
            );
            pb.set_message("Waiting for pricing data to be pulled");
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let ready = wait_until_ready(source, self.max_wait).await;
        if let Some(p) = pb {
            p.finish_and_clear();
        }
        ready?;

        let catalog = source.instance_types();
        let flexibility_set = self.matcher.flexibility_set(&catalog);
        info!(
            "{} of {} instance types match '{}'",
            flexibility_set.len(),
            catalog.len(),
            self.matcher.pattern()
        );

        let request = SelectionRequest {
            replacement: self.replacement.clone(),
            zone: first_zone(region),
            multiplier: self.multiplier,
        };
        select_candidates(&request, &flexibility_set, source)
    }
}

/// Build the price source the options ask for and resolve the region.
///
/// A price file wins over the AWS APIs. Without an explicit region the AWS
/// shared config region is used.
pub async fn price_source_for(options: &Options) -> Result<(Box<dyn PriceSource>, String)> {
    if let Some(path) = &options.price_file {
        let region = options
            .region
            .clone()
            .ok_or_else(|| ConfigError::MissingField("region".to_string()))?;
        let snapshot = PriceSnapshot::from_file(path)?;
        return Ok((Box::new(StaticPriceSource::new(snapshot)), region));
    }

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &options.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;
    let region = sdk_config
        .region()
        .map(|r| r.to_string())
        .ok_or_else(|| ConfigError::MissingField("region".to_string()))?;

    info!("Loading {} prices for {}", options.capacity_type, region);
    let source = AwsPriceSource::spawn(&sdk_config, &region, options.capacity_type);
    Ok((Box::new(source), region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn test_new_rejects_invalid_pattern() {
        let options = Options {
            replacement: Some("r5.xlarge".to_string()),
            flexibility: "(unclosed".to_string(),
            ..Options::default()
        };
        assert!(matches!(
            Simulation::new(&options),
            Err(SimError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_new_requires_replacement() {
        assert!(Simulation::new(&Options::default()).is_err());
    }

    #[tokio::test]
    async fn test_price_file_requires_region() {
        let options = Options {
            replacement: Some("r5.xlarge".to_string()),
            price_file: Some("prices.yaml".into()),
            ..Options::default()
        };
        let err = price_source_for(&options).await.err().unwrap();
        assert!(matches!(err, SimError::Config(ConfigError::MissingField(_))));
    }

    #[tokio::test]
    async fn test_run_against_static_source() {
        let mut snapshot = PriceSnapshot::new();
        snapshot.insert("r5.xlarge", "us-east-1a", 0.20);
        snapshot.insert("c5.large", "us-east-1a", 0.05);
        snapshot.insert("t3.micro", "us-east-1a", 0.01);
        let source = StaticPriceSource::new(snapshot);

        let options = Options {
            replacement: Some("r5.xlarge".to_string()),
            ..Options::default()
        };
        let report = Simulation::new(&options)
            .unwrap()
            .run(&source, "us-east-1")
            .await
            .unwrap();

        // t3 is outside the default flexibility set even though it is cheapest
        assert_eq!(report.flexibility_set_size, 2);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].instance_type, "c5.large");
        assert_eq!(report.zone, "us-east-1a");
    }

    #[tokio::test]
    async fn test_run_without_replacement_quote() {
        let options = Options {
            replacement: Some("r5.xlarge".to_string()),
            ..Options::default()
        };
        let source = StaticPriceSource::new(PriceSnapshot::new());
        let result = Simulation::new(&options)
            .unwrap()
            .run(&source, "us-east-1")
            .await;
        assert!(matches!(result, Err(SimError::PriceNotFound { .. })));
    }
}
