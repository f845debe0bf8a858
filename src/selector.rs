//! Replacement candidate selection
//!
//! Given the replacement type's price and a flexibility set, keeps the members
//! priced strictly below `replacement price * multiplier`, cheapest first.
//!
//! Each flexibility-set member is priced exactly once and the quotes are copied
//! into a local vector before sorting, so ordering never depends on the price
//! source staying unchanged between lookups.

use crate::error::{Result, SimError};
use crate::pricing::PriceLookup;
use crate::report::{Candidate, Diagnostic, ReplacementReport};
use tracing::{debug, warn};

/// Inputs for one selection run
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub replacement: String,
    pub zone: String,
    /// Not range-checked. `>= 1.0` lets every cheaper-or-equal type through,
    /// `<= 0.0` rejects everything.
    pub multiplier: f64,
}

/// Select replacement candidates from `flexibility_set`.
///
/// Fails with `PriceNotFound` when the replacement type itself has no quote.
/// Members without a quote are skipped and reported as diagnostics.
pub fn select_candidates<P>(
    request: &SelectionRequest,
    flexibility_set: &[String],
    prices: &P,
) -> Result<ReplacementReport>
where
    P: PriceLookup + ?Sized,
{
    let replacement_price = prices
        .price(&request.replacement, &request.zone)
        .ok_or_else(|| SimError::PriceNotFound {
            instance_type: request.replacement.clone(),
        })?;
    let threshold_price = replacement_price * request.multiplier;

    let mut diagnostics = Vec::new();
    let mut priced: Vec<Candidate> = Vec::with_capacity(flexibility_set.len());
    for instance_type in flexibility_set {
        match prices.price(instance_type, &request.zone) {
            Some(price) => priced.push(Candidate {
                instance_type: instance_type.clone(),
                price,
            }),
            None => {
                warn!("Not able to find pricing for {}, skipping", instance_type);
                diagnostics.push(Diagnostic::PriceMissing {
                    instance_type: instance_type.clone(),
                });
            }
        }
    }

    // sort_by is stable: equal prices keep catalog order
    priced.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut candidates = Vec::new();
    for candidate in priced {
        if candidate.price < threshold_price {
            candidates.push(candidate);
        } else {
            debug!(
                "{} (${:.3}) was not below the pricing threshold of ${:.3}",
                candidate.instance_type, candidate.price, threshold_price
            );
            diagnostics.push(Diagnostic::AboveThreshold {
                instance_type: candidate.instance_type,
                price: candidate.price,
                threshold: threshold_price,
            });
        }
    }

    Ok(ReplacementReport {
        replacement: request.replacement.clone(),
        replacement_price,
        threshold_price,
        zone: request.zone.clone(),
        flexibility_set_size: flexibility_set.len(),
        candidates,
        diagnostics,
    })
}
