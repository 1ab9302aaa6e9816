//! Customer segmentation by cumulative spend.
//!
//! Three policies are supported:
//!
//! - `quantile`: customers are ordered by spend (descending, ties by id
//!   ascending) and sliced into thirds by position. The top third is VIP,
//!   the middle third Premium, the rest Basic. With fewer than three
//!   ordering customers every customer is Basic.
//! - `fixed-threshold`: `boundaries = (premium_from, vip_from)` spend
//!   cutoffs. Spend at or above `vip_from` is VIP, at or above
//!   `premium_from` is Premium, anything lower is Basic.
//! - `equal-width`: the spend range `[min, max]` is cut into three
//!   equal-width, right-inclusive bins (Basic, Premium, VIP). When every
//!   customer spent the same amount they all land in the middle bin.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shop_domain::{Customer, CustomerId, CustomerSegment};

use crate::error::{AnalyticsError, Result};
use crate::metrics::ratio;
use crate::snapshot::Snapshot;

/// Minimum number of customers the quantile policy slices into thirds.
pub const MIN_QUANTILE_CUSTOMERS: usize = 3;

/// Segmentation policy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentationMethod {
    /// Thirds by spend rank
    #[default]
    Quantile,
    /// Explicit spend cutoffs
    FixedThreshold,
    /// Three equal-width spend bins
    EqualWidth,
}

impl SegmentationMethod {
    /// Method name as accepted by the CLI and environment
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantile => "quantile",
            Self::FixedThreshold => "fixed-threshold",
            Self::EqualWidth => "equal-width",
        }
    }
}

impl fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentationMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quantile" => Ok(Self::Quantile),
            "fixed-threshold" | "fixed_threshold" | "fixed" => Ok(Self::FixedThreshold),
            "equal-width" | "equal_width" => Ok(Self::EqualWidth),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown segmentation method '{other}'"
            ))),
        }
    }
}

/// Segmentation configuration: `{method, boundaries}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Tiering policy
    pub method: SegmentationMethod,
    /// `(premium_from, vip_from)` spend cutoffs, `fixed-threshold` only
    pub boundaries: Option<(f64, f64)>,
}

impl SegmentationConfig {
    /// Quantile thirds, the default.
    pub fn quantile() -> Self {
        Self::default()
    }

    /// Explicit `(premium_from, vip_from)` cutoffs.
    pub fn fixed_threshold(premium_from: f64, vip_from: f64) -> Self {
        Self {
            method: SegmentationMethod::FixedThreshold,
            boundaries: Some((premium_from, vip_from)),
        }
    }

    /// Equal-width spend bins.
    pub fn equal_width() -> Self {
        Self {
            method: SegmentationMethod::EqualWidth,
            boundaries: None,
        }
    }

    /// Check that boundaries are present exactly when the method needs them
    /// and that they form an ordered, non-negative pair.
    pub fn validate(&self) -> Result<()> {
        self.policy().map(|_| ())
    }

    fn policy(&self) -> Result<Policy> {
        match (self.method, self.boundaries) {
            (SegmentationMethod::FixedThreshold, None) => Err(AnalyticsError::InvalidParameter(
                "fixed-threshold segmentation requires boundaries".to_string(),
            )),
            (SegmentationMethod::FixedThreshold, Some((premium_from, vip_from))) => {
                if !(premium_from.is_finite() && vip_from.is_finite())
                    || premium_from < 0.0
                    || premium_from > vip_from
                {
                    return Err(AnalyticsError::InvalidParameter(format!(
                        "segment boundaries must satisfy 0 <= premium <= vip, got ({premium_from}, {vip_from})"
                    )));
                }
                Ok(Policy::FixedThreshold {
                    premium_from,
                    vip_from,
                })
            }
            (method, Some(_)) => Err(AnalyticsError::InvalidParameter(format!(
                "{method} segmentation does not take boundaries"
            ))),
            (SegmentationMethod::Quantile, None) => Ok(Policy::Quantile),
            (SegmentationMethod::EqualWidth, None) => Ok(Policy::EqualWidth),
        }
    }
}

/// Validated segmentation policy.
#[derive(Debug, Clone, Copy)]
enum Policy {
    Quantile,
    FixedThreshold { premium_from: f64, vip_from: f64 },
    EqualWidth,
}

/// Per-customer spend row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSpend {
    /// Customer
    pub customer_id: CustomerId,
    /// Customer name
    pub name: String,
    /// Customer city
    pub city: String,
    /// Orders placed
    pub order_count: u64,
    /// Sum of order totals
    pub total_spend: f64,
    /// Spend per order
    pub average_order_value: f64,
    /// Most recent order
    pub last_purchase: NaiveDateTime,
    /// Assigned tier
    pub segment: CustomerSegment,
}

/// Aggregate over the customers of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Tier
    pub segment: CustomerSegment,
    /// Customers in the tier
    pub customer_count: u64,
    /// Combined spend
    pub total_spend: f64,
    /// Spend per customer, 0 for an empty tier
    pub average_spend: f64,
    /// Orders per customer, 0 for an empty tier
    pub average_orders: f64,
}

/// Segmentation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    /// Policy the customers were tiered with
    pub config: SegmentationConfig,
    /// Tier of every ordering customer
    pub assignments: BTreeMap<CustomerId, CustomerSegment>,
    /// Ordering customers, highest spend first (ties by id ascending)
    pub customers: Vec<CustomerSpend>,
    /// One row per segment: VIP, Premium, Basic
    pub summary: Vec<SegmentSummary>,
}

impl Segmentation {
    /// Tier of a customer, `None` if they never ordered.
    pub fn segment_of(&self, customer_id: CustomerId) -> Option<CustomerSegment> {
        self.assignments.get(&customer_id).copied()
    }

    /// Highest-spending customers.
    pub fn top_customers(&self, limit: usize) -> &[CustomerSpend] {
        &self.customers[..limit.min(self.customers.len())]
    }

    /// Summary row of one tier.
    pub fn summary_for(&self, segment: CustomerSegment) -> Option<&SegmentSummary> {
        self.summary.iter().find(|s| s.segment == segment)
    }
}

struct SpendAccumulator<'a> {
    customer: &'a Customer,
    orders: u64,
    spend: f64,
    last_purchase: NaiveDateTime,
}

/// Assign every ordering customer to a segment.
pub fn segment_customers(snapshot: &Snapshot, config: SegmentationConfig) -> Result<Segmentation> {
    let policy = config.policy()?;

    let mut per_customer: BTreeMap<CustomerId, SpendAccumulator> = BTreeMap::new();
    for order in snapshot.orders() {
        let customer = snapshot.customer_of(order)?;
        per_customer
            .entry(order.customer_id)
            .and_modify(|acc| {
                acc.orders += 1;
                acc.spend += order.total;
                acc.last_purchase = acc.last_purchase.max(order.ordered_at);
            })
            .or_insert(SpendAccumulator {
                customer,
                orders: 1,
                spend: order.total,
                last_purchase: order.ordered_at,
            });
    }

    let mut ranked: Vec<(CustomerId, SpendAccumulator)> = per_customer.into_iter().collect();
    // Stable sort over ascending ids: equal spend keeps id order.
    ranked.sort_by(|(_, a), (_, b)| b.spend.partial_cmp(&a.spend).unwrap_or(Ordering::Equal));

    let spends: Vec<f64> = ranked.iter().map(|(_, acc)| acc.spend).collect();
    let segments = assign(&spends, policy);

    let mut customers = Vec::with_capacity(ranked.len());
    for ((customer_id, acc), segment) in ranked.into_iter().zip(segments) {
        customers.push(CustomerSpend {
            customer_id,
            name: acc.customer.name.clone(),
            city: acc.customer.city.clone(),
            order_count: acc.orders,
            total_spend: acc.spend,
            average_order_value: ratio(acc.spend, acc.orders as f64),
            last_purchase: acc.last_purchase,
            segment,
        });
    }

    let assignments = customers
        .iter()
        .map(|c| (c.customer_id, c.segment))
        .collect();
    let summary = summarize(&customers);

    tracing::debug!(
        method = %config.method,
        customers = customers.len(),
        "Segmented customers"
    );

    Ok(Segmentation {
        config,
        assignments,
        customers,
        summary,
    })
}

/// Segment for each spend value; `spends` is sorted descending.
fn assign(spends: &[f64], policy: Policy) -> Vec<CustomerSegment> {
    match policy {
        Policy::Quantile => {
            let n = spends.len();
            if n < MIN_QUANTILE_CUSTOMERS {
                return vec![CustomerSegment::Basic; n];
            }
            (0..n)
                .map(|index| match index * 3 / n {
                    0 => CustomerSegment::Vip,
                    1 => CustomerSegment::Premium,
                    _ => CustomerSegment::Basic,
                })
                .collect()
        }
        Policy::FixedThreshold {
            premium_from,
            vip_from,
        } => spends
            .iter()
            .map(|&spend| {
                if spend >= vip_from {
                    CustomerSegment::Vip
                } else if spend >= premium_from {
                    CustomerSegment::Premium
                } else {
                    CustomerSegment::Basic
                }
            })
            .collect(),
        Policy::EqualWidth => {
            let max = spends.first().copied().unwrap_or_default();
            let min = spends.last().copied().unwrap_or_default();
            let width = (max - min) / 3.0;
            spends
                .iter()
                .map(|&spend| {
                    if width <= 0.0 {
                        CustomerSegment::Premium
                    } else if spend <= min + width {
                        CustomerSegment::Basic
                    } else if spend <= min + 2.0 * width {
                        CustomerSegment::Premium
                    } else {
                        CustomerSegment::Vip
                    }
                })
                .collect()
        }
    }
}

fn summarize(customers: &[CustomerSpend]) -> Vec<SegmentSummary> {
    CustomerSegment::DESCENDING
        .into_iter()
        .map(|segment| {
            let members = customers.iter().filter(|c| c.segment == segment);
            let (count, spend, orders) = members.fold((0u64, 0.0, 0u64), |(n, s, o), c| {
                (n + 1, s + c.total_spend, o + c.order_count)
            });
            SegmentSummary {
                segment,
                customer_count: count,
                total_spend: spend,
                average_spend: ratio(spend, count as f64),
                average_orders: ratio(orders as f64, count as f64),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;
    use crate::snapshot::fixtures::{self, at, customer, order, product};
    use shop_domain::Category;

    /// Customer `i + 1` buys `spend[i]` worth of a 1.0 product.
    fn spending(spend: &[u32]) -> Snapshot {
        let p = product(1, Category::Books, 1.0);
        let orders = spend
            .iter()
            .enumerate()
            .map(|(i, &qty)| order(i as i64 + 1, i as i64 + 1, &p, qty, at(2, 12)))
            .collect();
        let customers = (1..=spend.len() as i64).map(customer).collect();
        Snapshot::new(vec![p], customers, orders).unwrap()
    }

    fn six_customers(spend: [u32; 6]) -> Snapshot {
        spending(&spend)
    }

    /// Customer counts in VIP, Premium, Basic order.
    fn tier_sizes(seg: &Segmentation) -> [u64; 3] {
        CustomerSegment::DESCENDING.map(|s| seg.summary_for(s).unwrap().customer_count)
    }

    #[test]
    fn test_quantile_thirds() {
        let snapshot = six_customers([10, 60, 30, 50, 20, 40]);
        let seg = segment_customers(&snapshot, SegmentationConfig::quantile()).unwrap();

        let of = |id| seg.segment_of(CustomerId(id)).unwrap();
        assert_eq!(of(2), CustomerSegment::Vip);
        assert_eq!(of(4), CustomerSegment::Vip);
        assert_eq!(of(6), CustomerSegment::Premium);
        assert_eq!(of(3), CustomerSegment::Premium);
        assert_eq!(of(5), CustomerSegment::Basic);
        assert_eq!(of(1), CustomerSegment::Basic);

        let vip = seg.summary_for(CustomerSegment::Vip).unwrap();
        assert_eq!(vip.customer_count, 2);
        assert!((vip.total_spend - 110.0).abs() < 1e-9);
        assert!((vip.average_spend - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_quantile_ties_are_stable() {
        let snapshot = six_customers([20, 20, 20, 20, 20, 20]);
        let first = segment_customers(&snapshot, SegmentationConfig::quantile()).unwrap();
        let second = segment_customers(&snapshot, SegmentationConfig::quantile()).unwrap();
        assert_eq!(first, second);

        let order: Vec<_> = first.customers.iter().map(|c| c.customer_id.get()).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(first.segment_of(CustomerId(1)), Some(CustomerSegment::Vip));
        assert_eq!(first.segment_of(CustomerId(6)), Some(CustomerSegment::Basic));
    }

    #[test]
    fn test_quantile_fallback_below_three_customers() {
        let seg = segment_customers(&fixtures::scenario(), SegmentationConfig::quantile()).unwrap();
        assert_eq!(seg.assignments.len(), 2);
        assert!(seg.assignments.values().all(|s| *s == CustomerSegment::Basic));
        assert_eq!(seg.summary.len(), 3);
        assert_eq!(seg.summary_for(CustomerSegment::Vip).unwrap().customer_count, 0);
        assert_eq!(seg.summary_for(CustomerSegment::Vip).unwrap().average_spend, 0.0);
    }

    #[test]
    fn test_quantile_three_customers() {
        let seg = segment_customers(&spending(&[5, 30, 12]), SegmentationConfig::quantile()).unwrap();
        assert_eq!(tier_sizes(&seg), [1, 1, 1]);
        assert_eq!(seg.segment_of(CustomerId(2)), Some(CustomerSegment::Vip));
        assert_eq!(seg.segment_of(CustomerId(3)), Some(CustomerSegment::Premium));
        assert_eq!(seg.segment_of(CustomerId(1)), Some(CustomerSegment::Basic));
    }

    #[test]
    fn test_quantile_uneven_counts() {
        let four = segment_customers(&spending(&[40, 30, 20, 10]), SegmentationConfig::quantile()).unwrap();
        assert_eq!(tier_sizes(&four), [2, 1, 1]);
        assert_eq!(four.segment_of(CustomerId(2)), Some(CustomerSegment::Vip));
        assert_eq!(four.segment_of(CustomerId(3)), Some(CustomerSegment::Premium));

        let five =
            segment_customers(&spending(&[50, 40, 30, 20, 10]), SegmentationConfig::quantile()).unwrap();
        assert_eq!(tier_sizes(&five), [2, 2, 1]);
        assert_eq!(five.segment_of(CustomerId(4)), Some(CustomerSegment::Premium));
        assert_eq!(five.segment_of(CustomerId(5)), Some(CustomerSegment::Basic));

        let seven = segment_customers(
            &spending(&[70, 60, 50, 40, 30, 20, 10]),
            SegmentationConfig::quantile(),
        )
        .unwrap();
        assert_eq!(tier_sizes(&seven), [3, 2, 2]);
    }

    #[test]
    fn test_unvalidated_config_is_rejected() {
        let config = SegmentationConfig {
            method: SegmentationMethod::FixedThreshold,
            boundaries: None,
        };
        let err = segment_customers(&fixtures::scenario(), config).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter(_)));
    }

    #[test]
    fn test_fixed_threshold() {
        let snapshot = six_customers([10, 60, 30, 50, 20, 40]);
        let config = SegmentationConfig::fixed_threshold(25.0, 50.0);
        let seg = segment_customers(&snapshot, config).unwrap();

        let of = |id| seg.segment_of(CustomerId(id)).unwrap();
        assert_eq!(of(2), CustomerSegment::Vip);
        assert_eq!(of(4), CustomerSegment::Vip);
        assert_eq!(of(3), CustomerSegment::Premium);
        assert_eq!(of(6), CustomerSegment::Premium);
        assert_eq!(of(5), CustomerSegment::Basic);
    }

    #[test]
    fn test_equal_width_bins() {
        // range 10..=70, width 20: (10,30] basic, (30,50] premium, (50,70] vip
        let snapshot = six_customers([10, 70, 30, 31, 50, 51]);
        let seg = segment_customers(&snapshot, SegmentationConfig::equal_width()).unwrap();

        let of = |id| seg.segment_of(CustomerId(id)).unwrap();
        assert_eq!(of(1), CustomerSegment::Basic);
        assert_eq!(of(3), CustomerSegment::Basic);
        assert_eq!(of(4), CustomerSegment::Premium);
        assert_eq!(of(5), CustomerSegment::Premium);
        assert_eq!(of(6), CustomerSegment::Vip);
        assert_eq!(of(2), CustomerSegment::Vip);
    }

    #[test]
    fn test_equal_width_constant_spend() {
        let snapshot = six_customers([5, 5, 5, 5, 5, 5]);
        let seg = segment_customers(&snapshot, SegmentationConfig::equal_width()).unwrap();
        assert!(seg.assignments.values().all(|s| *s == CustomerSegment::Premium));
    }

    #[test]
    fn test_config_validation() {
        assert!(SegmentationConfig::fixed_threshold(100.0, 50.0).validate().is_err());
        assert!(SegmentationConfig::fixed_threshold(-1.0, 50.0).validate().is_err());
        assert!(SegmentationConfig::fixed_threshold(50.0, 50.0).validate().is_ok());

        let missing = SegmentationConfig {
            method: SegmentationMethod::FixedThreshold,
            boundaries: None,
        };
        assert!(missing.validate().is_err());

        let extra = SegmentationConfig {
            method: SegmentationMethod::Quantile,
            boundaries: Some((1.0, 2.0)),
        };
        assert!(extra.validate().is_err());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            "fixed-threshold".parse::<SegmentationMethod>().unwrap(),
            SegmentationMethod::FixedThreshold
        );
        assert_eq!(
            "Quantile".parse::<SegmentationMethod>().unwrap(),
            SegmentationMethod::Quantile
        );
        assert!("kmeans".parse::<SegmentationMethod>().is_err());
    }

    #[test]
    fn test_customer_rows() {
        let p = product(1, Category::Home, 10.0);
        let orders = vec![
            order(1, 1, &p, 1, at(3, 9)),
            order(2, 1, &p, 3, at(7, 20)),
            order(3, 1, &p, 2, at(5, 8)),
        ];
        let snapshot = Snapshot::new(vec![p], vec![customer(1)], orders).unwrap();
        let seg = segment_customers(&snapshot, SegmentationConfig::quantile()).unwrap();

        let row = &seg.customers[0];
        assert_eq!(row.order_count, 3);
        assert!((row.total_spend - 60.0).abs() < 1e-9);
        assert!((row.average_order_value - 20.0).abs() < 1e-9);
        assert_eq!(row.last_purchase, at(7, 20));
    }

    #[test]
    fn test_every_customer_assigned_once() {
        let snapshot = fixtures::random(250);
        let metrics = compute_metrics(&snapshot);
        for config in [
            SegmentationConfig::quantile(),
            SegmentationConfig::equal_width(),
            SegmentationConfig::fixed_threshold(500.0, 2000.0),
        ] {
            let seg = segment_customers(&snapshot, config).unwrap();
            assert_eq!(seg.assignments.len() as u64, metrics.unique_customers);
            let counted: u64 = seg.summary.iter().map(|s| s.customer_count).sum();
            assert_eq!(counted, metrics.unique_customers);
            let spend: f64 = seg.summary.iter().map(|s| s.total_spend).sum();
            assert!((spend - metrics.total_revenue).abs() < 1e-6);
        }
    }
}
