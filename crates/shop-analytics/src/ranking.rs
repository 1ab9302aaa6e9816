//! Top-N product ranking and category revenue share.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use shop_domain::{Category, Product, ProductId};

use crate::error::Result;
use crate::metrics::ratio;
use crate::snapshot::Snapshot;

/// Default length of the product ranking.
pub const DEFAULT_TOP_N: usize = 10;

/// Generic `(label, amount, share)` view of a ranked row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Product name or category
    pub label: String,
    /// Revenue
    pub amount: f64,
    /// Fraction of total revenue
    pub share: f64,
}

/// Product revenue ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRevenue {
    /// 1-based position
    pub rank: u32,
    /// Ranked product
    pub product_id: ProductId,
    /// Product name
    pub name: String,
    /// Product category
    pub category: Category,
    /// Units across all orders
    pub units_sold: u64,
    /// Summed order totals
    pub revenue: f64,
    /// Mean of total / quantity across the product's orders
    pub average_unit_price: f64,
    /// Fraction of total revenue
    pub share: f64,
}

impl From<&ProductRevenue> for RankedEntry {
    fn from(row: &ProductRevenue) -> Self {
        Self {
            label: row.name.clone(),
            amount: row.revenue,
            share: row.share,
        }
    }
}

/// Category revenue share row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    /// Category
    pub category: Category,
    /// Distinct products sold in this category
    pub product_count: u64,
    /// Orders in this category
    pub order_count: u64,
    /// Units in this category
    pub units_sold: u64,
    /// Summed order totals
    pub revenue: f64,
    /// Revenue per order
    pub average_order_value: f64,
    /// Fraction of total revenue
    pub share: f64,
}

impl From<&CategoryShare> for RankedEntry {
    fn from(row: &CategoryShare) -> Self {
        Self {
            label: row.category.as_str().to_string(),
            amount: row.revenue,
            share: row.share,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    units: u64,
    revenue: f64,
    orders: u64,
    unit_price_sum: f64,
}

fn by_revenue_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Rank products by summed order revenue, ties by product id ascending.
pub fn top_products(snapshot: &Snapshot, limit: usize) -> Result<Vec<ProductRevenue>> {
    let mut per_product: BTreeMap<ProductId, (&Product, Accumulator)> = BTreeMap::new();
    let mut grand_total = 0.0;

    for order in snapshot.orders() {
        let product = snapshot.product_of(order)?;
        let (_, acc) = per_product
            .entry(order.product_id)
            .or_insert_with(|| (product, Accumulator::default()));
        acc.units += u64::from(order.quantity);
        acc.revenue += order.total;
        acc.orders += 1;
        acc.unit_price_sum += order.total / f64::from(order.quantity);
        grand_total += order.total;
    }

    let mut ranked: Vec<(&Product, Accumulator)> = per_product.into_values().collect();
    // BTreeMap iteration already yields ascending ids; a stable sort keeps
    // that as the tie-break.
    ranked.sort_by(|(_, a), (_, b)| by_revenue_desc(a.revenue, b.revenue));
    ranked.truncate(limit);

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(i, (product, acc))| ProductRevenue {
            rank: i as u32 + 1,
            product_id: product.id,
            name: product.name.clone(),
            category: product.category,
            units_sold: acc.units,
            revenue: acc.revenue,
            average_unit_price: ratio(acc.unit_price_sum, acc.orders as f64),
            share: ratio(acc.revenue, grand_total),
        })
        .collect())
}

/// Revenue per category as a fraction of total revenue, highest first.
pub fn category_shares(snapshot: &Snapshot) -> Result<Vec<CategoryShare>> {
    let mut per_category: BTreeMap<Category, (Accumulator, BTreeSet<ProductId>)> = BTreeMap::new();
    let mut grand_total = 0.0;

    for order in snapshot.orders() {
        let product = snapshot.product_of(order)?;
        let (acc, products) = per_category.entry(product.category).or_default();
        acc.units += u64::from(order.quantity);
        acc.revenue += order.total;
        acc.orders += 1;
        products.insert(product.id);
        grand_total += order.total;
    }

    let mut shares: Vec<CategoryShare> = per_category
        .into_iter()
        .map(|(category, (acc, products))| CategoryShare {
            category,
            product_count: products.len() as u64,
            order_count: acc.orders,
            units_sold: acc.units,
            revenue: acc.revenue,
            average_order_value: ratio(acc.revenue, acc.orders as f64),
            share: ratio(acc.revenue, grand_total),
        })
        .collect();

    shares.sort_by(|a, b| {
        by_revenue_desc(a.revenue, b.revenue)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });

    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;
    use crate::snapshot::fixtures::{self, at, customer, order, product};

    #[test]
    fn test_top_product_is_p1() {
        let ranked = top_products(&fixtures::scenario(), 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].product_id, ProductId(1));
        assert!((ranked[0].revenue - 30.0).abs() < 1e-9);
        assert_eq!(ranked[0].units_sold, 3);
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn test_full_ranking_order() {
        let ranked = top_products(&fixtures::scenario(), DEFAULT_TOP_N).unwrap();
        let ids: Vec<_> = ranked.iter().map(|r| r.product_id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!((ranked[1].revenue - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_broken_by_product_id() {
        let p3 = product(3, Category::Home, 10.0);
        let p1 = product(1, Category::Home, 5.0);
        let p2 = product(2, Category::Books, 20.0);
        let orders = vec![
            order(1, 1, &p3, 1, at(1, 10)),
            order(2, 1, &p1, 2, at(1, 11)),
            order(3, 1, &p2, 1, at(2, 10)),
        ];
        let snapshot = Snapshot::new(vec![p1, p2, p3], vec![customer(1)], orders).unwrap();

        let ranked = top_products(&snapshot, 10).unwrap();
        let ids: Vec<_> = ranked.iter().map(|r| r.product_id.get()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_category_shares_scenario() {
        let shares = category_shares(&fixtures::scenario()).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].category, Category::Electronics);
        assert!((shares[0].share - 30.0 / 35.0).abs() < 1e-9);
        assert_eq!(shares[1].category, Category::Books);
        assert_eq!(shares[1].product_count, 1);

        let entry = RankedEntry::from(&shares[0]);
        assert_eq!(entry.label, "ELECTRONICS");
    }

    #[test]
    fn test_empty_snapshot_rankings() {
        assert!(top_products(&Snapshot::default(), 10).unwrap().is_empty());
        assert!(category_shares(&Snapshot::default()).unwrap().is_empty());
    }

    #[test]
    fn test_product_revenue_sums_to_total() {
        let snapshot = fixtures::random(300);
        let total = compute_metrics(&snapshot).total_revenue;
        let ranked: f64 = top_products(&snapshot, usize::MAX)
            .unwrap()
            .iter()
            .map(|r| r.revenue)
            .sum();
        assert!((ranked - total).abs() < 1e-6);
    }

    #[test]
    fn test_category_shares_sum_to_one() {
        let snapshot = fixtures::random(300);
        let sum: f64 = category_shares(&snapshot).unwrap().iter().map(|c| c.share).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
