//! Randomized order generation.

use chrono::{Duration, NaiveDate, NaiveTime};
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use shop_domain::{Customer, Order, OrderId, Product};

/// Orders are placed this many days before the anchor date, inclusive.
pub const ORDER_DAYS: (i64, i64) = (1, 180);

/// Quantity range per order, inclusive.
pub const QUANTITY: (u32, u32) = (1, 5);

/// Order generator drawing customers, products and dates uniformly and the
/// time of day from a normal distribution around mid-afternoon.
pub struct OrderGenerator<R: Rng> {
    rng: R,
    time_of_day: Normal<f64>,
}

impl<R: Rng> OrderGenerator<R> {
    /// Create a generator with orders peaking around 14:00.
    pub fn new(rng: R) -> Result<Self, NormalError> {
        Self::with_peak_hour(rng, 14.0, 3.0)
    }

    /// Create a generator with a custom peak hour and spread (hours).
    pub fn with_peak_hour(rng: R, mean_hour: f64, std_dev_hours: f64) -> Result<Self, NormalError> {
        Ok(Self {
            rng,
            time_of_day: Normal::new(mean_hour, std_dev_hours)?,
        })
    }

    /// Draw a time of day, clamped into the calendar day.
    fn sample_time(&mut self) -> NaiveTime {
        let hours = self.time_of_day.sample(&mut self.rng).clamp(0.0, 23.99);
        let seconds = (hours * 3600.0) as u32 + self.rng.gen_range(0..60);
        NaiveTime::from_num_seconds_from_midnight_opt(seconds.min(86_399), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// Generate a single order with the given id.
    pub fn generate_order(
        &mut self,
        id: i64,
        products: &[Product],
        customers: &[Customer],
        anchor: NaiveDate,
    ) -> Option<Order> {
        if products.is_empty() || customers.is_empty() {
            return None;
        }

        let customer = &customers[self.rng.gen_range(0..customers.len())];
        let product = &products[self.rng.gen_range(0..products.len())];
        let quantity = self.rng.gen_range(QUANTITY.0..=QUANTITY.1);
        let days_before = self.rng.gen_range(ORDER_DAYS.0..=ORDER_DAYS.1);
        let date = anchor - Duration::days(days_before);
        let total = (f64::from(quantity) * product.unit_price * 100.0).round() / 100.0;

        Some(Order {
            id: OrderId(id),
            customer_id: customer.id,
            product_id: product.id,
            quantity,
            ordered_at: date.and_time(self.sample_time()),
            total,
        })
    }

    /// Generate `count` orders with ids `1..=count`.
    pub fn generate(
        &mut self,
        count: usize,
        products: &[Product],
        customers: &[Customer],
        anchor: NaiveDate,
    ) -> Vec<Order> {
        (1..=count as i64)
            .filter_map(|id| self.generate_order(id, products, customers, anchor))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, CustomerGenerator};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_generate_orders() {
        let products = catalog::products();
        let customers = CustomerGenerator::new(StdRng::seed_from_u64(1)).generate(anchor());
        let mut generator = OrderGenerator::new(StdRng::seed_from_u64(2)).unwrap();
        let orders = generator.generate(200, &products, &customers, anchor());

        assert_eq!(orders.len(), 200);
        for order in &orders {
            let product = products.iter().find(|p| p.id == order.product_id).unwrap();
            assert!(order.validate(product).is_ok());
            assert!((1..=5).contains(&order.quantity));
            let days = (anchor() - order.order_date()).num_days();
            assert!((1..=180).contains(&days));
        }
    }

    #[test]
    fn test_empty_inputs_yield_no_orders() {
        let mut generator = OrderGenerator::new(StdRng::seed_from_u64(3)).unwrap();
        assert!(generator.generate(10, &[], &[], anchor()).is_empty());
    }

    #[test]
    fn test_invalid_spread_rejected() {
        assert!(OrderGenerator::with_peak_hour(StdRng::seed_from_u64(4), 14.0, -1.0).is_err());
    }

    #[test]
    fn test_time_of_day_is_centered() {
        let mut generator = OrderGenerator::new(StdRng::seed_from_u64(5)).unwrap();
        let open = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let close = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let afternoon = (0..1000)
            .map(|_| generator.sample_time())
            .filter(|t| (open..=close).contains(t))
            .count();
        // +/- 2 standard deviations around 14:00
        assert!(afternoon > 900);
    }
}
