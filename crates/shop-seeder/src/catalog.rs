//! Product catalog and customer roster.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use shop_domain::{Category, Customer, CustomerId, Product, ProductId};

/// Catalog entries: name, category, unit price, stock.
pub const CATALOG: [(&str, Category, f64, u32); 15] = [
    ("Laptop Dell Inspiron", Category::Electronics, 899.99, 25),
    ("iPhone 14", Category::Electronics, 999.99, 15),
    ("Sony Headphones", Category::Electronics, 199.99, 50),
    ("Nike T-Shirt", Category::Clothing, 29.99, 100),
    ("Levi's Jeans", Category::Clothing, 79.99, 75),
    ("Adidas Sneakers", Category::Clothing, 129.99, 60),
    ("Python Programming", Category::Books, 39.99, 30),
    ("Data Science Handbook", Category::Books, 49.99, 25),
    ("Nespresso Coffee Maker", Category::Home, 159.99, 20),
    ("Dyson Vacuum", Category::Home, 299.99, 10),
    ("Samsung Tablet", Category::Electronics, 349.99, 35),
    ("Apple Watch", Category::Electronics, 399.99, 40),
    ("North Face Jacket", Category::Clothing, 149.99, 45),
    ("SQL Fundamentals", Category::Books, 34.99, 40),
    ("LG Microwave", Category::Home, 129.99, 15),
];

/// Customer names, one customer each.
pub const CUSTOMER_NAMES: [&str; 15] = [
    "Ana García",
    "Carlos López",
    "María Rodríguez",
    "Juan Pérez",
    "Laura Martín",
    "Pedro Sánchez",
    "Carmen Ruiz",
    "Miguel Torres",
    "Isabel Flores",
    "David Moreno",
    "Elena Jiménez",
    "Francisco Herrera",
    "Lucía Romero",
    "Antonio Navarro",
    "Cristina Vega",
];

pub const CITIES: [&str; 7] = [
    "Madrid",
    "Barcelona",
    "Valencia",
    "Sevilla",
    "Bilbao",
    "Málaga",
    "Zaragoza",
];

/// Registration happens this many days before the anchor date, inclusive.
pub const REGISTRATION_DAYS: (i64, i64) = (30, 365);

/// Build the product catalog with ids starting at 1.
pub fn products() -> Vec<Product> {
    CATALOG
        .iter()
        .zip(1..)
        .map(|(&(name, category, unit_price, stock), id)| Product {
            id: ProductId(id),
            name: name.to_string(),
            category,
            unit_price,
            stock,
        })
        .collect()
}

/// Derive an email address from a display name:
/// `"Lucía Romero"` becomes `"lucia.romero@email.com"`.
pub fn email_for(name: &str) -> String {
    let local: String = name
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('.'),
            'á' | 'à' => Some('a'),
            'é' | 'è' => Some('e'),
            'í' => Some('i'),
            'ó' => Some('o'),
            'ú' | 'ü' => Some('u'),
            'ñ' => Some('n'),
            c if c.is_ascii_alphanumeric() || c == '.' => Some(c),
            _ => None,
        })
        .collect();
    format!("{local}@email.com")
}

/// Customer roster generator.
pub struct CustomerGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> CustomerGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generate one customer per roster name, registered before `anchor`.
    pub fn generate(&mut self, anchor: NaiveDate) -> Vec<Customer> {
        CUSTOMER_NAMES
            .iter()
            .zip(1..)
            .map(|(&name, id)| {
                let days_before = self
                    .rng
                    .gen_range(REGISTRATION_DAYS.0..=REGISTRATION_DAYS.1);
                let city = CITIES[self.rng.gen_range(0..CITIES.len())];
                Customer {
                    id: CustomerId(id),
                    name: name.to_string(),
                    email: email_for(name),
                    registered_on: anchor - Duration::days(days_before),
                    city: city.to_string(),
                }
            })
            .collect()
    }

    /// Hand the generator's RNG back, so subsequent draws continue the stream.
    pub fn into_rng(self) -> R {
        self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_products() {
        let products = products();
        assert_eq!(products.len(), 15);
        assert_eq!(products[0].id, ProductId(1));
        assert_eq!(products[14].id, ProductId(15));
        assert!(products.iter().all(|p| p.validate().is_ok()));

        let categories: HashSet<_> = products.iter().map(|p| p.category).collect();
        assert_eq!(categories.len(), Category::ALL.len());
    }

    #[test]
    fn test_email_for() {
        assert_eq!(email_for("Lucía Romero"), "lucia.romero@email.com");
        assert_eq!(email_for("Juan Pérez"), "juan.perez@email.com");
    }

    #[test]
    fn test_customers_registered_in_window() {
        let anchor = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let mut generator = CustomerGenerator::new(StdRng::seed_from_u64(7));
        let customers = generator.generate(anchor);

        assert_eq!(customers.len(), CUSTOMER_NAMES.len());
        for c in &customers {
            let days = (anchor - c.registered_on).num_days();
            assert!((30..=365).contains(&days));
            assert!(CITIES.contains(&c.city.as_str()));
        }

        let emails: HashSet<_> = customers.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails.len(), customers.len());
    }
}
