use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

use super::actions::{ActionResult, ActionTable};
use super::traits::{HandlerError, Scraper};
use super::types::{HandlerResult, Payload};

const DEFAULT_LIMIT: usize = 10;

struct Product {
    id: &'static str,
    title: &'static str,
    price: f64,
    seller: &'static str,
}

const CATALOG: &[Product] = &[
    Product {
        id: "demo-001",
        title: "Smartphone 128GB Black",
        price: 1899.90,
        seller: "demo-store",
    },
    Product {
        id: "demo-002",
        title: "Smartphone 256GB Blue",
        price: 2349.00,
        seller: "demo-store",
    },
    Product {
        id: "demo-003",
        title: "Phone Case Silicone",
        price: 49.90,
        seller: "accessories-hub",
    },
    Product {
        id: "demo-004",
        title: "Wireless Headphones",
        price: 399.00,
        seller: "accessories-hub",
    },
    Product {
        id: "demo-005",
        title: "Laptop 14in 16GB RAM",
        price: 4999.00,
        seller: "demo-store",
    },
];

impl Product {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "price": self.price,
            "seller": self.seller,
        })
    }
}

/// Offline reference handler backed by a fixed catalog
///
/// Lets a fresh deployment exercise the whole job/result round trip without
/// reaching any real site.
#[derive(Debug, Default)]
pub struct DemoScraper;

impl DemoScraper {
    fn search_product(&self, payload: Payload) -> BoxFuture<'_, ActionResult> {
        async move {
            let query = required_str(&payload, "query")?.to_lowercase();
            let limit = match payload.get("limit") {
                None | Some(Value::Null) => DEFAULT_LIMIT,
                Some(value) => value
                    .as_u64()
                    .filter(|limit| *limit > 0)
                    .map(|limit| limit as usize)
                    .ok_or_else(|| {
                        HandlerError::InvalidPayload("limit must be a positive integer".into())
                    })?,
            };

            let matches: Vec<&Product> = CATALOG
                .iter()
                .filter(|product| product.title.to_lowercase().contains(&query))
                .collect();
            let products: Vec<Value> = matches
                .iter()
                .take(limit)
                .map(|product| product.to_json())
                .collect();

            Ok(HandlerResult::completed(Payload::new())
                .with_data("query", query)
                .with_data("total", matches.len())
                .with_data("products", products)
                .with_metadata("source", "demo-catalog"))
        }
        .boxed()
    }

    fn get_product_details(&self, payload: Payload) -> BoxFuture<'_, ActionResult> {
        async move {
            let product_id = required_str(&payload, "product_id")?;

            match CATALOG.iter().find(|product| product.id == product_id) {
                Some(product) => Ok(HandlerResult::completed(Payload::new())
                    .with_data("product", product.to_json())),
                None => Ok(HandlerResult::failed(format!(
                    "product '{product_id}' not found"
                ))),
            }
        }
        .boxed()
    }

    fn get_reviews(&self, _payload: Payload) -> BoxFuture<'_, ActionResult> {
        async { Ok(HandlerResult::pending("not implemented")) }.boxed()
    }
}

impl Scraper for DemoScraper {
    const SITE_ID: &'static str = "demo";

    fn build() -> Result<Self, HandlerError> {
        Ok(DemoScraper)
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new()
            .action("search_product", DemoScraper::search_product)
            .action("get_product_details", DemoScraper::get_product_details)
            .action("get_reviews", DemoScraper::get_reviews)
    }
}

fn required_str<'a>(payload: &'a Payload, field: &str) -> Result<&'a str, HandlerError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| HandlerError::InvalidPayload(format!("field '{field}' is required")))
}
