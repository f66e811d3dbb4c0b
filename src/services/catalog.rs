use std::time::Duration;

use serde_json::Value;

use crate::error::GatewayError;
use crate::models::Product;

const UNKNOWN_PRODUCT: &str = "Unknown Product";
const NO_INGREDIENTS: &str = "Ingredients not listed";

/// Barcode lookup against a product database.
#[async_trait::async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(&self, barcode: &str) -> Result<Product, GatewayError>;
}

/// Open Food Facts v0 product API client.
pub struct OpenFoodFactsClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::TransportFailure(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn product_url(&self, barcode: &str) -> String {
        format!(
            "{}/api/v0/product/{}.json",
            self.base_url.trim_end_matches('/'),
            barcode
        )
    }
}

#[async_trait::async_trait]
impl ProductCatalog for OpenFoodFactsClient {
    async fn lookup(&self, barcode: &str) -> Result<Product, GatewayError> {
        validate_barcode(barcode)?;

        let url = self.product_url(barcode);
        log::info!("🔎 Looking up barcode {}", barcode);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Product lookup error ({}): {}", status, error_text);
            return Err(GatewayError::TransportFailure(format!(
                "product lookup error ({}): {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(GatewayError::NoResponseBody);
        }

        let document: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedEnvelope(format!("product body is not JSON: {}", e)))?;

        product_from_document(barcode, &document)
    }
}

pub fn validate_barcode(barcode: &str) -> Result<(), GatewayError> {
    if barcode.is_empty() || !barcode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::InvalidEndpoint(format!(
            "invalid barcode '{}'",
            barcode
        )));
    }
    Ok(())
}

/// Extracts a product from a lookup document, preferring English fields.
pub fn product_from_document(barcode: &str, document: &Value) -> Result<Product, GatewayError> {
    if document.get("status").and_then(Value::as_i64) == Some(0) {
        log::warn!("⚠️ No product found for barcode {}", barcode);
        return Err(GatewayError::ProductNotFound(barcode.to_string()));
    }

    let product = document
        .get("product")
        .filter(|p| p.is_object())
        .ok_or_else(|| {
            log::warn!("⚠️ Lookup for barcode {} returned no product object", barcode);
            GatewayError::ProductNotFound(barcode.to_string())
        })?;

    Ok(Product {
        barcode: barcode.to_string(),
        name: first_text(product, &["product_name_en", "product_name"])
            .unwrap_or(UNKNOWN_PRODUCT)
            .to_string(),
        ingredients_text: first_text(product, &["ingredients_text_en", "ingredients_text"])
            .unwrap_or(NO_INGREDIENTS)
            .to_string(),
        labels: first_text(product, &["labels"]).unwrap_or_default().to_string(),
    })
}

fn first_text<'a>(product: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| product.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}
