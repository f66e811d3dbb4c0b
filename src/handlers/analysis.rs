use std::sync::Arc;

use crate::error::GatewayError;
use crate::models::{
    AnalysisRequest, AnalysisResult, DietaryProfile, Product, ProductAnalysis, SuggestionCategory,
};
use crate::services::normalizer::{normalize_analysis, normalize_product, normalize_suggestion};
use crate::services::{CompletionOptions, OpenAIGateway, ProductCatalog, PromptBuilder};

// (max_tokens, temperature) per call site. Analysis stays near-deterministic, suggestions vary.
const DESCRIBE_TUNING: (u32, f32) = (700, 0.2);
const PRODUCT_TUNING: (u32, f32) = (600, 0.15);
const IMAGE_TUNING: (u32, f32) = (900, 0.15);
const SUGGESTION_TUNING: (u32, f32) = (60, 0.8);

/// Entry points for the UI layer. Each call is independent and stateless apart from its
/// network request; results are handed back for the caller to store or display.
#[derive(Clone)]
pub struct AnalysisService {
    prompts: PromptBuilder,
    gateway: Arc<OpenAIGateway>,
    catalog: Arc<dyn ProductCatalog>,
    model: String,
}

impl AnalysisService {
    pub fn new(
        gateway: Arc<OpenAIGateway>,
        catalog: Arc<dyn ProductCatalog>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            prompts: PromptBuilder::new(),
            gateway,
            catalog,
            model: model.into(),
        }
    }

    fn options(&self, (max_tokens, temperature): (u32, f32)) -> CompletionOptions {
        CompletionOptions::new(self.model.clone(), max_tokens, temperature)
    }

    pub async fn analyze_description(
        &self,
        text: &str,
        profile: &DietaryProfile,
    ) -> Result<AnalysisResult, GatewayError> {
        self.analyze_meal("", text, profile).await
    }

    /// Like `analyze_description`, with a user-supplied meal name used when the model omits one.
    pub async fn analyze_meal(
        &self,
        meal_name: &str,
        description: &str,
        profile: &DietaryProfile,
    ) -> Result<AnalysisResult, GatewayError> {
        let request = AnalysisRequest::Text {
            meal_name: meal_name.to_string(),
            description: description.to_string(),
        };
        let prompt = self.prompts.build(&request, profile)?;

        let raw = self
            .gateway
            .complete("Describe", &prompt, &self.options(DESCRIBE_TUNING))
            .await?;

        let result = normalize_analysis(&raw, meal_name)?;
        log::info!("✅ Meal analyzed: {} (score {})", result.name, result.safety_score);
        Ok(result)
    }

    /// Returns the detected meal name alongside the analysis.
    pub async fn analyze_image(
        &self,
        image_bytes: &[u8],
        notes: &str,
        profile: &DietaryProfile,
    ) -> Result<(String, AnalysisResult), GatewayError> {
        log::debug!("📸 Starting image analysis ({} bytes)", image_bytes.len());

        let request = AnalysisRequest::Image {
            image_bytes: image_bytes.to_vec(),
            notes: notes.to_string(),
        };
        let prompt = self.prompts.build(&request, profile)?;

        let raw = self
            .gateway
            .complete("Image", &prompt, &self.options(IMAGE_TUNING))
            .await?;

        let result = normalize_analysis(&raw, "")?;
        log::info!("✅ Image analyzed: {} (score {})", result.name, result.safety_score);
        Ok((result.name.clone(), result))
    }

    /// Labels are passed to the model as authoritative claims.
    pub async fn analyze_product(
        &self,
        name: &str,
        ingredients_text: &str,
        labels: &str,
        profile: &DietaryProfile,
    ) -> Result<ProductAnalysis, GatewayError> {
        let request = AnalysisRequest::Product {
            name: name.to_string(),
            ingredients_text: ingredients_text.to_string(),
            labels: labels.to_string(),
        };
        let prompt = self.prompts.build(&request, profile)?;

        let raw = self
            .gateway
            .complete("Product", &prompt, &self.options(PRODUCT_TUNING))
            .await?;

        let analysis = normalize_product(&raw, name)?;
        log::info!(
            "✅ Product analyzed: {} (score {})",
            analysis.result.name,
            analysis.result.safety_score
        );
        Ok(analysis)
    }

    /// Resolves a barcode to a product without analyzing it.
    pub async fn lookup_product(&self, barcode: &str) -> Result<Product, GatewayError> {
        let product = self.catalog.lookup(barcode).await?;
        log::info!("📦 Barcode {} resolved to '{}'", barcode, product.name);
        Ok(product)
    }

    /// Looks the barcode up in the product catalog, then analyzes the product.
    pub async fn analyze_barcode(
        &self,
        barcode: &str,
        profile: &DietaryProfile,
    ) -> Result<ProductAnalysis, GatewayError> {
        let product = self.lookup_product(barcode).await?;
        self.analyze_product(&product.name, &product.ingredients_text, &product.labels, profile)
            .await
    }

    pub async fn fetch_suggestion(
        &self,
        category: SuggestionCategory,
        profile: &DietaryProfile,
    ) -> Result<String, GatewayError> {
        let request = AnalysisRequest::Suggestion { category };
        let prompt = self.prompts.build(&request, profile)?;

        let raw = self
            .gateway
            .complete("Suggestion", &prompt, &self.options(SUGGESTION_TUNING))
            .await?;

        Ok(normalize_suggestion(&raw))
    }
}
