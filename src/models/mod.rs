use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user's stored dietary constraints. Read-only input to every analysis call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProfileFile", rename_all = "camelCase")]
pub struct DietaryProfile {
    pub name: String,
    pub allergens: Vec<String>,
    pub diets: Vec<String>,
    #[serde(rename = "dietaryStruggles")]
    pub struggles: Vec<String>,
    pub reason: String,
}

// On-disk shape; every field is optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    allergens: Vec<String>,
    #[serde(default)]
    diets: Vec<String>,
    #[serde(default)]
    dietary_struggles: Vec<String>,
    #[serde(default)]
    reason: String,
}

impl From<ProfileFile> for DietaryProfile {
    fn from(file: ProfileFile) -> Self {
        Self {
            name: file.name,
            allergens: dedup_preserving_order(file.allergens),
            diets: dedup_preserving_order(file.diets),
            struggles: dedup_preserving_order(file.dietary_struggles),
            reason: file.reason,
        }
    }
}

impl DietaryProfile {
    pub fn new<A, D>(name: impl Into<String>, allergens: A, diets: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            name: name.into(),
            allergens: dedup_preserving_order(allergens.into_iter().map(Into::into)),
            diets: dedup_preserving_order(diets.into_iter().map(Into::into)),
            struggles: Vec::new(),
            reason: String::new(),
        }
    }

    pub fn add_allergen(&mut self, allergen: impl Into<String>) -> bool {
        insert_unique(&mut self.allergens, allergen.into())
    }

    pub fn add_diet(&mut self, diet: impl Into<String>) -> bool {
        insert_unique(&mut self.diets, diet.into())
    }

    pub fn add_struggle(&mut self, struggle: impl Into<String>) -> bool {
        insert_unique(&mut self.struggles, struggle.into())
    }
}

fn insert_unique(values: &mut Vec<String>, value: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let exists = values.iter().any(|v| v.eq_ignore_ascii_case(trimmed));
    if !exists {
        values.push(trimmed.to_string());
    }
    !exists
}

fn dedup_preserving_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        insert_unique(&mut out, value);
    }
    out
}

/// One user action, by input modality. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisRequest {
    Text {
        meal_name: String,
        description: String,
    },
    Image {
        image_bytes: Vec<u8>,
        notes: String,
    },
    Product {
        name: String,
        ingredients_text: String,
        labels: String,
    },
    Suggestion {
        category: SuggestionCategory,
    },
}

impl AnalysisRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::Text { .. } => "text",
            AnalysisRequest::Image { .. } => "image",
            AnalysisRequest::Product { .. } => "product",
            AnalysisRequest::Suggestion { .. } => "suggestion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionCategory {
    CulturalSpotlight,
    SafeMeals,
    ProductSuggestions,
    MealFacts,
}

impl SuggestionCategory {
    pub const ALL: [SuggestionCategory; 4] = [
        SuggestionCategory::CulturalSpotlight,
        SuggestionCategory::SafeMeals,
        SuggestionCategory::ProductSuggestions,
        SuggestionCategory::MealFacts,
    ];

    pub fn from_string(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "cultural spotlight" => Some(SuggestionCategory::CulturalSpotlight),
            "safe meals" => Some(SuggestionCategory::SafeMeals),
            "product suggestions" => Some(SuggestionCategory::ProductSuggestions),
            "meal facts" => Some(SuggestionCategory::MealFacts),
            _ => None,
        }
    }
}

impl std::fmt::Display for SuggestionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SuggestionCategory::CulturalSpotlight => "Cultural Spotlight",
            SuggestionCategory::SafeMeals => "Safe Meals",
            SuggestionCategory::ProductSuggestions => "Product Suggestions",
            SuggestionCategory::MealFacts => "Meal Facts",
        };
        write!(f, "{}", s)
    }
}

/// Typed outcome of a meal or product analysis.
///
/// `safety_score` is 1-10 when the model produced a usable value and 0 otherwise.
/// A 0 means low confidence, not a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub name: String,
    pub ingredients: Vec<String>,
    pub safety_score: u8,
    pub reason: String,
    pub suggestions: String,
}

impl AnalysisResult {
    /// Builds a result from text that was not valid JSON, keeping it as the ingredient list.
    pub fn from_unstructured(name: impl Into<String>, raw: &str) -> Self {
        Self {
            name: name.into(),
            ingredients: split_ingredients(raw),
            safety_score: 0,
            reason: String::new(),
            suggestions: String::new(),
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.safety_score == 0
    }
}

/// Splits a comma-separated ingredient string, trimming and dropping empty items.
pub fn split_ingredients(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Product analysis superset: the base result plus label and claim text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAnalysis {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub labels: String,
    pub verified_claims: String,
}

/// A product record from the open product database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub barcode: String,
    pub name: String,
    pub ingredients_text: String,
    pub labels: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Barcode,
    Text,
    Camera,
    Upload,
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanType::Barcode => "barcode",
            ScanType::Text => "text",
            ScanType::Camera => "camera",
            ScanType::Upload => "upload",
        };
        write!(f, "{}", s)
    }
}

/// History record a caller may build from a result. Storage is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEntry {
    pub id: Option<i64>,
    pub name: String,
    pub ingredients: Vec<String>,
    pub score: u8,
    pub reason: String,
    pub suggestions: String,
    pub bookmarked: bool,
    pub scanned_at: DateTime<Utc>,
    pub scan_type: ScanType,
}

impl ScanEntry {
    pub fn from_result(result: AnalysisResult, scan_type: ScanType) -> Self {
        Self {
            id: None,
            name: result.name,
            ingredients: result.ingredients,
            score: result.safety_score,
            reason: result.reason,
            suggestions: result.suggestions,
            bookmarked: false,
            scanned_at: Utc::now(),
            scan_type,
        }
    }
}
