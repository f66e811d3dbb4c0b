use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::GatewayError;
use crate::models::{split_ingredients, AnalysisResult, ProductAnalysis};

const FENCE: &str = "```";
const UNKNOWN_MEAL: &str = "Unknown Meal";

/// Wire schema shared by every analysis call; product replies add `labels` and `verifiedClaims`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnalysisPayload {
    #[serde(deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_ingredients")]
    ingredients: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_score")]
    safety_score: Option<i64>,
    #[serde(deserialize_with = "lenient_text")]
    reason: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    suggestions: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    labels: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    verified_claims: Option<String>,
}

impl AnalysisPayload {
    fn into_result(self, fallback_name: &str) -> AnalysisResult {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| Some(fallback_name.trim().to_string()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| UNKNOWN_MEAL.to_string());

        AnalysisResult {
            name,
            ingredients: self.ingredients.unwrap_or_default(),
            safety_score: self.safety_score.map(clamp_score).unwrap_or(0),
            reason: self.reason.unwrap_or_default(),
            suggestions: self.suggestions.unwrap_or_default(),
        }
    }
}

/// Removes markdown code fences around model output.
///
/// Applied until nothing changes, so `strip_fences(strip_fences(x)) == strip_fences(x)`.
pub fn strip_fences(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let mut s = text.trim();
    if s.starts_with(FENCE) {
        if let Some(newline) = s.find('\n') {
            s = &s[newline + 1..];
        }
    }
    if s.ends_with(FENCE) {
        if let Some(start) = s.rfind(FENCE) {
            s = &s[..start];
        }
    }
    s.trim().to_string()
}

/// Only 1-10 are meaningful; anything else becomes 0.
fn clamp_score(score: i64) -> u8 {
    if (1..=10).contains(&score) {
        score as u8
    } else {
        0
    }
}

fn decode_payload(raw: &str) -> Result<AnalysisPayload, GatewayError> {
    let cleaned = strip_fences(raw);

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        log::warn!("⚠️ Model output is not JSON: {}", e);
        GatewayError::SchemaMismatch {
            message: e.to_string(),
            raw: cleaned.clone(),
        }
    })?;

    if !value.is_object() {
        log::warn!("⚠️ Model output is JSON but not an object");
        return Err(GatewayError::SchemaMismatch {
            message: "expected a JSON object".to_string(),
            raw: cleaned,
        });
    }

    serde_json::from_value(value).map_err(|e| {
        log::warn!("⚠️ Model output does not fit the analysis schema: {}", e);
        GatewayError::SchemaMismatch {
            message: e.to_string(),
            raw: cleaned,
        }
    })
}

/// Cleans and decodes a meal analysis reply.
pub fn normalize_analysis(raw: &str, fallback_name: &str) -> Result<AnalysisResult, GatewayError> {
    decode_payload(raw).map(|payload| payload.into_result(fallback_name))
}

/// Cleans and decodes a product analysis reply.
pub fn normalize_product(raw: &str, fallback_name: &str) -> Result<ProductAnalysis, GatewayError> {
    let mut payload = decode_payload(raw)?;
    let labels = payload.labels.take().unwrap_or_default();
    let verified_claims = payload.verified_claims.take().unwrap_or_default();

    Ok(ProductAnalysis {
        result: payload.into_result(fallback_name),
        labels,
        verified_claims,
    })
}

pub fn normalize_suggestion(raw: &str) -> String {
    strip_fences(raw)
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

// Accepts a comma-separated string or a list.
fn lenient_ingredients<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(value_to_text)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        other => value_to_text(other).map(|s| split_ingredients(&s)),
    })
}

// Integers, whole floats, and numeric strings; anything else is None.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let raw = "```json\n{\"name\":\"Toast\"}\n```";
        assert_eq!(strip_fences(raw), "{\"name\":\"Toast\"}");
    }

    #[test]
    fn test_strip_fences_passthrough() {
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_fences("plain text"), "plain text");
    }

    #[test]
    fn test_strip_fences_idempotent() {
        let inputs = [
            "```json\n{\"a\":1}\n```",
            "```\n```\nnested\n```\n```",
            "```",
            "```json",
            "text```",
            "",
            "no fences at all",
            "```python\nprint('hi')\n```\n",
        ];
        for input in inputs {
            let once = strip_fences(input);
            assert_eq!(strip_fences(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_chicken_salad_scenario() {
        let raw = r#"{"name":"Grilled Chicken Salad","ingredients":"chicken, lettuce, olive oil","safetyScore":9,"reason":"No peanut content detected.","suggestions":"None needed."}"#;

        let result = normalize_analysis(raw, "").unwrap();

        assert_eq!(result.name, "Grilled Chicken Salad");
        assert_eq!(result.ingredients, vec!["chicken", "lettuce", "olive oil"]);
        assert_eq!(result.safety_score, 9);
        assert_eq!(result.reason, "No peanut content detected.");
        assert_eq!(result.suggestions, "None needed.");
    }

    #[test]
    fn test_fenced_json_decodes() {
        let raw = "```json\n{\"name\":\"Ramen\",\"ingredients\":\"noodles, broth\",\"safetyScore\":4}\n```";
        let result = normalize_analysis(raw, "").unwrap();
        assert_eq!(result.name, "Ramen");
        assert_eq!(result.ingredients, vec!["noodles", "broth"]);
        assert_eq!(result.safety_score, 4);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let result = normalize_analysis("{}", "My Lunch").unwrap();
        assert_eq!(result.name, "My Lunch");
        assert!(result.ingredients.is_empty());
        assert_eq!(result.safety_score, 0);
        assert_eq!(result.reason, "");
        assert_eq!(result.suggestions, "");

        let result = normalize_analysis(r#"{"name":"  "}"#, "").unwrap();
        assert_eq!(result.name, "Unknown Meal");
    }

    #[test]
    fn test_out_of_range_scores_become_zero() {
        for (raw, expected) in [
            (r#"{"safetyScore":11}"#, 0),
            (r#"{"safetyScore":0}"#, 0),
            (r#"{"safetyScore":-3}"#, 0),
            (r#"{"safetyScore":"7"}"#, 7),
            (r#"{"safetyScore":8.0}"#, 8),
            (r#"{"safetyScore":8.5}"#, 0),
            (r#"{"safetyScore":"high"}"#, 0),
            (r#"{"safetyScore":null}"#, 0),
            (r#"{"safetyScore":10}"#, 10),
        ] {
            let result = normalize_analysis(raw, "").unwrap();
            assert_eq!(result.safety_score, expected, "input: {}", raw);
            assert!(result.safety_score <= 10);
        }
    }

    #[test]
    fn test_ingredient_list_and_empty_elements() {
        let result = normalize_analysis(r#"{"ingredients":" rice ,, beans , "}"#, "").unwrap();
        assert_eq!(result.ingredients, vec!["rice", "beans"]);

        let result = normalize_analysis(r#"{"ingredients":["tofu", " ", "soy sauce"]}"#, "").unwrap();
        assert_eq!(result.ingredients, vec!["tofu", "soy sauce"]);
    }

    #[test]
    fn test_reencode_is_lossless() {
        let raw = r#"{"name":"Curry","ingredients":"chickpeas, coconut milk, spices","safetyScore":6,"reason":"May share a fryer.","suggestions":"Ask the kitchen."}"#;
        let first = normalize_analysis(raw, "").unwrap();

        let encoded = serde_json::to_string(&first).unwrap();
        let second = normalize_analysis(&encoded, "").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_json_is_schema_mismatch_with_raw() {
        let err = normalize_analysis("```\nchicken, rice, beans\n```", "").unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
        assert_eq!(err.raw_text(), Some("chicken, rice, beans"));

        let fallback = AnalysisResult::from_unstructured("Bowl", err.raw_text().unwrap());
        assert_eq!(fallback.ingredients, vec!["chicken", "rice", "beans"]);
    }

    #[test]
    fn test_non_object_json_is_schema_mismatch() {
        let err = normalize_analysis("[1, 2, 3]", "").unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn test_product_superset() {
        let raw = r#"{"name":"Oat Bar","ingredients":"oats, honey","labels":"Gluten-free","verifiedClaims":"Certified gluten-free","safetyScore":9,"reason":"Labelled gluten-free.","suggestions":""}"#;

        let product = normalize_product(raw, "Fallback").unwrap();

        assert_eq!(product.result.name, "Oat Bar");
        assert_eq!(product.labels, "Gluten-free");
        assert_eq!(product.verified_claims, "Certified gluten-free");
        assert_eq!(product.result.safety_score, 9);
    }

    #[test]
    fn test_product_name_falls_back_to_product() {
        let product = normalize_product(r#"{"safetyScore":5}"#, "Choco Chips").unwrap();
        assert_eq!(product.result.name, "Choco Chips");
        assert_eq!(product.labels, "");
    }

    #[test]
    fn test_suggestion_is_trimmed_text() {
        assert_eq!(normalize_suggestion("```\nTry injera with lentils.\n```\n"), "Try injera with lentils.");
        assert_eq!(normalize_suggestion("  Try a poke bowl. "), "Try a poke bowl.");
    }
}
