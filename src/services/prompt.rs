use base64::{engine::general_purpose, Engine};
use serde::Serialize;

use crate::error::GatewayError;
use crate::models::{AnalysisRequest, DietaryProfile, SuggestionCategory};

const SCORE_REFERENCE: &str = "SAFETY SCORE REFERENCE:\n\
1 - Definitely contains all of the user's allergens or conflicts with their dietary restrictions.\n\
2 - Contains one of the user's allergens or conflicts with their dietary restrictions.\n\
3-4 - Highly suggested not to eat because it is unclear if the food is safe.\n\
5-6 - There is likely cross-contamination risk with the user's allergens or dietary restrictions.\n\
7-8 - Low chance of cross-contamination with the user's allergens or dietary restrictions.\n\
9 - Appears safe to eat based on the user's dietary restrictions and allergens.\n\
10 - Meets #9 and is recommended because of additional benefits.";

const MEAL_SCHEMA: &str = "Schema:\n\
{\n\
  \"name\": string,\n\
  \"ingredients\": string,\n\
  \"safetyScore\": int,\n\
  \"reason\": string,\n\
  \"suggestions\": string\n\
}";

const PRODUCT_SCHEMA: &str = "Schema (product):\n\
{\n\
  \"name\": string,\n\
  \"ingredients\": string,\n\
  \"labels\": string,\n\
  \"verifiedClaims\": string,\n\
  \"safetyScore\": int,\n\
  \"reason\": string,\n\
  \"suggestions\": string\n\
}\n\
SPECIAL RULES:\n\
- Use provided labels/claims as authoritative.\n\
- Verified claims must be reflected correctly and never contradicted in the reason.\n\
- Default to traditional preparation of ingredients.";

const NONE: &str = "None";

/// User turn content: one text block, or text plus an inlined image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageData },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageData {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: UserContent,
}

#[cfg(test)]
impl UserContent {
    /// Concatenated text segments, skipping image parts.
    pub fn text(&self) -> String {
        match self {
            UserContent::Text(text) => text.clone(),
            UserContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Builds system and user prompts. Pure: no I/O, same inputs give the same prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        request: &AnalysisRequest,
        profile: &DietaryProfile,
    ) -> Result<Prompt, GatewayError> {
        log::debug!("📝 Building {} prompt", request.kind());
        let restrictions = restrictions_line(profile);

        let prompt = match request {
            AnalysisRequest::Text {
                meal_name,
                description,
            } => Prompt {
                system: meal_system_prompt(),
                user: UserContent::Text(format!(
                    "Consider the user's dietary restrictions: {}.\n\
                     Meal: {}\n\
                     Meal description: {}\n\
                     Analyze the meal based on its traditional, standard recipe unless the description says otherwise.\n\
                     Produce JSON following the schema above.",
                    restrictions,
                    or_none(meal_name),
                    description.trim()
                )),
            },
            AnalysisRequest::Image { image_bytes, notes } => {
                let data_url = encode_image(image_bytes)?;
                Prompt {
                    system: meal_system_prompt(),
                    user: UserContent::Parts(vec![
                        ContentPart::Text {
                            text: format!(
                                "Consider the user's dietary restrictions: {}.\n\
                                 Identify the meal in the photo and its likely ingredients.\n\
                                 Notes: {}\n\
                                 Return JSON following the schema.",
                                restrictions,
                                or_none(notes)
                            ),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageData { url: data_url },
                        },
                    ]),
                }
            }
            AnalysisRequest::Product {
                name,
                ingredients_text,
                labels,
            } => Prompt {
                system: format!(
                    "You are a meticulous nutrition assistant. Output STRICT JSON only.\n{}\n{}",
                    PRODUCT_SCHEMA, SCORE_REFERENCE
                ),
                user: UserContent::Text(format!(
                    "Consider the user's dietary restrictions: {}.\n\
                     Product: {}\n\
                     Ingredients: {}\n\
                     Claims/Labels: {}\n\
                     Return JSON following the schema above.",
                    restrictions,
                    or_none(name),
                    or_none(ingredients_text),
                    or_none(labels)
                )),
            },
            AnalysisRequest::Suggestion { category } => Prompt {
                system: format!(
                    "You are a friendly nutrition assistant giving short, personalized tips.\n\
                     Never suggest anything the user's restrictions rule out.\n{}",
                    SCORE_REFERENCE
                ),
                user: UserContent::Text(format!(
                    "{}\n{}\nOutput only the suggestion (no JSON or extra commentary).",
                    suggestion_template(*category),
                    restrictions
                )),
            },
        };

        Ok(prompt)
    }
}

fn meal_system_prompt() -> String {
    format!(
        "You are a meticulous nutrition assistant. Output STRICT JSON only.\n{}\n{}",
        MEAL_SCHEMA, SCORE_REFERENCE
    )
}

/// "Allergens: ...; Diets: ..." with empty lists rendered as "None".
pub fn restrictions_line(profile: &DietaryProfile) -> String {
    format!(
        "Allergens: {}; Diets: {}",
        join_or_none(&profile.allergens),
        join_or_none(&profile.diets)
    )
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        NONE.to_string()
    } else {
        values.join(", ")
    }
}

fn or_none(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NONE
    } else {
        trimmed
    }
}

pub fn suggestion_template(category: SuggestionCategory) -> &'static str {
    match category {
        SuggestionCategory::CulturalSpotlight => {
            "Give one uncommon meal from another culture, country, or cuisine that the user should try based on these dietary restrictions. (Under 35 words)"
        }
        SuggestionCategory::SafeMeals => {
            "Give one meal that you would suggest the user try based on these dietary restrictions. (Under 35 words)"
        }
        SuggestionCategory::ProductSuggestions => {
            "Give a bullet list (use the '•' symbol) of products and companies you suggest for the user based on these dietary restrictions. (Under 35 words)"
        }
        SuggestionCategory::MealFacts => {
            "Give a fun fact about one of the user's dietary restrictions, such as a common food or product they can or shouldn't eat. (Under 35 words)"
        }
    }
}

/// Encodes image bytes as a `data:` URL, sniffing the MIME type from magic bytes.
pub fn encode_image(bytes: &[u8]) -> Result<String, GatewayError> {
    if bytes.is_empty() {
        return Err(GatewayError::ImageEncodingFailure(
            "image data is empty".to_string(),
        ));
    }

    let mime_type = if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg" // default
    };

    let encoded = general_purpose::STANDARD.encode(bytes);
    log::debug!("🖼️ Encoded {} bytes of {} as {} base64 chars", bytes.len(), mime_type, encoded.len());

    Ok(format!("data:{};base64,{}", mime_type, encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peanut_profile() -> DietaryProfile {
        DietaryProfile::new("Test", ["Peanuts"], Vec::<String>::new())
    }

    #[test]
    fn test_restrictions_line_scenario() {
        let request = AnalysisRequest::Text {
            meal_name: String::new(),
            description: "grilled chicken salad".to_string(),
        };

        let prompt = PromptBuilder::new().build(&request, &peanut_profile()).unwrap();
        let text = prompt.user.text();

        assert!(text.contains("Allergens: Peanuts; Diets: None"));
        assert!(text.contains("grilled chicken salad"));
    }

    #[test]
    fn test_empty_profile_renders_none_in_both_positions() {
        let line = restrictions_line(&DietaryProfile::default());
        assert_eq!(line, "Allergens: None; Diets: None");
    }

    #[test]
    fn test_every_variant_embeds_score_reference() {
        let builder = PromptBuilder::new();
        let profile = peanut_profile();
        let requests = vec![
            AnalysisRequest::Text {
                meal_name: "Soup".to_string(),
                description: "tomato soup".to_string(),
            },
            AnalysisRequest::Image {
                image_bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
                notes: String::new(),
            },
            AnalysisRequest::Product {
                name: "Bar".to_string(),
                ingredients_text: "oats, honey".to_string(),
                labels: String::new(),
            },
            AnalysisRequest::Suggestion {
                category: SuggestionCategory::SafeMeals,
            },
        ];

        for request in requests {
            let prompt = builder.build(&request, &profile).unwrap();
            assert!(
                prompt.system.contains("SAFETY SCORE REFERENCE"),
                "missing rubric for {}",
                request.kind()
            );
            assert!(prompt.system.contains("10 - Meets #9"));
        }
    }

    #[test]
    fn test_image_prompt_has_text_and_image_parts() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A];
        let request = AnalysisRequest::Image {
            image_bytes: png,
            notes: "no sauce".to_string(),
        };

        let prompt = PromptBuilder::new().build(&request, &peanut_profile()).unwrap();

        match prompt.user {
            UserContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[0], ContentPart::Text { text } if text.contains("Notes: no sauce")));
                assert!(matches!(&parts[1], ContentPart::ImageUrl { image_url } if image_url.url.starts_with("data:image/png;base64,")));
            }
            UserContent::Text(_) => panic!("image prompt must be multi-part"),
        }
    }

    #[test]
    fn test_empty_image_fails_encoding() {
        let request = AnalysisRequest::Image {
            image_bytes: Vec::new(),
            notes: String::new(),
        };

        let err = PromptBuilder::new().build(&request, &peanut_profile()).unwrap_err();
        assert_eq!(err.kind(), "image_encoding_failure");
    }

    #[test]
    fn test_product_prompt_marks_labels_authoritative() {
        let request = AnalysisRequest::Product {
            name: "Oat Bar".to_string(),
            ingredients_text: "oats, honey".to_string(),
            labels: "Gluten-free".to_string(),
        };

        let prompt = PromptBuilder::new().build(&request, &peanut_profile()).unwrap();

        assert!(prompt.system.contains("authoritative"));
        assert!(prompt.system.contains("verifiedClaims"));
        assert!(prompt.user.text().contains("Claims/Labels: Gluten-free"));
    }

    #[test]
    fn test_suggestion_templates_are_distinct_and_capped() {
        let mut seen = Vec::new();
        for category in SuggestionCategory::ALL {
            let template = suggestion_template(category);
            assert!(template.contains("(Under 35 words)"));
            assert!(!seen.contains(&template));
            seen.push(template);
        }
    }

    #[test]
    fn test_content_serializes_as_chat_parts() {
        let content = UserContent::Parts(vec![
            ContentPart::Text {
                text: "hi".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageData {
                    url: "data:image/jpeg;base64,AA==".to_string(),
                },
            },
        ]);

        let value = serde_json::to_value(&content).unwrap();

        assert_eq!(value[0]["type"], "text");
        assert_eq!(value[1]["type"], "image_url");
        assert_eq!(value[1]["image_url"]["url"], "data:image/jpeg;base64,AA==");
        assert_eq!(
            serde_json::to_value(UserContent::Text("plain".into())).unwrap(),
            serde_json::json!("plain")
        );
    }
}
