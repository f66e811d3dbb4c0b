use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use inside_analysis::config::AppConfig;
use inside_analysis::models::{AnalysisResult, DietaryProfile, ScanEntry, ScanType, SuggestionCategory};
use inside_analysis::services::{
    Credentials, EnvSecrets, HttpTransport, OpenAIGateway, OpenFoodFactsClient, SecretsFile,
};
use inside_analysis::{AnalysisService, GatewayError};

#[derive(Parser)]
#[command(name = "inside", version, about = "Dietary safety analysis for meals and products")]
struct Cli {
    /// JSON dietary profile; a missing file means no restrictions
    #[arg(long, global = true, env = "INSIDE_PROFILE_PATH")]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a typed meal description
    Describe {
        description: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Analyze a meal photo
    Image {
        path: PathBuf,
        #[arg(long, default_value = "")]
        notes: String,
        /// Record the scan as taken with the camera rather than uploaded
        #[arg(long)]
        camera: bool,
    },
    /// Analyze a packaged product from its label text
    Product {
        name: String,
        #[arg(long)]
        ingredients: String,
        #[arg(long, default_value = "")]
        labels: String,
    },
    /// Look up a barcode and analyze the product
    Barcode { barcode: String },
    /// Fetch a short personalized tip
    Suggest {
        /// cultural-spotlight, safe-meals, product-suggestions or meal-facts
        category: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    log::debug!("⚙️ Loaded config: {:?}", config);

    let profile = load_profile(cli.profile.as_deref())?;
    let service = build_service(&config)?;
    log::info!("✅ Analysis service initialized with model: {}", config.openai_model);

    match cli.command {
        Command::Describe { description, name } => {
            let outcome = service.analyze_meal(&name, &description, &profile).await;
            print_entry(recover(outcome, &name)?, ScanType::Text)?;
        }
        Command::Image { path, notes, camera } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            let outcome = service
                .analyze_image(&bytes, &notes, &profile)
                .await
                .map(|(_, result)| result);
            let scan_type = if camera { ScanType::Camera } else { ScanType::Upload };
            print_entry(recover(outcome, "")?, scan_type)?;
        }
        Command::Product {
            name,
            ingredients,
            labels,
        } => {
            let outcome = service
                .analyze_product(&name, &ingredients, &labels, &profile)
                .await
                .map(|analysis| analysis.result);
            print_entry(recover(outcome, &name)?, ScanType::Barcode)?;
        }
        Command::Barcode { barcode } => {
            let product = service.lookup_product(&barcode).await?;
            let outcome = service
                .analyze_product(&product.name, &product.ingredients_text, &product.labels, &profile)
                .await
                .map(|analysis| analysis.result);
            print_entry(recover(outcome, &product.name)?, ScanType::Barcode)?;
        }
        Command::Suggest { category } => {
            let category = SuggestionCategory::from_string(&category).with_context(|| {
                format!(
                    "unknown category '{}', expected one of: {}",
                    category,
                    SuggestionCategory::ALL
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;
            let text = service.fetch_suggestion(category, &profile).await?;
            println!("{}", text);
        }
    }

    Ok(())
}

fn build_service(config: &AppConfig) -> Result<AnalysisService> {
    let credentials = Arc::new(Credentials::new(
        SecretsFile::new(&config.secrets_path),
        EnvSecrets,
    ));
    let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
    let gateway = Arc::new(OpenAIGateway::new(
        config.openai_endpoint.clone(),
        credentials,
        transport,
    ));
    let catalog = Arc::new(OpenFoodFactsClient::new(
        config.product_endpoint.clone(),
        config.request_timeout,
    )?);

    Ok(AnalysisService::new(gateway, catalog, config.openai_model.clone()))
}

fn load_profile(path: Option<&Path>) -> Result<DietaryProfile> {
    let Some(path) = path else {
        log::info!("ℹ️ No profile given, analyzing without restrictions");
        return Ok(DietaryProfile::default());
    };

    if !path.exists() {
        log::warn!("⚠️ Profile {} not found, analyzing without restrictions", path.display());
        return Ok(DietaryProfile::default());
    }

    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    let profile: DietaryProfile = serde_json::from_str(&data)
        .with_context(|| format!("invalid profile JSON in {}", path.display()))?;

    log::info!(
        "✅ Loaded profile '{}' ({} allergens, {} diets)",
        profile.name,
        profile.allergens.len(),
        profile.diets.len()
    );
    Ok(profile)
}

/// Keeps unstructured model output instead of dropping it on a schema mismatch.
fn recover(outcome: Result<AnalysisResult, GatewayError>, name: &str) -> Result<AnalysisResult> {
    match outcome {
        Ok(result) => Ok(result),
        Err(GatewayError::SchemaMismatch { message, raw }) => {
            log::warn!("⚠️ Showing raw model output ({})", message);
            let name = if name.trim().is_empty() { "Unknown Meal" } else { name };
            Ok(AnalysisResult::from_unstructured(name, &raw))
        }
        Err(e) => {
            log::error!("❌ Analysis failed [{}]: {}", e.kind(), e);
            Err(e.into())
        }
    }
}

fn print_entry(result: AnalysisResult, scan_type: ScanType) -> Result<()> {
    if result.is_low_confidence() {
        log::warn!("⚠️ No safety score for '{}', treat the result with caution", result.name);
    }
    let entry = ScanEntry::from_result(result, scan_type);
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}
