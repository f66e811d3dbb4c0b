//! Dietary-safety analysis of meals and packaged products against a user's allergen and diet profile.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use error::GatewayError;
pub use handlers::AnalysisService;
