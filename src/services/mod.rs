pub mod catalog; // Open Food Facts barcode lookup
pub mod normalizer;
pub mod openai; // chat-completion gateway
pub mod prompt;
pub mod secrets;

#[cfg(test)]
pub mod mock;

pub use catalog::{OpenFoodFactsClient, ProductCatalog};
pub use openai::{ChatTransport, CompletionOptions, HttpTransport, OpenAIGateway};
pub use prompt::PromptBuilder;
pub use secrets::{Credentials, EnvSecrets, SecretsFile};
