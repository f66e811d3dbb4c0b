use std::path::PathBuf;

pub const API_KEY_NAME: &str = "OPENAI_API_KEY";
pub const LEGACY_API_KEY_NAME: &str = "OpenAIAPIKey";

/// Read-only key/value lookup for credentials.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// `KEY=value` secrets file kept out of version control. Re-read on every lookup.
#[derive(Debug, Clone)]
pub struct SecretsFile {
    path: PathBuf,
}

impl SecretsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SecretStore for SecretsFile {
    // from_path_iter is the only dotenv 0.15 API that parses without touching the process env.
    #[allow(deprecated)]
    fn get(&self, key: &str) -> Option<String> {
        let iter = match dotenv::from_path_iter(&self.path) {
            Ok(iter) => iter,
            Err(e) => {
                log::debug!("🔑 Secrets file {} unavailable: {}", self.path.display(), e);
                return None;
            }
        };

        for item in iter {
            match item {
                Ok((k, v)) if k == key => return Some(v),
                Ok(_) => {}
                Err(e) => log::warn!("⚠️ Skipping unreadable line in {}: {}", self.path.display(), e),
            }
        }
        None
    }
}

/// App metadata fallback, backed by the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Resolves the API key: secrets file first, then app metadata under the current and legacy names.
pub struct Credentials {
    secrets: Box<dyn SecretStore>,
    metadata: Box<dyn SecretStore>,
}

impl Credentials {
    pub fn new(secrets: impl SecretStore + 'static, metadata: impl SecretStore + 'static) -> Self {
        Self {
            secrets: Box::new(secrets),
            metadata: Box::new(metadata),
        }
    }

    pub fn api_key(&self) -> Option<String> {
        non_empty(self.secrets.get(API_KEY_NAME))
            .or_else(|| non_empty(self.metadata.get(API_KEY_NAME)))
            .or_else(|| non_empty(self.metadata.get(LEGACY_API_KEY_NAME)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
