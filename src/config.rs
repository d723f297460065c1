//! Environment-driven configuration

pub const SERVICE_NAME: &str = "AI Learning Companion";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer credential for the completion endpoint. May be empty, in
    /// which case completion calls will fail with auth errors.
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub db_path: String,
    pub port: u16,
    pub secret_key: String,
    pub token_expiry_minutes: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("COMPANION_DB_PATH").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.companion/companion.db")
        });

        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            max_tokens: env_parsed("MAX_COMPLETION_TOKENS", 1000),
            temperature: env_parsed("COMPLETION_TEMPERATURE", 0.7),
            db_path,
            port: env_parsed("COMPANION_PORT", 8000),
            secret_key: std::env::var("COMPANION_SECRET_KEY")
                .unwrap_or_else(|_| "change-me-in-production".to_string()),
            token_expiry_minutes: env_parsed("COMPANION_TOKEN_EXPIRY_MINUTES", 1440),
        }
    }

    pub fn has_completion_credentials(&self) -> bool {
        !self.openai_api_key.is_empty()
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
