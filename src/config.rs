use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// API keys for the external vision providers. All optional; at least one
/// must be present for the document-AI endpoints to do anything.
#[derive(Debug, Clone, Default)]
pub struct VisionKeys {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl VisionKeys {
    pub fn any_configured(&self) -> bool {
        self.google_api_key.is_some()
            || self.openai_api_key.is_some()
            || self.xai_api_key.is_some()
            || self.groq_api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Sessions
    pub session_ttl_days: i64,

    // File storage
    pub upload_dir: String,
    pub max_upload_bytes: usize,

    // Vision providers
    pub vision_keys: VisionKeys,
    pub vision_timeout_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Sessions
        let session_ttl_days = env::var("SESSION_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        // File storage
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024);

        // Vision providers
        let vision_keys = VisionKeys {
            google_api_key: env::var("GOOGLE_API_KEY").ok().filter(|s| !s.is_empty()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            xai_api_key: env::var("XAI_API_KEY").ok().filter(|s| !s.is_empty()),
            groq_api_key: env::var("GROQ_API_KEY").ok().filter(|s| !s.is_empty()),
        };
        let vision_timeout_seconds = env::var("VISION_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120); // vision LLM calls are slow

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            session_ttl_days,
            upload_dir,
            max_upload_bytes,
            vision_keys,
            vision_timeout_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::from_str("prod"), Environment::Prod);
        assert_eq!(Environment::from_str("PRODUCTION"), Environment::Prod);
        assert_eq!(Environment::from_str("staging"), Environment::Staging);
        assert_eq!(Environment::from_str("dev"), Environment::Dev);
        assert_eq!(Environment::from_str("anything"), Environment::Dev);
    }

    #[test]
    fn vision_keys_any_configured() {
        let none = VisionKeys::default();
        assert!(!none.any_configured());

        let some = VisionKeys {
            groq_api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(some.any_configured());
    }
}
