use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Signing secret used when `jwt_secret` is not configured. Development only.
pub const INSECURE_DEV_JWT_SECRET: &str = "content-studio-insecure-development-secret";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub frontend_url: Option<String>,

    // Identity
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub starting_credits: i64,

    // Content workflow
    pub generation_cost: i64,

    // Cloudflare Workers AI
    pub cloudflare_account_id: String,
    pub cloudflare_api_token: String,
    pub cloudflare_base_url: String,
    pub ai_timeout_secs: u64,

    // Object storage
    pub aws_region: String,
    pub s3_bucket: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("STUDIO"))
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("token_ttl_hours", 24 * 7)?
            .set_default("starting_credits", 200)?
            .set_default("generation_cost", 10)?
            .set_default("cloudflare_account_id", "")?
            .set_default("cloudflare_api_token", "")?
            .set_default(
                "cloudflare_base_url",
                "https://api.cloudflare.com/client/v4",
            )?
            .set_default("ai_timeout_secs", 120)?
            .set_default("aws_region", "eu-central-1")?
            .set_default("s3_bucket", "content-studio-images")?
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation_cost <= 0 {
            return Err(ConfigError::Message(
                "generation_cost must be positive".to_string(),
            ));
        }
        if self.starting_credits < 0 {
            return Err(ConfigError::Message(
                "starting_credits must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn auth_settings(&self) -> AuthSettings {
        let secret = match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => INSECURE_DEV_JWT_SECRET.to_string(),
        };

        AuthSettings {
            jwt_secret: secret,
            token_ttl: chrono::Duration::hours(self.token_ttl_hours),
            starting_credits: self.starting_credits,
        }
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}

/// Everything the identity service needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub starting_credits: i64,
}

impl AuthSettings {
    pub fn uses_insecure_default(&self) -> bool {
        self.jwt_secret == INSECURE_DEV_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/studio".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            frontend_url: None,
            jwt_secret: None,
            token_ttl_hours: 168,
            starting_credits: 200,
            generation_cost: 10,
            cloudflare_account_id: "acct".to_string(),
            cloudflare_api_token: "token".to_string(),
            cloudflare_base_url: "https://api.cloudflare.com/client/v4".to_string(),
            ai_timeout_secs: 120,
            aws_region: "eu-central-1".to_string(),
            s3_bucket: "bucket".to_string(),
        }
    }

    #[test]
    fn missing_or_empty_secret_falls_back_to_dev_default() {
        let mut config = base_config();
        assert!(config.auth_settings().uses_insecure_default());

        config.jwt_secret = Some(String::new());
        assert!(config.auth_settings().uses_insecure_default());
    }

    #[test]
    fn configured_secret_is_used_with_seven_day_ttl() {
        let mut config = base_config();
        config.jwt_secret = Some("prod-secret".to_string());

        let settings = config.auth_settings();
        assert_eq!(settings.jwt_secret, "prod-secret");
        assert!(!settings.uses_insecure_default());
        assert_eq!(settings.token_ttl, chrono::Duration::days(7));
        assert_eq!(settings.starting_credits, 200);
    }

    #[test]
    fn non_positive_generation_cost_is_rejected() {
        let mut config = base_config();
        assert!(config.validate().is_ok());

        config.generation_cost = 0;
        assert!(config.validate().is_err());

        config.generation_cost = -5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_starting_credits_are_rejected() {
        let mut config = base_config();
        config.starting_credits = 0;
        assert!(config.validate().is_ok());

        config.starting_credits = -1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("starting_credits"));
    }
}
