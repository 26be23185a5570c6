use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono_tz::Tz;

use crate::google::ServiceAccountKey;

pub const DEFAULT_LLM_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 15;
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/chat";
pub const DEFAULT_WEB_UI_PATH: &str = "./web-ui/src";

/// Where the service account key comes from. It is only read when the
/// gateway is built.
#[derive(Clone, Debug, PartialEq)]
pub enum CredentialSource {
    Base64(String),
    File(PathBuf),
}

impl CredentialSource {
    pub fn load(&self) -> Result<ServiceAccountKey> {
        match self {
            CredentialSource::Base64(encoded) => ServiceAccountKey::from_base64(encoded),
            CredentialSource::File(path) => ServiceAccountKey::from_file(path),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm_api_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_temperature: f64,
    pub max_tool_rounds: usize,
    // Replaces the built-in prompt when set
    pub system_message: Option<String>,
    pub calendar_id: String,
    pub credentials: CredentialSource,
    pub calendar_api_base_url: String,
    pub timezone: Tz,
    pub web_ui_path: String,
}

impl AppConfig {
    /// Read the config from the environment, loading `.env` first if
    /// there is one.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_api_base_url =
            var("TAILOR_LLM_API_BASE").unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string());
        let llm_api_key = var("GEMINI_API_KEY")
            .or_else(|| var("OPENAI_API_KEY"))
            .unwrap_or_else(|| {
                tracing::warn!("No GEMINI_API_KEY or OPENAI_API_KEY set, LLM calls will fail");
                "thiswontwork".to_string()
            });
        let llm_model = var("TAILOR_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let llm_temperature = match var("TAILOR_LLM_TEMPERATURE") {
            Some(v) => v
                .parse::<f64>()
                .map_err(|e| anyhow!("Invalid TAILOR_LLM_TEMPERATURE {}: {}", v, e))?,
            None => 0.0,
        };
        let max_tool_rounds = match var("TAILOR_MAX_TOOL_ROUNDS") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|e| anyhow!("Invalid TAILOR_MAX_TOOL_ROUNDS {}: {}", v, e))?,
            None => DEFAULT_MAX_TOOL_ROUNDS,
        };
        let system_message = var("TAILOR_SYSTEM_MESSAGE");

        let calendar_id = var("TAILOR_CALENDAR_ID")
            .ok_or_else(|| anyhow!("Missing env var TAILOR_CALENDAR_ID"))?;
        let credentials = if let Some(encoded) = var("TAILOR_GOOGLE_CREDENTIALS_B64") {
            CredentialSource::Base64(encoded)
        } else if let Some(path) = var("TAILOR_GOOGLE_CREDENTIALS_PATH")
            .or_else(|| var("GOOGLE_APPLICATION_CREDENTIALS"))
        {
            CredentialSource::File(PathBuf::from(path))
        } else {
            return Err(anyhow!(
                "Missing credentials, set TAILOR_GOOGLE_CREDENTIALS_B64 or TAILOR_GOOGLE_CREDENTIALS_PATH"
            ));
        };
        let calendar_api_base_url = var("TAILOR_CALENDAR_API_BASE")
            .unwrap_or_else(|| crate::google::gcal::DEFAULT_API_BASE_URL.to_string());
        let timezone = match var("TAILOR_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid TAILOR_TIMEZONE {}: {}", name, e))?,
            None => DEFAULT_TIMEZONE,
        };
        let web_ui_path =
            var("TAILOR_WEB_UI_PATH").unwrap_or_else(|| DEFAULT_WEB_UI_PATH.to_string());

        Ok(Self {
            llm_api_base_url,
            llm_api_key,
            llm_model,
            llm_temperature,
            max_tool_rounds,
            system_message,
            calendar_id,
            credentials,
            calendar_api_base_url,
            timezone,
            web_ui_path,
        })
    }
}

/// The chat endpoint the terminal client talks to. Doesn't need the rest
/// of the server config.
pub fn backend_url() -> String {
    let _ = dotenvy::dotenv();
    env::var("TAILOR_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TAILOR_CALENDAR_ID", "team@example.com"),
            ("TAILOR_GOOGLE_CREDENTIALS_PATH", "/secrets/sa.json"),
            ("GEMINI_API_KEY", "key"),
        ]))
        .unwrap();

        assert_eq!(config.llm_api_base_url, DEFAULT_LLM_API_BASE);
        assert_eq!(config.llm_api_key, "key");
        assert_eq!(config.llm_model, "gemini-1.5-flash");
        assert_eq!(config.llm_temperature, 0.0);
        assert_eq!(config.max_tool_rounds, 15);
        assert_eq!(config.system_message, None);
        assert_eq!(
            config.credentials,
            CredentialSource::File(PathBuf::from("/secrets/sa.json"))
        );
        assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.web_ui_path, "./web-ui/src");
    }

    #[test]
    fn test_base64_credentials_take_precedence() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TAILOR_CALENDAR_ID", "team@example.com"),
            ("TAILOR_GOOGLE_CREDENTIALS_B64", "e30="),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/secrets/sa.json"),
            ("TAILOR_TIMEZONE", "Europe/Berlin"),
            ("TAILOR_MAX_TOOL_ROUNDS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.credentials, CredentialSource::Base64("e30=".into()));
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.max_tool_rounds, 3);
    }

    #[test]
    fn test_missing_required_vars() {
        let err = AppConfig::from_lookup(lookup(&[(
            "TAILOR_GOOGLE_CREDENTIALS_PATH",
            "/secrets/sa.json",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("TAILOR_CALENDAR_ID"));

        let err = AppConfig::from_lookup(lookup(&[("TAILOR_CALENDAR_ID", "primary")]))
            .unwrap_err();
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn test_load_credentials_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(include_bytes!("../../tests/fixtures/service_account.json"))
            .unwrap();

        let key = CredentialSource::File(file.path().to_path_buf())
            .load()
            .unwrap();
        assert_eq!(
            key.client_email,
            "tailortalk@tailortalk-test.iam.gserviceaccount.com"
        );

        let missing = CredentialSource::File(PathBuf::from("/nonexistent/sa.json"));
        assert!(missing.load().is_err());
    }

    #[test]
    fn test_invalid_timezone() {
        let err = AppConfig::from_lookup(lookup(&[
            ("TAILOR_CALENDAR_ID", "primary"),
            ("TAILOR_GOOGLE_CREDENTIALS_B64", "e30="),
            ("TAILOR_TIMEZONE", "Mars/Olympus"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }
}
