use std::env;
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::batch::BatchOptions;
use crate::diagnostics::DiagnosticsSink;
use crate::error::FatalPrecondition;
use crate::parser::StructuredParser;
use crate::pipeline::PipelineSettings;
use crate::reconcile::PartialPolicy;

const DOTENV_HINT: &str = "To fix this, create ~/.config/news-brief/.env with:\n  \
    GEMINI_API_KEY=your_key_here\n\n\
    Get a Gemini API key from: https://aistudio.google.com/app/apikey";

const EMAIL_HINT: &str = "Sending the brief needs EMAIL_SENDER, EMAIL_PASSWORD and EMAIL_RECIPIENT.\n\
    Add them to ~/.config/news-brief/.env (for Gmail, use an app password).";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl EmailConfig {
    /// SMTP settings alone, for commands that only deliver a saved brief.
    pub fn from_env() -> Result<Self, FatalPrecondition> {
        try_load_dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, FatalPrecondition>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self::read(&get)?.ok_or_else(missing_email)
    }

    /// `None` unless sender, password and recipient are all set.
    fn read<G>(get: &G) -> Result<Option<Self>, FatalPrecondition>
    where
        G: Fn(&str) -> Option<String>,
    {
        match (get("EMAIL_SENDER"), get("EMAIL_PASSWORD"), get("EMAIL_RECIPIENT")) {
            (Some(sender), Some(password), Some(recipient)) => Ok(Some(Self {
                sender,
                password,
                recipient,
                smtp_host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                smtp_port: parsed(get, "SMTP_PORT", 587)?,
            })),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub feeds_path: PathBuf,
    pub lookback_hours: i64,
    pub batch_size: NonZeroUsize,
    pub top_k: usize,
    pub pacing: Duration,
    pub partial_policy: PartialPolicy,
    pub log_dir: PathBuf,
    pub language: String,
    pub audience: String,
    pub email: Option<EmailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, FatalPrecondition> {
        // Try to load .env from multiple locations
        try_load_dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FatalPrecondition>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gemini_api_key = get("GEMINI_API_KEY").ok_or_else(|| FatalPrecondition::MissingSetting {
            name: "GEMINI_API_KEY",
            hint: DOTENV_HINT.to_string(),
        })?;

        let batch_size: usize = parsed(&get, "NEWS_BATCH_SIZE", 3)?;
        let batch_size = NonZeroUsize::new(batch_size).ok_or_else(|| FatalPrecondition::InvalidSetting {
            name: "NEWS_BATCH_SIZE",
            value: "0".to_string(),
            reason: "batch size must be at least 1".to_string(),
        })?;

        let lookback_hours: i64 = parsed(&get, "NEWS_LOOKBACK_HOURS", 24)?;
        if lookback_hours <= 0 {
            return Err(FatalPrecondition::InvalidSetting {
                name: "NEWS_LOOKBACK_HOURS",
                value: lookback_hours.to_string(),
                reason: "lookback must be positive".to_string(),
            });
        }

        let email = EmailConfig::read(&get)?;

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            feeds_path: get("NEWS_FEEDS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/feeds.json")),
            lookback_hours,
            batch_size,
            top_k: parsed(&get, "NEWS_TOP_K", 5)?,
            pacing: Duration::from_millis(parsed(&get, "NEWS_PACING_MS", 1000)?),
            partial_policy: parsed(&get, "NEWS_PARTIAL_POLICY", PartialPolicy::Drop)?,
            log_dir: get("NEWS_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            language: get("NEWS_LANGUAGE").unwrap_or_else(|| "Korean".to_string()),
            audience: get("NEWS_AUDIENCE")
                .unwrap_or_else(|| "an enterprise (B2B) software development group".to_string()),
            email,
        })
    }

    pub fn require_email(&self) -> Result<&EmailConfig, FatalPrecondition> {
        self.email.as_ref().ok_or_else(missing_email)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::new(self.batch_size)
            .with_pacing(self.pacing)
            .with_partial_policy(self.partial_policy)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            batch: self.batch_options(),
            top_k: self.top_k,
            language: self.language.clone(),
            audience: self.audience.clone(),
        }
    }

    pub fn parser(&self) -> StructuredParser {
        StructuredParser::new(DiagnosticsSink::new(&self.log_dir))
    }
}

fn try_load_dotenv() {
    // Try locations in order of preference:

    // 1. Current directory (for development)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // 2. ~/.config/news-brief/.env (standard config location)
    if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("news-brief").join(".env");
        if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
            return;
        }
    }

    // 3. ~/.env (home directory)
    if let Some(home_dir) = dirs::home_dir() {
        let home_path = home_dir.join(".env");
        if home_path.exists() {
            let _ = dotenvy::from_path(&home_path);
        }
    }
}

fn missing_email() -> FatalPrecondition {
    FatalPrecondition::MissingSetting {
        name: "EMAIL_SENDER",
        hint: EMAIL_HINT.to_string(),
    }
}

fn parsed<T, G>(get: &G, name: &'static str, default: T) -> Result<T, FatalPrecondition>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| FatalPrecondition::InvalidSetting {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, FatalPrecondition> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(
            err,
            FatalPrecondition::MissingSetting {
                name: "GEMINI_API_KEY",
                ..
            }
        ));

        let err = config(&[("GEMINI_API_KEY", "   ")]).unwrap_err();
        assert!(matches!(err, FatalPrecondition::MissingSetting { .. }));
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(cfg.gemini_model, "gemini-2.5-flash");
        assert_eq!(cfg.batch_size.get(), 3);
        assert_eq!(cfg.top_k, 5);
        assert_eq!(cfg.pacing, Duration::from_millis(1000));
        assert_eq!(cfg.partial_policy, PartialPolicy::Drop);
        assert_eq!(cfg.lookback_hours, 24);
        assert_eq!(cfg.log_dir, PathBuf::from("logs"));
        assert!(cfg.email.is_none());
        assert!(cfg.require_email().is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("NEWS_BATCH_SIZE", "1"),
            ("NEWS_TOP_K", "3"),
            ("NEWS_PACING_MS", "0"),
            ("NEWS_PARTIAL_POLICY", "passthrough"),
            ("EMAIL_SENDER", "a@example.com"),
            ("EMAIL_PASSWORD", "pw"),
            ("EMAIL_RECIPIENT", "b@example.com"),
        ])
        .unwrap();

        assert_eq!(cfg.batch_size.get(), 1);
        assert_eq!(cfg.top_k, 3);
        assert!(cfg.pacing.is_zero());
        assert_eq!(cfg.partial_policy, PartialPolicy::Passthrough);
        let email = cfg.require_email().unwrap();
        assert_eq!(email.smtp_host, "smtp.gmail.com");
        assert_eq!(email.smtp_port, 587);
    }

    #[test]
    fn email_settings_load_without_model_key() {
        let map: HashMap<&str, &str> = [
            ("EMAIL_SENDER", "a@example.com"),
            ("EMAIL_PASSWORD", "pw"),
            ("EMAIL_RECIPIENT", "b@example.com"),
            ("SMTP_PORT", "465"),
        ]
        .into_iter()
        .collect();

        let email = EmailConfig::from_lookup(|name| map.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(email.recipient, "b@example.com");
        assert_eq!(email.smtp_port, 465);

        let err = EmailConfig::from_lookup(|name| (name == "EMAIL_SENDER").then(|| "a@example.com".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            FatalPrecondition::MissingSetting {
                name: "EMAIL_SENDER",
                ..
            }
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = config(&[("GEMINI_API_KEY", "k"), ("NEWS_BATCH_SIZE", "0")]).unwrap_err();
        assert!(matches!(
            err,
            FatalPrecondition::InvalidSetting {
                name: "NEWS_BATCH_SIZE",
                ..
            }
        ));
    }

    #[test]
    fn garbage_values_are_rejected() {
        let err = config(&[("GEMINI_API_KEY", "k"), ("NEWS_PACING_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("NEWS_PACING_MS"));

        let err = config(&[("GEMINI_API_KEY", "k"), ("NEWS_PARTIAL_POLICY", "pad")]).unwrap_err();
        assert!(err.to_string().contains("passthrough"));
    }
}
