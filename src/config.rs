use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Optional at startup; extraction and comparison refuse to run without it.
    pub google_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub contracts_path: PathBuf,
    pub examples_path: PathBuf,
    pub rules_pdf_path: PathBuf,
    pub upload_dir: PathBuf,
    pub extractions_dir: PathBuf,
    pub static_dir: PathBuf,
    /// Minimum spacing between two generative-AI calls.
    pub min_call_interval: Duration,
    /// Total attempts for a quota-limited call.
    pub max_retries: u32,
    /// Linear backoff unit: attempt `n` waits `(n + 1) * retry_base_delay`.
    pub retry_base_delay: Duration,
    /// Append every successful extraction to the contract collection.
    pub append_extractions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            google_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            contracts_path: PathBuf::from("contracts.json"),
            examples_path: PathBuf::from("examples.json"),
            rules_pdf_path: PathBuf::from("regles.pdf"),
            upload_dir: PathBuf::from("uploads"),
            extractions_dir: PathBuf::from("extractions"),
            static_dir: PathBuf::from("static"),
            min_call_interval: Duration::from_secs(2),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(30),
            append_extractions: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            google_api_key: std::env::var("GOOGLE_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            gemini_base_url: validate_base_url(
                &std::env::var("GEMINI_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| defaults.gemini_base_url.clone()),
            )?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .ok()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.gemini_model),
            contracts_path: path_var("CONTRACTS_PATH", defaults.contracts_path),
            examples_path: path_var("EXAMPLES_PATH", defaults.examples_path),
            rules_pdf_path: path_var("RULES_PDF_PATH", defaults.rules_pdf_path),
            upload_dir: path_var("UPLOAD_FOLDER", defaults.upload_dir),
            extractions_dir: path_var("EXTRACTIONS_FOLDER", defaults.extractions_dir),
            static_dir: path_var("STATIC_DIR", defaults.static_dir),
            min_call_interval: secs_var("GEMINI_MIN_INTERVAL_SECS", defaults.min_call_interval)?,
            max_retries: match std::env::var("GEMINI_MAX_RETRIES") {
                Ok(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| {
                        anyhow::anyhow!("GEMINI_MAX_RETRIES must be a positive integer")
                    })?,
                Err(_) => defaults.max_retries,
            },
            retry_base_delay: secs_var("GEMINI_RETRY_BASE_SECS", defaults.retry_base_delay)?,
            append_extractions: std::env::var("APPEND_EXTRACTIONS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(defaults.append_extractions),
        };

        // Never log the key itself
        tracing::info!("Configuration loaded successfully");
        if config.google_api_key.is_some() {
            tracing::debug!("GOOGLE_API_KEY is set");
        } else {
            tracing::warn!("GOOGLE_API_KEY is not set: extraction and comparison are disabled");
        }
        tracing::debug!("Gemini: {} ({})", config.gemini_base_url, config.gemini_model);
        tracing::debug!("Contracts file: {}", config.contracts_path.display());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

fn secs_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", name)),
        Err(_) => Ok(default),
    }
}

fn validate_base_url(raw: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("GEMINI_BASE_URL is not a valid URL: {}", e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("GEMINI_BASE_URL must start with http:// or https://");
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("https://example.com/").unwrap(),
            "https://example.com"
        );
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.min_call_interval, Duration::from_secs(2));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(30));
        assert_eq!(config.gemini_model, "gemini-2.5-pro");
    }
}
