use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Postgres connection URL. The database must have the pgvector
    /// extension available.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            api_base: default_api_base(),
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_count")]
    pub match_count: i64,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_count: default_match_count(),
            match_threshold: default_match_threshold(),
        }
    }
}

fn default_match_count() -> i64 {
    5
}
fn default_match_threshold() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    /// Web API base. Overridable for self-hosted gateways and tests.
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.match_count < 1 {
        anyhow::bail!("retrieval.match_count must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.match_threshold) {
        anyhow::bail!("retrieval.match_threshold must be in [0.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("recall.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_minimal_config() {
        let (_dir, path) = write_config(
            r#"
[db]
url = "postgres://localhost/recall"

[server]
bind = "127.0.0.1:8000"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.retrieval.match_count, 5);
        assert!((config.retrieval.match_threshold - 0.7).abs() < 1e-9);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.slack.api_base, "https://slack.com/api");
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let (_dir, path) = write_config(
            r#"
[db]
url = "postgres://localhost/recall"

[server]
bind = "127.0.0.1:8000"

[embedding]
provider = "openai"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let (_dir, path) = write_config(
            r#"
[db]
url = "postgres://localhost/recall"

[server]
bind = "127.0.0.1:8000"

[retrieval]
match_threshold = 1.5
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_dir, path) = write_config(
            r#"
[db]
url = "postgres://localhost/recall"

[server]
bind = "127.0.0.1:8000"

[embedding]
provider = "cohere"
model = "embed-english-v3"
dims = 1024
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
