use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_true")]
    pub auto_sort_enabled: bool,
    #[serde(default = "default_max_pages")]
    pub max_pages_per_document: u32,
    #[serde(default = "default_true")]
    pub enable_id_detection: bool,
    #[serde(default = "default_true")]
    pub enable_expense_analysis: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            auto_sort_enabled: true,
            max_pages_per_document: default_max_pages(),
            enable_id_detection: true,
            enable_expense_analysis: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Preferred text-analysis provider name ("noop" or "remote").
    #[serde(default)]
    pub text: Option<String>,
    /// Preferred label-detection provider name.
    #[serde(default)]
    pub labels: Option<String>,
    /// Base URL of the remote analysis gateway, if deployed.
    #[serde(default)]
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.7
}

fn default_max_pages() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "127.0.0.1:8790".to_string()
}

fn default_database_path() -> String {
    "data/vault.db".to_string()
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;
    apply_env_overrides(&mut app);
    Ok(app)
}

/// Environment knobs the deployment scripts already set. These win over the
/// config file.
fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("OCR_CONFIDENCE_THRESHOLD") {
        if let Ok(f) = v.parse::<f32>() {
            cfg.ocr.confidence_threshold = f;
        }
    }
    if let Ok(v) = std::env::var("OCR_AUTO_SORT_ENABLED") {
        cfg.ocr.auto_sort_enabled = v != "false";
    }
    if let Ok(v) = std::env::var("OCR_MAX_PAGES") {
        if let Ok(n) = v.parse::<u32>() {
            cfg.ocr.max_pages_per_document = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_defaults_match_deployed_behavior() {
        let ocr = OcrConfig::default();
        assert!((ocr.confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert!(ocr.auto_sort_enabled);
        assert_eq!(ocr.max_pages_per_document, 10);
        assert!(ocr.enable_id_detection);
    }
}
