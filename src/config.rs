use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ConfidenceLevel, Source};
use crate::error::{CompilerError, Result};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dst_compiler.toml";
pub const CONFIG_ENV_VAR: &str = "DST_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub feeds: Vec<FeedConfig>,
    /// Area-name alias table. Keys match any case; values are the published
    /// spelling (e.g. "st." -> "Saint").
    pub aliases: BTreeMap<String, String>,
    pub audit: AuditConfig,
    pub url_checks: UrlCheckConfig,
    pub coverage: CoverageConfig,
    /// Ids whose live-feed record is known bad. Only live records are dropped,
    /// so a curated correction carrying the same id is still published.
    pub suppressed_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: String,
}

/// Which raw shape a feed delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Fema,
    FederalRegister,
    Curated,
}

/// Live feeds win over cached ones when both produce the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Live,
    Cached,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub kind: FeedKind,
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Fraction of the prior per-source count a run must keep.
    pub count_drop_ratio: f64,
    /// Sources whose count drop is expected this run (downgraded to WARN).
    pub allowed_count_drops: Vec<Source>,
    /// Largest tolerated share of records excluded by per-record checks.
    pub max_failure_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UrlCheckConfig {
    pub enabled: bool,
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Sources validated by URL shape only, with the regex their URLs must match.
    pub pattern_only: BTreeMap<Source, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Federal sources whose records trigger a state-coverage check, in priority order.
    pub trigger_sources: Vec<Source>,
    pub min_confidence: ConfidenceLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            feeds: vec![
                FeedConfig { name: "fema".to_string(), kind: FeedKind::Fema, freshness: Freshness::Live },
                FeedConfig { name: "federal_register".to_string(), kind: FeedKind::FederalRegister, freshness: Freshness::Live },
                FeedConfig { name: "curated".to_string(), kind: FeedKind::Curated, freshness: Freshness::Cached },
            ],
            aliases: default_aliases(),
            audit: AuditConfig::default(),
            url_checks: UrlCheckConfig::default(),
            coverage: CoverageConfig::default(),
            suppressed_ids: Vec::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            log_dir: "logs".to_string(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            count_drop_ratio: 0.8,
            allowed_count_drops: Vec::new(),
            max_failure_ratio: 0.25,
        }
    }
}

impl Default for UrlCheckConfig {
    fn default() -> Self {
        let mut pattern_only = BTreeMap::new();
        // Both block automated probing; validate by URL shape instead
        pattern_only.insert(
            Source::Fmcsa,
            r"^https://www\.fmcsa\.dot\.gov/emergency/[^/?#]+$".to_string(),
        );
        pattern_only.insert(Source::Hhs, r"^https://aspr\.hhs\.gov/.+\.aspx$".to_string());
        Self {
            enabled: false,
            max_concurrency: 8,
            timeout_secs: 15,
            user_agent: "dst_compiler/0.1 (disaster declaration audit)".to_string(),
            pattern_only,
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            trigger_sources: vec![Source::Fema, Source::Fmcsa],
            min_confidence: ConfidenceLevel::Curated,
        }
    }
}

fn default_aliases() -> BTreeMap<String, String> {
    [("st.", "Saint"), ("ste.", "Sainte"), ("ft.", "Fort"), ("mt.", "Mount")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Config {
    /// Load configuration from an explicit path, `$DST_CONFIG`, or the default
    /// file name. Falls back to built-in defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var(CONFIG_ENV_VAR)
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                    default.exists().then_some(default)
                }),
        };

        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    CompilerError::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.audit.count_drop_ratio > 0.0 && self.audit.count_drop_ratio <= 1.0) {
            return Err(CompilerError::Config(format!(
                "audit.count_drop_ratio must be in (0, 1], got {}",
                self.audit.count_drop_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.audit.max_failure_ratio) {
            return Err(CompilerError::Config(format!(
                "audit.max_failure_ratio must be in [0, 1], got {}",
                self.audit.max_failure_ratio
            )));
        }
        if self.url_checks.max_concurrency == 0 {
            return Err(CompilerError::Config(
                "url_checks.max_concurrency must be at least 1".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for feed in &self.feeds {
            if !seen.insert(feed.name.as_str()) {
                return Err(CompilerError::Config(format!("duplicate feed name '{}'", feed.name)));
            }
        }
        for (source, pattern) in &self.url_checks.pattern_only {
            regex::Regex::new(pattern).map_err(|e| {
                CompilerError::Config(format!("invalid URL pattern for {}: {}", source, e))
            })?;
        }
        Ok(())
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.paths.output_dir.join(crate::constants::ARTIFACT_FILE)
    }
}
