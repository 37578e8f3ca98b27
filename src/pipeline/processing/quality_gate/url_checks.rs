use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::UrlCheckConfig;
use crate::constants::GENERIC_INDEX_URLS;
use crate::domain::{Declaration, Source};
use crate::error::{CompilerError, Result};

static FEMA_DISASTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/disaster/(\d+)").expect("valid FEMA url regex"));
static SBA_DOCUMENT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SBA-(\d{4}-\d+)-[A-Z]{2}$").expect("valid SBA id regex"));

/// Classified result of fetching a record's official URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ProbeOutcome {
    Ok,
    RedirectOk,
    ClientError(u16),
    ServerError(u16),
    Timeout,
    TlsError,
}

impl ProbeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Ok => "ok",
            ProbeOutcome::RedirectOk => "redirect_ok",
            ProbeOutcome::ClientError(_) => "client_error",
            ProbeOutcome::ServerError(_) => "server_error",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::TlsError => "tls_error",
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Ok | ProbeOutcome::RedirectOk)
    }
}

/// What the URL-liveness collaborator reports for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    /// Whether the fetched body mentions the record's identifier. `None` when
    /// no token applies or no body was read.
    pub relevant: Option<bool>,
}

/// How a source's URLs are verified.
#[derive(Debug, Clone, Copy)]
pub enum LivenessPolicy<'a> {
    Probe,
    /// The site blocks automated fetches; the URL must match this shape instead.
    PatternOnly(&'a Regex),
}

/// Compiled per-source URL rules.
#[derive(Debug, Clone, Default)]
pub struct UrlPolicy {
    patterns: BTreeMap<Source, Regex>,
}

impl UrlPolicy {
    pub fn from_config(config: &UrlCheckConfig) -> Result<Self> {
        let mut patterns = BTreeMap::new();
        for (source, pattern) in &config.pattern_only {
            let regex = Regex::new(pattern).map_err(|e| {
                CompilerError::Config(format!("invalid URL pattern for {}: {}", source, e))
            })?;
            patterns.insert(*source, regex);
        }
        Ok(Self { patterns })
    }

    pub fn liveness(&self, source: Source) -> LivenessPolicy<'_> {
        match self.patterns.get(&source) {
            Some(regex) => LivenessPolicy::PatternOnly(regex),
            None => LivenessPolicy::Probe,
        }
    }
}

/// Absolute http(s) URL with a host and no embedded whitespace.
pub fn is_well_formed(url: &str) -> bool {
    if url.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().map_or(false, |h| h.contains('.'))
        }
        Err(_) => false,
    }
}

/// True when the URL is one of the known landing/index pages rather than a
/// page about the specific declaration.
pub fn is_generic_index(url: &str) -> bool {
    let trimmed = url.trim().trim_end_matches('/');
    GENERIC_INDEX_URLS
        .iter()
        .any(|generic| generic.trim_end_matches('/').eq_ignore_ascii_case(trimmed))
}

/// Identifier the fetched page is expected to mention: the disaster number
/// for FEMA pages, the document number for Federal Register notices.
pub fn relevance_token(declaration: &Declaration) -> Option<String> {
    match declaration.source {
        Source::Fema => FEMA_DISASTER_NUMBER
            .captures(&declaration.official_url)
            .map(|c| c[1].to_string()),
        Source::Sba => SBA_DOCUMENT_NUMBER
            .captures(&declaration.id)
            .map(|c| c[1].to_string()),
        _ => None,
    }
}
