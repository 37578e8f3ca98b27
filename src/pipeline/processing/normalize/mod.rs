use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FeedKind;

pub mod areas;
pub mod dates;
pub mod normalizers;
pub mod registry;

pub use areas::AreaNormalizer;
pub use registry::NormalizationRegistry;

/// One raw payload as delivered by a collector, tagged by the feed shape it
/// came in. Each variant has exactly one adapter in [`normalizers`].
#[derive(Debug, Clone)]
pub enum RawRecord {
    Fema(FemaSummaryRow),
    FederalRegister(FederalRegisterNotice),
    Curated(CuratedDeclaration),
}

impl RawRecord {
    /// Interpret a raw JSON value as the shape the feed is declared to deliver.
    pub fn from_value(kind: FeedKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            FeedKind::Fema => RawRecord::Fema(serde_json::from_value(value)?),
            FeedKind::FederalRegister => RawRecord::FederalRegister(serde_json::from_value(value)?),
            FeedKind::Curated => RawRecord::Curated(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> FeedKind {
        match self {
            RawRecord::Fema(_) => FeedKind::Fema,
            RawRecord::FederalRegister(_) => FeedKind::FederalRegister,
            RawRecord::Curated(_) => FeedKind::Curated,
        }
    }

    /// Best-effort identifier for log lines and rejection reports.
    pub fn locator(&self) -> String {
        let found = match self {
            RawRecord::Fema(row) => row.fema_declaration_string.clone().map(|key| match &row.designated_area {
                Some(area) => format!("{} / {}", key, area),
                None => key,
            }),
            RawRecord::FederalRegister(notice) => notice.document_number.clone(),
            RawRecord::Curated(entry) => entry.id.clone(),
        };
        found.unwrap_or_else(|| "<unidentified>".to_string())
    }
}

/// OpenFEMA declaration-summary row: one row per designated area.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FemaSummaryRow {
    pub fema_declaration_string: Option<String>,
    pub disaster_number: Option<u64>,
    pub declaration_type: Option<String>,
    pub declaration_date: Option<String>,
    pub incident_begin_date: Option<String>,
    pub incident_end_date: Option<String>,
    pub state: Option<String>,
    pub declaration_title: Option<String>,
    pub incident_type: Option<String>,
    pub designated_area: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// SBA disaster notice, pre-extracted from a Federal Register document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FederalRegisterNotice {
    pub document_number: Option<String>,
    pub publication_date: Option<String>,
    pub html_url: Option<String>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub incident_type: Option<String>,
    pub incident_start: Option<String>,
    pub incident_end: Option<String>,
    pub counties: Option<Vec<String>>,
}

/// Hand-maintained entry carrying the canonical field set directly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CuratedDeclaration {
    pub id: Option<String>,
    pub source: Option<String>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub incident_type: Option<String>,
    pub declaration_date: Option<String>,
    pub incident_start: Option<String>,
    pub incident_end: Option<String>,
    pub renewal_dates: Option<Vec<String>>,
    pub counties: Option<Vec<String>>,
    pub statewide: Option<bool>,
    pub official_url: Option<String>,
    pub last_verified: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub event_key: Option<String>,
}

/// Collaborators a normalizer needs beyond the raw payload.
pub struct NormalizeContext<'a> {
    pub areas: &'a AreaNormalizer,
    /// Fallback `lastUpdated` when the payload carries none.
    pub run_timestamp: DateTime<Utc>,
}

/// A raw payload that could not become a canonical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub feed: String,
    pub locator: String,
    pub reason: String,
}
