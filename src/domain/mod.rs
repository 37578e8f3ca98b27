use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::constants::STATEWIDE;

/// Declaring-authority type. Every record carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Fema,
    Sba,
    Fmcsa,
    Hhs,
    Usda,
    State,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Fema,
        Source::Sba,
        Source::Fmcsa,
        Source::Hhs,
        Source::Usda,
        Source::State,
    ];

    /// Tag used as the record id prefix and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Fema => "FEMA",
            Source::Sba => "SBA",
            Source::Fmcsa => "FMCSA",
            Source::Hhs => "HHS",
            Source::Usda => "USDA",
            Source::State => "STATE",
        }
    }

    pub fn is_federal(&self) -> bool {
        !matches!(self, Source::State)
    }

    pub fn parse(tag: &str) -> Option<Source> {
        Source::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a record. Informational only; never a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Curated,
    Scraped,
    Verified,
}

/// Lifecycle status derived from the eligibility window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ongoing,
    Active,
    ExpiringSoon,
    Expired,
}

/// Counties (or equivalents) covered by a declaration, or the whole jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub enum AffectedAreas {
    Entire,
    Areas(BTreeSet<String>),
}

impl AffectedAreas {
    pub fn is_entire(&self) -> bool {
        matches!(self, AffectedAreas::Entire)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AffectedAreas::Entire => false,
            AffectedAreas::Areas(set) => set.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AffectedAreas::Entire => 1,
            AffectedAreas::Areas(set) => set.len(),
        }
    }

    /// Set union. The whole-jurisdiction sentinel absorbs any area list.
    pub fn union_with(&mut self, other: &AffectedAreas) {
        match (&mut *self, other) {
            (AffectedAreas::Entire, _) => {}
            (_, AffectedAreas::Entire) => *self = AffectedAreas::Entire,
            (AffectedAreas::Areas(mine), AffectedAreas::Areas(theirs)) => {
                for name in theirs {
                    if !mine.iter().any(|m| m.to_lowercase() == name.to_lowercase()) {
                        mine.insert(name.clone());
                    }
                }
            }
        }
    }
}

impl From<AffectedAreas> for Vec<String> {
    fn from(areas: AffectedAreas) -> Self {
        match areas {
            AffectedAreas::Entire => vec![STATEWIDE.to_string()],
            AffectedAreas::Areas(set) => set.into_iter().collect(),
        }
    }
}

impl TryFrom<Vec<String>> for AffectedAreas {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        if names.iter().any(|n| n.trim().eq_ignore_ascii_case(STATEWIDE)) {
            return Ok(AffectedAreas::Entire);
        }
        let set: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if set.is_empty() {
            return Err("affectedAreas must not be empty".to_string());
        }
        Ok(AffectedAreas::Areas(set))
    }
}

/// Canonical declaration fields as produced by normalization. Everything the
/// window calculator derives lives in [`Window`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub id: String,
    pub source: Source,
    pub jurisdiction: String,
    pub title: String,
    pub incident_category: String,
    pub declaration_date: NaiveDate,
    pub incident_start: NaiveDate,
    #[serde(default)]
    pub incident_end: Option<NaiveDate>,
    #[serde(default)]
    pub renewal_dates: BTreeSet<NaiveDate>,
    pub affected_areas: AffectedAreas,
    pub official_url: String,
    pub confidence_level: ConfidenceLevel,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub last_verified: Option<NaiveDate>,
    /// Consolidation key shared by per-area fragments of one event.
    #[serde(skip)]
    pub event_key: Option<String>,
}

impl Declaration {
    pub fn is_ongoing(&self) -> bool {
        self.incident_end.is_none()
    }
}

/// Derived eligibility window. Recomputed every run, never hand-edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub status: Status,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    #[serde(default)]
    pub days_remaining: Option<i64>,
}

/// A declaration together with its computed window; the unit of publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterRecord {
    #[serde(flatten)]
    pub declaration: Declaration,
    #[serde(flatten)]
    pub window: Window,
}

impl DisasterRecord {
    pub fn id(&self) -> &str {
        &self.declaration.id
    }

    pub fn source(&self) -> Source {
        self.declaration.source
    }

    pub fn jurisdiction(&self) -> &str {
        &self.declaration.jurisdiction
    }
}
