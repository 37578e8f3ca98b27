/// Shared constants for the compiler: jurisdiction codes, source tags and the
/// fixed regulatory numbers the window calculator and audit engine use.

/// Months after the incident-end month whose last day closes the window.
pub const ENDED_WINDOW_MONTHS: u32 = 2;

/// Maximum months an open-ended declaration stays usable without a renewal.
pub const ONGOING_MAX_MONTHS: u32 = 14;

/// Days-remaining threshold at or below which a record is expiring soon.
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// Incidents that started more than this many months ago are flagged.
pub const LOOKBACK_MONTHS: u32 = 24;

/// Display form of the entire-jurisdiction sentinel.
pub const STATEWIDE: &str = "Statewide";

pub const GENERATED_BY: &str = "dst_compiler";

pub const ARTIFACT_FILE: &str = "all_disasters.json";
pub const AUDIT_REPORT_FILE: &str = "audit_report.json";
pub const COVERAGE_GAPS_FILE: &str = "coverage_gaps.json";

/// States, DC and the inhabited territories.
pub const VALID_JURISDICTIONS: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA",
    "GU", "HI", "ID", "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD",
    "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "MP", "OH", "OK", "OR", "PA", "PR", "RI", "SC",
    "SD", "TN", "TX", "UT", "VT", "VA", "VI", "WA", "WV", "WI", "WY",
    "AS",
];

pub fn is_valid_jurisdiction(code: &str) -> bool {
    VALID_JURISDICTIONS.contains(&code)
}

/// Administrative suffixes stripped from area names. "(City and Borough)" must
/// precede "(Borough)" so the longer form is removed whole.
pub const AREA_SUFFIXES: &[&str] = &[
    "(City and Borough)",
    "(County)",
    "(Parish)",
    "(Borough)",
    "(Census Area)",
    "(city)",
    "(Municipio)",
    "(ANV/ANVSA)",
];

/// Landing pages that are never acceptable as a record's official URL.
pub const GENERIC_INDEX_URLS: &[&str] = &[
    "https://aspr.hhs.gov/legal/PHE/Pages/default.aspx",
    "https://www.sba.gov/funding-programs/disaster-assistance",
    "https://www.fsa.usda.gov/programs-and-services/disaster-assistance-program/",
    "https://www.fmcsa.dot.gov/emergency-declarations",
    "https://www.fema.gov/disaster/declarations",
];

/// FEMA declaration types that are not presidential disaster declarations.
pub const EXCLUDED_FEMA_DECLARATION_TYPES: &[&str] = &["FM"];
