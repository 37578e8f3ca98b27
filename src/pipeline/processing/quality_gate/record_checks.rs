use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

use super::url_checks::{self, LivenessPolicy, ProbeOutcome};
use super::{codes, AuditContext, CheckResult};
use crate::constants::{is_valid_jurisdiction, LOOKBACK_MONTHS};
use crate::domain::{DisasterRecord, Source};
use crate::pipeline::processing::window;

static ID_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)-([A-Za-z0-9-]+)-([A-Z]{2})$").expect("static id pattern"));

/// Run every per-record check. PASS results are included so the caller can
/// count them.
pub fn check_record(record: &DisasterRecord, ctx: &AuditContext<'_>) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(17);
    results.push(required_fields(record));
    results.push(id_format(record));
    results.push(jurisdiction(record));
    results.push(areas_non_empty(record));
    results.push(incident_order(record));
    results.push(declaration_not_future(record, ctx));
    results.extend(window_consistency(record, ctx));
    results.push(incident_lookback(record, ctx));
    results.push(last_verified(record));
    results.extend(url_static(record, ctx));
    results.extend(url_probe(record, ctx));
    results
}

fn required_fields(record: &DisasterRecord) -> CheckResult {
    let decl = &record.declaration;
    let missing: Vec<&str> = [
        ("id", decl.id.as_str()),
        ("title", decl.title.as_str()),
        ("officialUrl", decl.official_url.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        CheckResult::pass(codes::REQUIRED_FIELDS, Some(record.id()))
    } else {
        CheckResult::fail(
            codes::REQUIRED_FIELDS,
            Some(record.id()),
            format!("missing {}", missing.join(", ")),
        )
    }
}

fn id_format(record: &DisasterRecord) -> CheckResult {
    let id = record.id();
    let Some(caps) = ID_SHAPE.captures(id) else {
        return CheckResult::fail(codes::ID_FORMAT, Some(id), "id is not SOURCE-<identifier>-<state>");
    };
    if &caps[1] != record.source().as_str() {
        return CheckResult::fail(
            codes::ID_FORMAT,
            Some(id),
            format!("id prefix {} does not match source {}", &caps[1], record.source()),
        );
    }
    if &caps[3] != record.jurisdiction() {
        return CheckResult::fail(
            codes::ID_FORMAT,
            Some(id),
            format!("id suffix {} does not match jurisdiction {}", &caps[3], record.jurisdiction()),
        );
    }
    CheckResult::pass(codes::ID_FORMAT, Some(id))
}

fn jurisdiction(record: &DisasterRecord) -> CheckResult {
    if is_valid_jurisdiction(record.jurisdiction()) {
        CheckResult::pass(codes::JURISDICTION, Some(record.id()))
    } else {
        CheckResult::fail(
            codes::JURISDICTION,
            Some(record.id()),
            format!("unknown jurisdiction {:?}", record.jurisdiction()),
        )
    }
}

fn areas_non_empty(record: &DisasterRecord) -> CheckResult {
    if record.declaration.affected_areas.is_empty() {
        CheckResult::fail(codes::AREAS_NON_EMPTY, Some(record.id()), "no affected areas")
    } else {
        CheckResult::pass(codes::AREAS_NON_EMPTY, Some(record.id()))
    }
}

fn incident_order(record: &DisasterRecord) -> CheckResult {
    let decl = &record.declaration;
    match decl.incident_end {
        Some(end) if end < decl.incident_start => CheckResult::fail(
            codes::INCIDENT_ORDER,
            Some(record.id()),
            format!("incidentEnd {} precedes incidentStart {}", end, decl.incident_start),
        ),
        _ => CheckResult::pass(codes::INCIDENT_ORDER, Some(record.id())),
    }
}

fn declaration_not_future(record: &DisasterRecord, ctx: &AuditContext<'_>) -> CheckResult {
    let declared = record.declaration.declaration_date;
    if declared > ctx.today {
        CheckResult::fail(
            codes::DECLARATION_NOT_FUTURE,
            Some(record.id()),
            format!("declarationDate {} is after {}", declared, ctx.today),
        )
    } else {
        CheckResult::pass(codes::DECLARATION_NOT_FUTURE, Some(record.id()))
    }
}

/// Recompute the window from the declaration and compare it with what the
/// record carries.
fn window_consistency(record: &DisasterRecord, ctx: &AuditContext<'_>) -> Vec<CheckResult> {
    let id = Some(record.id());
    let decl = &record.declaration;
    let carried = &record.window;
    let mut results = Vec::with_capacity(4);

    let expected_start = window::window_start(decl);
    results.push(if carried.window_start == expected_start {
        CheckResult::pass(codes::WINDOW_START, id)
    } else {
        CheckResult::fail(
            codes::WINDOW_START,
            id,
            format!("windowStart {} should be {}", carried.window_start, expected_start),
        )
    });

    let expected_end = match window::window_end(decl) {
        Ok(end) => {
            results.push(if carried.window_end == end {
                CheckResult::pass(codes::WINDOW_END, id)
            } else {
                CheckResult::fail(
                    codes::WINDOW_END,
                    id,
                    format!("windowEnd {} should be {}", carried.window_end, end),
                )
            });
            Some(end)
        }
        Err(e) => {
            results.push(CheckResult::fail(codes::WINDOW_END, id, e.to_string()));
            None
        }
    };

    results.push(if carried.window_end >= ctx.today {
        CheckResult::pass(codes::WINDOW_NOT_EXPIRED, id)
    } else {
        CheckResult::fail(
            codes::WINDOW_NOT_EXPIRED,
            id,
            format!("window closed {}", carried.window_end),
        )
    });

    if let Some(end) = expected_end {
        let status = window::derive_status(end, decl.is_ongoing(), ctx.today);
        let days = match status {
            crate::domain::Status::Ongoing => None,
            _ => Some((end - ctx.today).num_days()),
        };
        results.push(if carried.status == status && carried.days_remaining == days {
            CheckResult::pass(codes::STATUS_CONSISTENT, id)
        } else {
            CheckResult::fail(
                codes::STATUS_CONSISTENT,
                id,
                format!(
                    "status {:?}/{:?} should be {:?}/{:?}",
                    carried.status, carried.days_remaining, status, days
                ),
            )
        });
    }

    results
}

fn incident_lookback(record: &DisasterRecord, ctx: &AuditContext<'_>) -> CheckResult {
    let start = record.declaration.incident_start;
    let months_ago = (ctx.today.year() as i64 * 12 + ctx.today.month() as i64)
        - (start.year() as i64 * 12 + start.month() as i64);
    if months_ago > LOOKBACK_MONTHS as i64 {
        CheckResult::warn(
            codes::INCIDENT_LOOKBACK,
            Some(record.id()),
            format!("incidentStart {} is more than {} months ago", start, LOOKBACK_MONTHS),
        )
    } else {
        CheckResult::pass(codes::INCIDENT_LOOKBACK, Some(record.id()))
    }
}

/// STATE and HHS entries are maintained by hand and must say when a person
/// last confirmed them.
fn last_verified(record: &DisasterRecord) -> CheckResult {
    let needs_verification = matches!(record.source(), Source::State | Source::Hhs);
    if needs_verification && record.declaration.last_verified.is_none() {
        CheckResult::warn(codes::LAST_VERIFIED, Some(record.id()), "lastVerified is missing")
    } else {
        CheckResult::pass(codes::LAST_VERIFIED, Some(record.id()))
    }
}

fn url_static(record: &DisasterRecord, ctx: &AuditContext<'_>) -> Vec<CheckResult> {
    let id = Some(record.id());
    let url = record.declaration.official_url.as_str();
    let mut results = Vec::with_capacity(3);

    results.push(if url_checks::is_well_formed(url) {
        CheckResult::pass(codes::URL_WELL_FORMED, id)
    } else {
        CheckResult::fail(codes::URL_WELL_FORMED, id, format!("malformed URL {:?}", url))
    });

    results.push(if url_checks::is_generic_index(url) {
        CheckResult::fail(
            codes::URL_RECORD_SPECIFIC,
            id,
            format!("{} is an index page, not the declaration", url),
        )
    } else {
        CheckResult::pass(codes::URL_RECORD_SPECIFIC, id)
    });

    if let LivenessPolicy::PatternOnly(pattern) = ctx.urls.liveness(record.source()) {
        results.push(if pattern.is_match(url) {
            CheckResult::pass(codes::URL_PATTERN, id)
        } else {
            CheckResult::fail(
                codes::URL_PATTERN,
                id,
                format!("{} does not match the {} URL shape", url, record.source()),
            )
        });
    }

    results
}

/// Liveness and relevance, from the probe report if the URL was probed.
fn url_probe(record: &DisasterRecord, ctx: &AuditContext<'_>) -> Vec<CheckResult> {
    let id = Some(record.id());
    let Some(report) = ctx.probes.get(record.id()) else {
        return Vec::new();
    };
    let mut results = Vec::with_capacity(2);

    results.push(match report.outcome {
        ProbeOutcome::Ok | ProbeOutcome::RedirectOk => CheckResult::pass(codes::URL_LIVENESS, id),
        ProbeOutcome::TlsError => CheckResult::warn(
            codes::URL_LIVENESS,
            id,
            "TLS handshake failed; page likely reachable in a browser",
        ),
        ProbeOutcome::ClientError(status) => {
            CheckResult::fail(codes::URL_LIVENESS, id, format!("HTTP {}", status))
        }
        ProbeOutcome::ServerError(0) => CheckResult::fail(codes::URL_LIVENESS, id, "no response from server"),
        ProbeOutcome::ServerError(status) => {
            CheckResult::fail(codes::URL_LIVENESS, id, format!("HTTP {}", status))
        }
        ProbeOutcome::Timeout => {
            CheckResult::fail(codes::URL_LIVENESS, id, "timed out after retry")
        }
    });

    match report.relevant {
        Some(true) => results.push(CheckResult::pass(codes::URL_RELEVANCE, id)),
        Some(false) => results.push(CheckResult::fail(
            codes::URL_RELEVANCE,
            id,
            "page does not mention the record identifier",
        )),
        None => {}
    }

    results
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{d, fema_record};
    use super::super::{CheckOutcome, ProbeReport, UrlPolicy};
    use super::*;
    use crate::config::{AuditConfig, UrlCheckConfig};
    use crate::domain::{ConfidenceLevel, Status};
    use std::collections::HashMap;

    fn failing_codes(record: &DisasterRecord, ctx: &AuditContext<'_>) -> Vec<String> {
        check_record(record, ctx)
            .into_iter()
            .filter(|r| r.outcome == CheckOutcome::Fail)
            .map(|r| r.code)
            .collect()
    }

    fn with_ctx<F: FnOnce(&AuditContext<'_>)>(urls: UrlPolicy, f: F) {
        let config = AuditConfig::default();
        let probes = HashMap::new();
        let ctx = AuditContext {
            today: d(2026, 2, 11),
            config: &config,
            urls: &urls,
            prior: None,
            probes: &probes,
        };
        f(&ctx);
    }

    #[test]
    fn test_well_formed_record_passes_every_check() {
        with_ctx(UrlPolicy::default(), |ctx| {
            let record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
            let results = check_record(&record, ctx);
            assert!(results.iter().all(|r| r.outcome == CheckOutcome::Pass), "{:?}", results);
        });
    }

    #[test]
    fn test_id_must_agree_with_source_and_jurisdiction() {
        with_ctx(UrlPolicy::default(), |ctx| {
            let mut record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
            record.declaration.id = "SBA-DR-4834-TX".to_string();
            assert_eq!(failing_codes(&record, ctx), vec![codes::ID_FORMAT]);

            record.declaration.id = "FEMA-DR-4834-OK".to_string();
            assert_eq!(failing_codes(&record, ctx), vec![codes::ID_FORMAT]);
        });
    }

    #[test]
    fn test_hand_edited_window_is_caught() {
        with_ctx(UrlPolicy::default(), |ctx| {
            let mut record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
            record.window.window_end = d(2026, 4, 30);
            assert_eq!(failing_codes(&record, ctx), vec![codes::WINDOW_END]);

            let mut record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
            record.window.status = Status::Ongoing;
            assert_eq!(failing_codes(&record, ctx), vec![codes::STATUS_CONSISTENT]);
        });
    }

    #[test]
    fn test_old_incident_and_unverified_state_record_only_warn() {
        with_ctx(UrlPolicy::default(), |ctx| {
            let mut record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
            record.declaration.id = "STATE-2023-014-TX".to_string();
            record.declaration.source = Source::State;
            record.declaration.confidence_level = ConfidenceLevel::Curated;
            record.declaration.official_url = "https://gov.texas.gov/news/post/disaster-2023".to_string();
            record.declaration.incident_start = d(2023, 6, 1);
            record.window.window_start = d(2023, 6, 1);

            let results = check_record(&record, ctx);
            let warned: Vec<&str> = results
                .iter()
                .filter(|r| r.outcome == CheckOutcome::Warn)
                .map(|r| r.code.as_str())
                .collect();
            assert_eq!(warned, vec![codes::INCIDENT_LOOKBACK, codes::LAST_VERIFIED]);
            assert!(results.iter().all(|r| r.outcome != CheckOutcome::Fail));
        });
    }

    #[test]
    fn test_pattern_only_source_is_checked_by_shape() {
        let urls = UrlPolicy::from_config(&UrlCheckConfig::default()).unwrap();
        with_ctx(urls, |ctx| {
            let mut record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
            record.declaration.id = "FMCSA-2026-001-TX".to_string();
            record.declaration.source = Source::Fmcsa;
            record.declaration.official_url = "https://www.fmcsa.dot.gov/emergency/texas-winter-storm-2026".to_string();
            assert!(failing_codes(&record, ctx).is_empty());

            record.declaration.official_url = "https://www.fmcsa.dot.gov/emergency-declarations".to_string();
            let failures = failing_codes(&record, ctx);
            assert!(failures.contains(&codes::URL_PATTERN.to_string()));
            assert!(failures.contains(&codes::URL_RECORD_SPECIFIC.to_string()));
        });
    }

    #[test]
    fn test_irrelevant_page_fails_relevance() {
        let config = AuditConfig::default();
        let urls = UrlPolicy::default();
        let mut probes = HashMap::new();
        probes.insert(
            "FEMA-DR-4834-TX".to_string(),
            ProbeReport { outcome: ProbeOutcome::RedirectOk, relevant: Some(false) },
        );
        let ctx = AuditContext {
            today: d(2026, 2, 11),
            config: &config,
            urls: &urls,
            prior: None,
            probes: &probes,
        };
        let record = fema_record(4834, "TX", d(2026, 1, 10), ctx.today);
        assert_eq!(failing_codes(&record, &ctx), vec![codes::URL_RELEVANCE]);
    }
}
