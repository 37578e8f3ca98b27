use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::app::ports::UrlProbePort;
use crate::domain::DisasterRecord;
use crate::observability::metrics;
use crate::pipeline::processing::quality_gate::url_checks::relevance_token;
use crate::pipeline::processing::quality_gate::{LivenessPolicy, ProbeOutcome, ProbeReport, UrlPolicy};

/// Use case for probing official URLs with bounded concurrency.
pub struct LinkCheckUseCase {
    prober: Arc<dyn UrlProbePort>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl LinkCheckUseCase {
    pub fn new(prober: Arc<dyn UrlProbePort>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            prober,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            timeout,
        }
    }

    /// Probe every record whose source allows it. Results are keyed by record
    /// id; pattern-only sources are skipped here and checked by URL shape.
    pub async fn check_all(&self, records: &[DisasterRecord], policy: &UrlPolicy) -> HashMap<String, ProbeReport> {
        let mut tasks = JoinSet::new();

        for record in records {
            if let LivenessPolicy::PatternOnly(_) = policy.liveness(record.source()) {
                continue;
            }
            let id = record.id().to_string();
            let url = record.declaration.official_url.clone();
            let token = relevance_token(&record.declaration);
            let prober = Arc::clone(&self.prober);
            let permits = Arc::clone(&self.permits);
            let timeout = self.timeout;

            tasks.spawn(async move {
                // One permit covers both attempts
                let _permit = permits.acquire_owned().await.ok();
                let report = probe_with_retry(prober.as_ref(), &url, token.as_deref(), timeout).await;
                (id, report)
            });
        }

        let mut results = HashMap::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, report)) => {
                    debug!(id = %id, outcome = report.outcome.label(), "URL probed");
                    results.insert(id, report);
                }
                Err(e) => warn!(error = %e, "URL probe task failed"),
            }
        }

        let unreachable = results.values().filter(|r| !r.outcome.is_reachable()).count();
        info!(probed = results.len(), unreachable, "URL liveness check complete");
        results
    }
}

async fn attempt(prober: &dyn UrlProbePort, url: &str, token: Option<&str>, timeout: Duration) -> ProbeReport {
    let started = Instant::now();
    let report = match tokio::time::timeout(timeout, prober.probe(url, token)).await {
        Ok(report) => report,
        Err(_) => ProbeReport {
            outcome: ProbeOutcome::Timeout,
            relevant: None,
        },
    };
    metrics::links::probe_completed(report.outcome.label(), started.elapsed().as_secs_f64());
    report
}

/// One attempt, plus exactly one retry when the first attempt timed out.
pub async fn probe_with_retry(
    prober: &dyn UrlProbePort,
    url: &str,
    token: Option<&str>,
    timeout: Duration,
) -> ProbeReport {
    let first = attempt(prober, url, token, timeout).await;
    if first.outcome != ProbeOutcome::Timeout {
        return first;
    }
    debug!(url, "Probe timed out; retrying once");
    metrics::links::probe_retried();
    attempt(prober, url, token, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UrlCheckConfig;
    use crate::domain::Source;
    use crate::pipeline::processing::quality_gate::test_support::{d, fema_record};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Sleeps `delay` on the first call for each URL, answers OK afterwards.
    struct SlowFirstProbe {
        delay: Duration,
        calls: Mutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl UrlProbePort for SlowFirstProbe {
        async fn probe(&self, url: &str, _token: Option<&str>) -> ProbeReport {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(url.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            if call == 1 {
                tokio::time::sleep(self.delay).await;
            }
            ProbeReport { outcome: ProbeOutcome::Ok, relevant: Some(true) }
        }
    }

    /// Never answers in time.
    struct HangingProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UrlProbePort for HangingProbe {
        async fn probe(&self, _url: &str, _token: Option<&str>) -> ProbeReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            ProbeReport { outcome: ProbeOutcome::Ok, relevant: None }
        }
    }

    /// Tracks the highest number of probes in flight at once.
    struct CountingProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl UrlProbePort for CountingProbe {
        async fn probe(&self, _url: &str, _token: Option<&str>) -> ProbeReport {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProbeReport { outcome: ProbeOutcome::Ok, relevant: None }
        }
    }

    #[tokio::test]
    async fn test_timeout_is_retried_once_then_succeeds() {
        let probe = SlowFirstProbe {
            delay: Duration::from_millis(500),
            calls: Mutex::new(HashMap::new()),
        };
        let report = probe_with_retry(&probe, "https://www.fema.gov/disaster/4834", None, Duration::from_millis(50)).await;
        assert_eq!(report.outcome, ProbeOutcome::Ok);
        assert_eq!(probe.calls.lock().unwrap().get("https://www.fema.gov/disaster/4834"), Some(&2));
    }

    #[tokio::test]
    async fn test_second_timeout_is_final() {
        let probe = HangingProbe { calls: AtomicUsize::new(0) };
        let report = probe_with_retry(&probe, "https://www.fema.gov/disaster/4834", None, Duration::from_millis(30)).await;
        assert_eq!(report.outcome, ProbeOutcome::Timeout);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_and_pattern_only_sources_skipped() {
        let today = d(2026, 2, 11);
        let mut records: Vec<_> = (0..8)
            .map(|i| fema_record(4834 + i, "TX", d(2026, 1, 10), today))
            .collect();
        let mut fmcsa = fema_record(9000, "TX", d(2026, 1, 10), today);
        fmcsa.declaration.id = "FMCSA-2026-001-TX".to_string();
        fmcsa.declaration.source = Source::Fmcsa;
        records.push(fmcsa);

        let probe = Arc::new(CountingProbe {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let use_case = LinkCheckUseCase::new(probe.clone(), 2, Duration::from_secs(5));
        let policy = UrlPolicy::from_config(&UrlCheckConfig::default()).unwrap();

        let results = use_case.check_all(&records, &policy).await;
        assert_eq!(results.len(), 8);
        assert!(!results.contains_key("FMCSA-2026-001-TX"));
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }
}
