//! Pipeline metrics, grouped per phase. These go through the `metrics` facade;
//! with no recorder installed every call is a no-op.

pub mod normalize {
    use metrics::counter;

    pub fn record_normalized(feed: &str) {
        counter!("dst_records_normalized_total", "feed" => feed.to_string()).increment(1);
    }

    pub fn record_rejected(feed: &str) {
        counter!("dst_records_rejected_total", "feed" => feed.to_string()).increment(1);
    }

    pub fn feed_unavailable(feed: &str) {
        counter!("dst_feed_unavailable_total", "feed" => feed.to_string()).increment(1);
    }
}

pub mod merge {
    use metrics::counter;

    pub fn fragments_consolidated(count: usize) {
        counter!("dst_fragments_consolidated_total").increment(count as u64);
    }

    pub fn duplicates_discarded(count: usize) {
        counter!("dst_duplicates_discarded_total").increment(count as u64);
    }

    pub fn expired_dropped(count: usize) {
        counter!("dst_records_expired_total").increment(count as u64);
    }
}

pub mod audit {
    use metrics::counter;

    pub fn check_recorded(code: &str, outcome: &str) {
        counter!(
            "dst_audit_checks_total",
            "code" => code.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
}

pub mod links {
    use metrics::{counter, histogram};

    pub fn probe_completed(outcome: &str, duration_secs: f64) {
        counter!("dst_url_probes_total", "outcome" => outcome.to_string()).increment(1);
        histogram!("dst_url_probe_duration_seconds").record(duration_secs);
    }

    pub fn probe_retried() {
        counter!("dst_url_probe_retries_total").increment(1);
    }
}

pub mod publish {
    use metrics::{counter, gauge};

    pub fn published(record_count: usize) {
        counter!("dst_publish_total", "result" => "published").increment(1);
        gauge!("dst_published_records").set(record_count as f64);
    }

    pub fn withheld() {
        counter!("dst_publish_total", "result" => "withheld").increment(1);
    }
}
