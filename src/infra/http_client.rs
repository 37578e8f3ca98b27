use crate::app::ports::UrlProbePort;
use crate::pipeline::processing::quality_gate::{ProbeOutcome, ProbeReport};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed URL prober. Redirects are followed; a successful response
/// reached through a redirect is reported as REDIRECT-OK.
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

/// Certificate and handshake failures surface as opaque connect errors; the
/// only reliable signal is the text of the underlying cause chain.
fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        let text = e.to_string().to_lowercase();
        if ["certificate", "tls", "ssl", "handshake"].iter().any(|k| text.contains(k)) {
            return true;
        }
        source = e.source();
    }
    false
}

fn classify_error(err: &reqwest::Error) -> ProbeOutcome {
    if err.is_timeout() {
        ProbeOutcome::Timeout
    } else if is_tls_failure(err) {
        ProbeOutcome::TlsError
    } else {
        // Unreachable host or refused connection: nothing answered
        ProbeOutcome::ServerError(0)
    }
}

#[async_trait]
impl UrlProbePort for ReqwestProbe {
    async fn probe(&self, url: &str, relevance_token: Option<&str>) -> ProbeReport {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url, error = %e, "Probe request failed");
                return ProbeReport {
                    outcome: classify_error(&e),
                    relevant: None,
                };
            }
        };

        let status = resp.status();
        let redirected = resp.url().as_str() != url;
        let outcome = if status.is_success() {
            if redirected {
                ProbeOutcome::RedirectOk
            } else {
                ProbeOutcome::Ok
            }
        } else if status.is_server_error() {
            ProbeOutcome::ServerError(status.as_u16())
        } else {
            ProbeOutcome::ClientError(status.as_u16())
        };

        let relevant = match (relevance_token, outcome.is_reachable()) {
            (Some(token), true) => match resp.text().await {
                Ok(body) => Some(body.contains(token)),
                Err(e) => {
                    debug!(url, error = %e, "Could not read probe body");
                    None
                }
            },
            _ => None,
        };

        ProbeReport { outcome, relevant }
    }
}
