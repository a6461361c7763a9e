//! HTTPS-then-HTTP resolution of a domain's archive URL.
//!
//! Candidates are tried in a fixed order and the first 200 wins; later
//! candidates are never issued. When every candidate fails, only the last
//! failure becomes the `NotFound` reason. Earlier ones are logged.

use crate::protocols::http::UrlProber;
use crate::types::{ProbeMethod, ProbeOutcome};
use tracing::{debug, info};

/// Path probed on every domain.
pub const ARCHIVE_PATH: &str = "/Archive.zip";

/// Candidate URLs for `domain`, in the order they are tried.
pub fn candidate_urls(domain: &str) -> [String; 2] {
    [
        format!("https://{}{}", domain, ARCHIVE_PATH),
        format!("http://{}{}", domain, ARCHIVE_PATH),
    ]
}

/// Resolve the working archive URL for `domain`.
///
/// The probe timeout is a property of `prober`. Errors never escape: they are
/// folded into [`ProbeOutcome::NotFound`].
pub async fn resolve<P>(prober: &P, domain: &str, method: ProbeMethod) -> ProbeOutcome
where
    P: UrlProber + ?Sized,
{
    let mut last_failure = String::from("no candidate URLs");

    for url in candidate_urls(domain) {
        debug!(domain, url = %url, %method, "probing candidate");

        match prober.probe(&url, method).await {
            Ok(outcome) if outcome.is_success() => {
                info!(domain, url = %url, "archive found");
                return ProbeOutcome::Found(url);
            }
            Ok(outcome) => {
                debug!(domain, url = %url, status = outcome.status, "candidate rejected");
                last_failure = format!("HTTP {}", outcome.status);
            }
            Err(e) => {
                debug!(domain, url = %url, error = %e, "candidate failed");
                last_failure = e.to_string();
            }
        }
    }

    ProbeOutcome::NotFound(last_failure)
}
