//! Probe engine: fetch a target and decide whether it is WordPress.
//!
//! Nothing here returns an error. Timeouts, refused connections, TLS and DNS
//! failures all mean "this target did not match" and the walk moves on.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::crawlers::rate_control::{Outcome, RateController, TrafficClass};
use crate::detect::relevance::{is_relevant, tokenize};
use crate::detect::signature::{is_textual, parse_rest_body, rest_site_name, SignatureMatcher};
use crate::traits::transport::{FetchRequest, FetchResponse, Transport};
use crate::types::target::{
    DetectionVerdict, Evidence, Hostname, ProbeKind, ProbeTarget, Scheme,
};

/// Result of probing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match(Evidence),
    Miss,
    /// Server answered 429
    Throttled,
}

/// What happened while walking a name's target sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// First matching target, if any
    pub verdict: Option<DetectionVerdict>,
    /// Targets actually fetched
    pub attempted: usize,
    /// Targets skipped because their host and scheme had already throttled
    pub skipped: usize,
    /// Throttling responses seen
    pub throttled: usize,
    /// Walk stopped by the stop signal before finishing
    pub cancelled: bool,
}

/// Fetches probe targets and applies the signature checks.
pub struct ProbeEngine {
    transport: Arc<dyn Transport>,
    rate: Arc<RateController>,
    matcher: SignatureMatcher,
    require_name_match: bool,
}

impl ProbeEngine {
    pub fn new(transport: Arc<dyn Transport>, rate: Arc<RateController>) -> Self {
        Self {
            transport,
            rate,
            matcher: SignatureMatcher::default(),
            require_name_match: false,
        }
    }

    /// Use a custom fingerprint set.
    pub fn with_matcher(mut self, matcher: SignatureMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Gate REST matches on the site name sharing a word with the organization.
    pub fn with_name_match(mut self, required: bool) -> Self {
        self.require_name_match = required;
        self
    }

    /// Probe a single target.
    ///
    /// `name_tokens` are the organization's meaningful words, used only by
    /// the REST relevance gate.
    pub async fn probe(&self, target: &ProbeTarget, name_tokens: &BTreeSet<String>) -> Verdict {
        let url = match target.url() {
            Ok(url) => url,
            Err(e) => {
                debug!(target = %target, error = %e, "unbuildable probe URL");
                return Verdict::Miss;
            }
        };
        let request = match target.path.kind {
            ProbeKind::Exists => FetchRequest::head(url),
            ProbeKind::Content | ProbeKind::RestApi => FetchRequest::get(url),
        };

        self.rate.wait(TrafficClass::Fetch).await;
        let result = self.transport.fetch(&request).await;
        self.rate.observe(TrafficClass::Fetch, Outcome::classify(&result));

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                debug!(target = %target, error = %e, "probe failed");
                return Verdict::Miss;
            }
        };
        if response.is_throttled() {
            debug!(target = %target, "probe throttled");
            return Verdict::Throttled;
        }
        if !response.is_success() {
            debug!(target = %target, status = response.status, "probe miss");
            return Verdict::Miss;
        }

        let verdict = match target.path.kind {
            ProbeKind::Content => self.check_content(&response),
            ProbeKind::Exists => Verdict::Match(Evidence::Exists {
                status: response.status,
            }),
            ProbeKind::RestApi => self.check_rest(&response, &target.host, name_tokens),
        };
        debug!(target = %target, verdict = ?verdict, "probe result");
        verdict
    }

    fn check_content(&self, response: &FetchResponse) -> Verdict {
        if !is_textual(response.mime().as_deref()) {
            return Verdict::Miss;
        }
        match self.matcher.find(&response.body) {
            Some(pattern) => Verdict::Match(Evidence::Fingerprint(pattern.to_string())),
            None => Verdict::Miss,
        }
    }

    fn check_rest(
        &self,
        response: &FetchResponse,
        host: &Hostname,
        name_tokens: &BTreeSet<String>,
    ) -> Verdict {
        let Some(value) = parse_rest_body(response.mime().as_deref(), &response.body) else {
            return Verdict::Miss;
        };
        let site_name = rest_site_name(&value).map(str::to_string);

        if self.require_name_match {
            let site_tokens = match &site_name {
                Some(name) => tokenize(name),
                None => tokenize(&host.base_label()),
            };
            if !is_relevant(name_tokens, &site_tokens) {
                debug!(host = %host, site_name = ?site_name, "REST site name unrelated to organization");
                return Verdict::Miss;
            }
        }

        Verdict::Match(Evidence::RestApi { site_name })
    }

    /// Walk `targets` in order and stop at the first match.
    ///
    /// After a 429 from a host and scheme, later targets on that same host
    /// and scheme are skipped for this walk; everything else is still tried.
    pub async fn probe_sequence(
        &self,
        targets: &[ProbeTarget],
        name_tokens: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> SequenceReport {
        let mut report = SequenceReport::default();
        let mut throttled: HashSet<(&Hostname, Scheme)> = HashSet::new();

        for target in targets {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if throttled.contains(&(&target.host, target.scheme)) {
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            match self.probe(target, name_tokens).await {
                Verdict::Match(evidence) => {
                    report.verdict = Some(DetectionVerdict::new(target.clone(), evidence));
                    break;
                }
                Verdict::Throttled => {
                    report.throttled += 1;
                    throttled.insert((&target.host, target.scheme));
                }
                Verdict::Miss => {}
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::types::config::DelayConfig;
    use crate::types::target::ProbePath;
    use std::time::Duration;

    fn rate() -> Arc<RateController> {
        Arc::new(RateController::new(DelayConfig::none(), DelayConfig::none()))
    }

    fn target(host: &str, path: ProbePath, scheme: Scheme) -> ProbeTarget {
        ProbeTarget::new(Hostname::parse(host).unwrap(), path, scheme)
    }

    fn no_tokens() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[tokio::test]
    async fn test_content_match() {
        let mock = Arc::new(MockTransport::new().with_html(
            "https://acme.org/",
            r#"<link href="/wp-content/themes/acme/style.css">"#,
        ));
        let engine = ProbeEngine::new(mock, rate());

        let verdict = engine
            .probe(&target("acme.org", ProbePath::content("/"), Scheme::Https), &no_tokens())
            .await;

        assert_eq!(verdict, Verdict::Match(Evidence::Fingerprint("/wp-content/".into())));
    }

    #[tokio::test]
    async fn test_content_requires_textual_type_and_success() {
        let mock = Arc::new(
            MockTransport::new()
                .with_response("https://acme.org/img", 200, Some("image/png"), "/wp-content/")
                .with_response("https://acme.org/gone", 404, Some("text/html"), "/wp-content/"),
        );
        let engine = ProbeEngine::new(mock, rate());

        for path in ["/img", "/gone"] {
            let verdict = engine
                .probe(&target("acme.org", ProbePath::content(path), Scheme::Https), &no_tokens())
                .await;
            assert_eq!(verdict, Verdict::Miss);
        }
    }

    #[tokio::test]
    async fn test_exists_probe_uses_head() {
        let mock = Arc::new(MockTransport::new().with_status("https://acme.org/wp-login.php", 200));
        let engine = ProbeEngine::new(mock.clone(), rate());

        let verdict = engine
            .probe(
                &target("acme.org", ProbePath::exists("/wp-login.php"), Scheme::Https),
                &no_tokens(),
            )
            .await;

        assert_eq!(verdict, Verdict::Match(Evidence::Exists { status: 200 }));
        assert_eq!(mock.calls()[0].method, crate::traits::transport::Method::Head);
    }

    #[tokio::test]
    async fn test_transport_error_is_a_miss() {
        let mock = Arc::new(MockTransport::new().with_error("https://acme.org/"));
        let engine = ProbeEngine::new(mock, rate());

        let verdict = engine
            .probe(&target("acme.org", ProbePath::content("/"), Scheme::Https), &no_tokens())
            .await;

        assert_eq!(verdict, Verdict::Miss);
    }

    #[tokio::test]
    async fn test_content_table_wp_json_path_matches_rest_root() {
        let mock = Arc::new(MockTransport::new().with_json(
            "https://acme.org/wp-json/",
            r#"{"name":"Acme Health","namespaces":["wp/v2"],"routes":{"/":{"_links":{"self":"https://acme.org/wp-json/"}}}}"#,
        ));
        let engine = ProbeEngine::new(mock, rate());
        let path = crate::types::config::DetectionMode::Content
            .default_paths()
            .into_iter()
            .find(|p| p.path.starts_with("/wp-json"))
            .unwrap();

        let verdict = engine
            .probe(&target("acme.org", path, Scheme::Https), &no_tokens())
            .await;

        assert_eq!(
            verdict,
            Verdict::Match(Evidence::RestApi {
                site_name: Some("Acme Health".into())
            })
        );
    }

    #[tokio::test]
    async fn test_rest_probe_requires_json_object_or_array() {
        let mock = Arc::new(
            MockTransport::new()
                .with_json("https://acme.org/wp-json/", r#"{"name":"Acme Health","url":"https://acme.org"}"#)
                .with_response("https://other.org/wp-json/", 200, Some("text/html"), "{}"),
        );
        let engine = ProbeEngine::new(mock, rate());
        let path = ProbePath::rest_api("/wp-json/");

        assert_eq!(
            engine.probe(&target("acme.org", path.clone(), Scheme::Https), &no_tokens()).await,
            Verdict::Match(Evidence::RestApi {
                site_name: Some("Acme Health".into())
            })
        );
        assert_eq!(
            engine.probe(&target("other.org", path, Scheme::Https), &no_tokens()).await,
            Verdict::Miss
        );
    }

    #[tokio::test]
    async fn test_relevance_gate_rejects_unrelated_site() {
        let mock = Arc::new(
            MockTransport::new()
                .with_json("https://beacon.org/wp-json/", r#"{"name":"Beacon Health Network"}"#)
                .with_json("https://acme.org/wp-json/", r#"{"name":"ACME Stories"}"#),
        );
        let engine = ProbeEngine::new(mock, rate()).with_name_match(true);
        let tokens = tokenize("Acme Health");
        let path = ProbePath::rest_api("/wp-json/");

        assert_eq!(
            engine.probe(&target("beacon.org", path.clone(), Scheme::Https), &tokens).await,
            Verdict::Miss
        );
        assert!(matches!(
            engine.probe(&target("acme.org", path, Scheme::Https), &tokens).await,
            Verdict::Match(_)
        ));
    }

    #[tokio::test]
    async fn test_relevance_falls_back_to_host_label() {
        let mock = Arc::new(MockTransport::new().with_json("https://www.acme.org/wp-json/wp/v2/types", "[]"));
        let engine = ProbeEngine::new(mock, rate()).with_name_match(true);

        let verdict = engine
            .probe(
                &target("www.acme.org", ProbePath::rest_api("/wp-json/wp/v2/types"), Scheme::Https),
                &tokenize("Acme Health"),
            )
            .await;

        assert_eq!(verdict, Verdict::Match(Evidence::RestApi { site_name: None }));
    }

    #[tokio::test]
    async fn test_sequence_stops_at_first_match() {
        let mock = Arc::new(
            MockTransport::new()
                .with_html("https://acme.org/", "plain page")
                .with_html("http://acme.org/", "/wp-includes/js/x.js")
                .with_html("https://blog.acme.org/", "/wp-content/"),
        );
        let engine = ProbeEngine::new(mock.clone(), rate());
        let targets = vec![
            target("acme.org", ProbePath::content("/"), Scheme::Https),
            target("acme.org", ProbePath::content("/"), Scheme::Http),
            target("blog.acme.org", ProbePath::content("/"), Scheme::Https),
        ];

        let report = engine
            .probe_sequence(&targets, &no_tokens(), &CancellationToken::new())
            .await;

        let verdict = report.verdict.unwrap();
        assert_eq!(verdict.domain().as_str(), "acme.org");
        assert_eq!(verdict.target.scheme, Scheme::Http);
        assert_eq!(report.attempted, 2);
        assert_eq!(mock.call_count(), 2);
        assert!(!mock.requested("https://blog.acme.org/"));
    }

    #[tokio::test]
    async fn test_throttle_skips_same_host_and_scheme_only() {
        let mock = Arc::new(
            MockTransport::new()
                .with_status("https://acme.org/", 429)
                .with_html("http://acme.org/", "nothing here")
                .with_html("http://acme.org/blog", "/wp-content/"),
        );
        let rate = Arc::new(RateController::new(DelayConfig::none(), DelayConfig::new(0, 10)));
        let engine = ProbeEngine::new(mock.clone(), rate.clone());
        let targets = vec![
            target("acme.org", ProbePath::content("/"), Scheme::Https),
            target("acme.org", ProbePath::content("/"), Scheme::Http),
            target("acme.org", ProbePath::content("/blog"), Scheme::Https),
            target("acme.org", ProbePath::content("/blog"), Scheme::Http),
        ];

        let report = engine
            .probe_sequence(&targets, &no_tokens(), &CancellationToken::new())
            .await;

        assert_eq!(report.throttled, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.attempted, 3);
        assert!(!mock.requested("https://acme.org/blog"));
        assert_eq!(report.verdict.unwrap().target.path, ProbePath::content("/blog"));
        assert_eq!(rate.current_delay(TrafficClass::Fetch), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_cancelled_walk_fetches_nothing() {
        let mock = Arc::new(MockTransport::new().with_html("https://acme.org/", "/wp-content/"));
        let engine = ProbeEngine::new(mock.clone(), rate());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine
            .probe_sequence(
                &[target("acme.org", ProbePath::content("/"), Scheme::Https)],
                &no_tokens(),
                &cancel,
            )
            .await;

        assert!(report.cancelled);
        assert!(report.verdict.is_none());
        assert_eq!(mock.call_count(), 0);
    }
}
