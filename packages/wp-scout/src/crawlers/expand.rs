//! Candidate expansion: hostnames into an ordered probe sequence.

use indexmap::IndexSet;

use crate::types::config::ScoutConfig;
use crate::types::target::{Hostname, ProbePath, ProbeTarget, Scheme};

/// Turns discovered hostnames into probe targets.
///
/// Order is host discovery order, then prefix table order, then path table
/// order, then scheme (https before http). Probing stops at the first match,
/// so this order decides which variant gets reported.
#[derive(Debug, Clone)]
pub struct CandidateExpander {
    prefixes: Vec<String>,
    paths: Vec<ProbePath>,
}

impl CandidateExpander {
    pub fn new(prefixes: Vec<String>, paths: Vec<ProbePath>) -> Self {
        Self { prefixes, paths }
    }

    pub fn from_config(config: &ScoutConfig) -> Self {
        Self::new(config.prefixes.clone(), config.effective_paths())
    }

    /// The host itself, then each prefix applied to it.
    ///
    /// A host that already has a subdomain gets its prefixes on the
    /// registrable base instead (`news.acme.org` -> `blog.acme.org`, never
    /// `blog.news.acme.org`).
    pub fn host_variants(&self, host: &Hostname) -> Vec<Hostname> {
        let base = if host.has_subdomain() {
            host.registrable_base()
        } else {
            host.clone()
        };

        let mut variants = IndexSet::new();
        variants.insert(host.clone());
        for prefix in &self.prefixes {
            if let Some(variant) = base.with_prefix(prefix) {
                variants.insert(variant);
            }
        }
        variants.into_iter().collect()
    }

    /// Full ordered target sequence. No host variant appears twice, even when
    /// two discovered hosts expand to the same variant.
    pub fn expand(&self, hosts: &[Hostname]) -> Vec<ProbeTarget> {
        let variants: IndexSet<Hostname> = hosts
            .iter()
            .flat_map(|host| self.host_variants(host))
            .collect();

        let mut targets = Vec::with_capacity(variants.len() * self.paths.len() * 2);
        for host in &variants {
            for path in &self.paths {
                for scheme in Scheme::ORDER {
                    targets.push(ProbeTarget::new(host.clone(), path.clone(), scheme));
                }
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn host(s: &str) -> Hostname {
        Hostname::parse(s).unwrap()
    }

    fn expander() -> CandidateExpander {
        CandidateExpander::new(
            vec!["www.".into(), "blog.".into()],
            vec![ProbePath::content("/"), ProbePath::exists("/wp-login.php")],
        )
    }

    #[test]
    fn test_bare_host_gets_prefixes_directly() {
        let variants = expander().host_variants(&host("acme.org"));
        assert_eq!(
            variants,
            vec![host("acme.org"), host("www.acme.org"), host("blog.acme.org")]
        );
    }

    #[test]
    fn test_subdomain_host_prefixes_apply_to_base() {
        let variants = expander().host_variants(&host("news.acme.org"));
        assert_eq!(
            variants,
            vec![host("news.acme.org"), host("www.acme.org"), host("blog.acme.org")]
        );
    }

    #[test]
    fn test_two_level_suffix_keeps_the_organization_label() {
        let variants = expander().host_variants(&host("acme.co.uk"));
        assert_eq!(
            variants,
            vec![host("acme.co.uk"), host("www.acme.co.uk"), host("blog.acme.co.uk")]
        );

        let variants = expander().host_variants(&host("shop.acme.co.uk"));
        assert!(!variants.contains(&host("www.co.uk")));
        assert!(variants.contains(&host("www.acme.co.uk")));
    }

    #[test]
    fn test_www_host_does_not_repeat_itself() {
        let variants = expander().host_variants(&host("www.acme.org"));
        assert_eq!(variants, vec![host("www.acme.org"), host("blog.acme.org")]);
    }

    #[test]
    fn test_expand_order_is_host_then_path_then_scheme() {
        let targets = CandidateExpander::new(vec![], vec![ProbePath::content("/"), ProbePath::content("/blog")])
            .expand(&[host("acme.org")]);
        let urls: Vec<String> = targets.iter().map(ToString::to_string).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.org/",
                "http://acme.org/",
                "https://acme.org/blog",
                "http://acme.org/blog",
            ]
        );
    }

    #[test]
    fn test_overlapping_hosts_are_probed_once() {
        let targets = expander().expand(&[host("acme.org"), host("www.acme.org")]);
        let hosts: IndexSet<&Hostname> = targets.iter().map(|t| &t.host).collect();
        assert_eq!(hosts.len(), 3);
        assert_eq!(targets.len(), 3 * 2 * 2);
    }

    #[test]
    fn test_empty_input_gives_no_targets() {
        assert!(expander().expand(&[]).is_empty());
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z]{1,6}"
    }

    fn hostname() -> impl Strategy<Value = Hostname> {
        prop::collection::vec(label(), 2..4)
            .prop_map(|labels| Hostname::parse(&labels.join(".")).unwrap())
    }

    proptest! {
        #[test]
        fn prop_expand_is_deterministic_and_unique(
            hosts in prop::collection::vec(hostname(), 0..5),
            prefixes in prop::collection::vec(label(), 0..4),
        ) {
            let expander = CandidateExpander::new(
                prefixes,
                vec![ProbePath::content("/"), ProbePath::rest_api("/wp-json/")],
            );

            let first = expander.expand(&hosts);
            let second = expander.expand(&hosts);
            prop_assert_eq!(&first, &second);

            let unique: HashSet<&ProbeTarget> = first.iter().collect();
            prop_assert_eq!(unique.len(), first.len());

            for host in &hosts {
                prop_assert!(first.iter().any(|t| &t.host == host));
            }
        }
    }
}
