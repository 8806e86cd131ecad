//! Names, hosts and probe targets.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// One unit of work: the organization we are looking for.
///
/// Always non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrganizationName(String);

impl OrganizationName {
    /// Trim and validate a raw name. Returns `None` for blank input.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrganizationName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or_else(|| "organization name must not be blank".to_string())
    }
}

impl From<OrganizationName> for String {
    fn from(name: OrganizationName) -> Self {
        name.0
    }
}

/// A DNS name without scheme, port or path. Stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

/// Second-level public suffixes common enough in search results that
/// treating them as a registrable domain would probe unrelated hosts.
/// Not a full public suffix list.
pub const TWO_LEVEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "ltd.uk", "me.uk", "net.uk", "nhs.uk", "plc.uk",
    "com.au", "net.au", "org.au", "edu.au", "gov.au", "asn.au", "id.au",
    "co.nz", "org.nz", "net.nz", "govt.nz", "ac.nz",
    "co.za", "org.za", "gov.za",
    "co.in", "org.in", "net.in", "gov.in", "ac.in",
    "co.jp", "or.jp", "ne.jp", "ac.jp", "go.jp",
    "co.kr", "or.kr",
    "com.br", "org.br", "gov.br", "net.br",
    "com.mx", "org.mx", "gob.mx",
    "com.ar", "org.ar",
    "com.cn", "org.cn", "net.cn",
    "com.hk", "org.hk",
    "com.sg", "org.sg",
    "com.tr", "org.tr",
    "co.il", "org.il",
];

impl Hostname {
    /// Parse a bare host such as `acme.org` or `Blog.Acme.org.`.
    ///
    /// Rejects anything carrying a scheme, path, port or whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let host = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty()
            || host.starts_with('.')
            || host.contains("..")
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | ':' | '?' | '#' | '@'))
        {
            return None;
        }
        Some(Self(host))
    }

    /// Take the host component of an absolute URL.
    pub fn from_url(url: &Url) -> Option<Self> {
        url.host_str().and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of dot-separated labels.
    pub fn label_count(&self) -> usize {
        self.0.split('.').count()
    }

    /// Labels making up the public suffix: two for the common
    /// second-level registries in [`TWO_LEVEL_SUFFIXES`], otherwise one.
    fn suffix_labels(&self) -> usize {
        let labels: Vec<&str> = self.0.rsplitn(3, '.').collect();
        if labels.len() >= 3 {
            let suffix = format!("{}.{}", labels[1], labels[0]);
            if TWO_LEVEL_SUFFIXES.contains(&suffix.as_str()) {
                return 2;
            }
        }
        1
    }

    /// True when the host has labels left of its registrable base
    /// (`blog.acme.org`, `www.acme.co.uk`).
    pub fn has_subdomain(&self) -> bool {
        self.label_count() > self.suffix_labels() + 1
    }

    /// The registrable domain: the last two labels (`news.acme.org` ->
    /// `acme.org`), or three under a two-level suffix (`www.acme.co.uk` ->
    /// `acme.co.uk`).
    ///
    /// Hosts without a subdomain are returned unchanged.
    pub fn registrable_base(&self) -> Hostname {
        if !self.has_subdomain() {
            return self.clone();
        }
        let keep = self.suffix_labels() + 1;
        let labels: Vec<&str> = self.0.split('.').collect();
        Hostname(labels[labels.len() - keep..].join("."))
    }

    /// First label of the registrable base (`www.acme.org` -> `acme`).
    pub fn base_label(&self) -> String {
        let base = self.registrable_base();
        base.0.split('.').next().unwrap_or_default().to_string()
    }

    /// Prepend a subdomain label. Accepts `blog` or `blog.`.
    pub fn with_prefix(&self, prefix: &str) -> Option<Hostname> {
        let label = prefix.trim().trim_end_matches('.');
        if label.is_empty() {
            return None;
        }
        Self::parse(&format!("{}.{}", label, self.0))
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Hostname {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid hostname: {value:?}"))
    }
}

impl From<Hostname> for String {
    fn from(host: Hostname) -> Self {
        host.0
    }
}

/// URL scheme of a probe. Secure is always tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    /// Probe order: secure, then insecure.
    pub const ORDER: [Scheme; 2] = [Scheme::Https, Scheme::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

/// How a probe path is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// GET, textual body scanned for fingerprints
    Content,
    /// HEAD, a success status is itself the signal
    Exists,
    /// GET, JSON body from the REST API (optionally name-gated)
    RestApi,
}

/// A path from the probe table together with its check.
///
/// Written as `"/blog"`, `"head:/wp-login.php"` or `"api:/wp-json/"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbePath {
    pub path: String,
    pub kind: ProbeKind,
}

impl ProbePath {
    pub fn content(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ProbeKind::Content,
        }
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ProbeKind::Exists,
        }
    }

    pub fn rest_api(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ProbeKind::RestApi,
        }
    }

    /// Parse the textual form used in config files and on the command line.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (kind, path) = if let Some(rest) = raw.strip_prefix("head:") {
            (ProbeKind::Exists, rest)
        } else if let Some(rest) = raw.strip_prefix("api:") {
            (ProbeKind::RestApi, rest)
        } else {
            (ProbeKind::Content, raw)
        };
        if !path.starts_with('/') {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            kind,
        })
    }
}

impl fmt::Display for ProbePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProbeKind::Content => write!(f, "{}", self.path),
            ProbeKind::Exists => write!(f, "head:{}", self.path),
            ProbeKind::RestApi => write!(f, "api:{}", self.path),
        }
    }
}

impl std::str::FromStr for ProbePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("probe path must start with '/': {s:?}"))
    }
}

impl TryFrom<String> for ProbePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProbePath> for String {
    fn from(path: ProbePath) -> Self {
        path.to_string()
    }
}

/// One concrete URL to test: host variant, path and scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub host: Hostname,
    pub path: ProbePath,
    pub scheme: Scheme,
}

impl ProbeTarget {
    pub fn new(host: Hostname, path: ProbePath, scheme: Scheme) -> Self {
        Self { host, path, scheme }
    }

    /// Build the absolute URL for this target.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}://{}{}",
            self.scheme.as_str(),
            self.host,
            self.path.path
        ))
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.host, self.path.path)
    }
}

/// Why a target was judged to be WordPress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// Body matched this fingerprint pattern
    Fingerprint(String),
    /// Curated path answered with a success status
    Exists { status: u16 },
    /// REST API answered with JSON; `site_name` is its `name` field if any
    RestApi { site_name: Option<String> },
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evidence::Fingerprint(pattern) => write!(f, "fingerprint {pattern:?}"),
            Evidence::Exists { status } => write!(f, "path exists (HTTP {status})"),
            Evidence::RestApi { site_name: Some(name) } => write!(f, "REST API ({name})"),
            Evidence::RestApi { site_name: None } => write!(f, "REST API"),
        }
    }
}

/// The first matching target for a name, with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionVerdict {
    pub target: ProbeTarget,
    pub evidence: Evidence,
}

impl DetectionVerdict {
    pub fn new(target: ProbeTarget, evidence: Evidence) -> Self {
        Self { target, evidence }
    }

    /// The host variant that matched; this is what gets recorded.
    pub fn domain(&self) -> &Hostname {
        &self.target.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_name_trims_and_rejects_blank() {
        assert_eq!(
            OrganizationName::new("  Acme Health ").unwrap().as_str(),
            "Acme Health"
        );
        assert!(OrganizationName::new("   ").is_none());
    }

    #[test]
    fn test_hostname_parse() {
        assert_eq!(Hostname::parse("Blog.Acme.ORG.").unwrap().as_str(), "blog.acme.org");
        assert!(Hostname::parse("").is_none());
        assert!(Hostname::parse("https://acme.org").is_none());
        assert!(Hostname::parse("acme.org/blog").is_none());
        assert!(Hostname::parse("acme.org:8080").is_none());
    }

    #[test]
    fn test_hostname_from_url_drops_port_and_path() {
        let url = Url::parse("https://www.acme.org:8443/about?x=1").unwrap();
        assert_eq!(Hostname::from_url(&url).unwrap().as_str(), "www.acme.org");
    }

    #[test]
    fn test_registrable_base() {
        let host = Hostname::parse("news.acme.org").unwrap();
        assert!(host.has_subdomain());
        assert_eq!(host.registrable_base().as_str(), "acme.org");
        assert_eq!(host.base_label(), "acme");

        let bare = Hostname::parse("acme.org").unwrap();
        assert!(!bare.has_subdomain());
        assert_eq!(bare.registrable_base(), bare);
    }

    #[test]
    fn test_registrable_base_under_two_level_suffix() {
        let bare = Hostname::parse("acme.co.uk").unwrap();
        assert!(!bare.has_subdomain());
        assert_eq!(bare.registrable_base(), bare);
        assert_eq!(bare.base_label(), "acme");

        let www = Hostname::parse("www.acme.org.au").unwrap();
        assert!(www.has_subdomain());
        assert_eq!(www.registrable_base().as_str(), "acme.org.au");

        // only listed suffixes get the extra label
        let host = Hostname::parse("news.acme.example").unwrap();
        assert_eq!(host.registrable_base().as_str(), "acme.example");
    }

    #[test]
    fn test_with_prefix_accepts_trailing_dot() {
        let host = Hostname::parse("acme.org").unwrap();
        assert_eq!(host.with_prefix("blog.").unwrap().as_str(), "blog.acme.org");
        assert_eq!(host.with_prefix("news").unwrap().as_str(), "news.acme.org");
        assert!(host.with_prefix(".").is_none());
    }

    #[test]
    fn test_probe_path_parse() {
        assert_eq!(ProbePath::parse("/blog"), Some(ProbePath::content("/blog")));
        assert_eq!(
            ProbePath::parse("head:/wp-login.php"),
            Some(ProbePath::exists("/wp-login.php"))
        );
        assert_eq!(
            ProbePath::parse("api:/wp-json/"),
            Some(ProbePath::rest_api("/wp-json/"))
        );
        assert!(ProbePath::parse("blog").is_none());
        assert_eq!(ProbePath::exists("/wp-login.php").to_string(), "head:/wp-login.php");
    }

    #[test]
    fn test_probe_target_url() {
        let target = ProbeTarget::new(
            Hostname::parse("acme.org").unwrap(),
            ProbePath::rest_api("/wp-json/wp/v2/posts?per_page=1"),
            Scheme::Http,
        );
        assert_eq!(
            target.url().unwrap().as_str(),
            "http://acme.org/wp-json/wp/v2/posts?per_page=1"
        );
    }
}
