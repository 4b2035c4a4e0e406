//! Page eligibility and the permitted-hosts store.
//!
//! The companion only activates on hosts the user has whitelisted, and only
//! on pages that look like a single article rather than a front page,
//! listing or search result.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// URL fragments that mark a page as an article even if a homescreen
/// pattern matches
const ARTICLE_SEGMENTS: &[&str] = &["/article", "/news/", "/story", "/articles"];

/// Query parameters that mark a search or paginated listing
const LISTING_PARAMS: &[&str] = &["s", "q", "search", "query", "page"];

/// Homescreen rule that rejected a page, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomescreenRule {
    /// `/` or empty path
    Root,
    /// `/index`, `/home`, `/main` (optionally `.html`)
    IndexPage,
    /// `/search`, `/results`, `/tag`, `/category`
    Listing,
    /// `/trending`, `/top`, `/latest`, `/breaking`, `/headlines`, `/feed`
    Feed,
    /// `/author/`, `/writer/`, `/journalist/`
    AuthorPage,
    /// Section fronts such as `/politics` or `/world/`
    SectionFront,
    /// Search or pagination query parameters
    SearchQuery,
}

impl std::fmt::Display for HomescreenRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HomescreenRule::Root => "site root",
            HomescreenRule::IndexPage => "index page",
            HomescreenRule::Listing => "search or tag listing",
            HomescreenRule::Feed => "news feed",
            HomescreenRule::AuthorPage => "author page",
            HomescreenRule::SectionFront => "section front",
            HomescreenRule::SearchQuery => "search query",
        };
        write!(f, "{}", name)
    }
}

/// Why the companion does not start on a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("invalid page URL: {0}")]
    InvalidUrl(String),

    #[error("host '{0}' is not whitelisted")]
    NotWhitelisted(String),

    #[error("page looks like a {0}, not an article")]
    Homescreen(HomescreenRule),
}

/// How the page was activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    /// Normal page load, subject to the eligibility check
    #[default]
    Normal,
    /// One-time force-activate from the hosting UI
    Forced,
}

/// Result of the eligibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Start,
    /// Started despite a rejection because activation was forced
    Forced(Option<Rejection>),
    Reject(Rejection),
}

impl Decision {
    pub fn starts(&self) -> bool {
        !matches!(self, Decision::Reject(_))
    }
}

fn path_rules() -> &'static [(HomescreenRule, Regex)] {
    static RULES: OnceLock<Vec<(HomescreenRule, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (HomescreenRule::Root, r"^/?$"),
            (HomescreenRule::IndexPage, r"/(index|home|main)(\.html)?$"),
            (HomescreenRule::Listing, r"/(search|results|tag|category)"),
            (HomescreenRule::Feed, r"/(trending|top|latest|breaking|headlines|feed)"),
            (HomescreenRule::AuthorPage, r"/(author|writer|journalist)/"),
            (
                HomescreenRule::SectionFront,
                r"/(section|topic|politics|business|tech|sports|world)/?$",
            ),
        ]
        .into_iter()
        .filter_map(|(rule, pattern)| Regex::new(pattern).ok().map(|re| (rule, re)))
        .collect()
    })
}

/// First homescreen rule matching the URL, ignoring article segments
pub fn homescreen_rule(url: &Url) -> Option<HomescreenRule> {
    let path = url.path().to_lowercase();
    if let Some((rule, _)) = path_rules().iter().find(|(_, re)| re.is_match(&path)) {
        return Some(*rule);
    }

    let has_listing_param = url
        .query_pairs()
        .any(|(name, _)| LISTING_PARAMS.contains(&name.to_lowercase().as_str()));
    has_listing_param.then_some(HomescreenRule::SearchQuery)
}

/// Whether the URL carries an article-indicating segment
pub fn has_article_segment(url: &Url) -> bool {
    let href = url.as_str().to_lowercase();
    ARTICLE_SEGMENTS.iter().any(|s| href.contains(s))
}

/// Whether the host contains any whitelisted entry (case-insensitive)
pub fn host_permitted(host: &str, whitelist: &[String]) -> bool {
    let host = host.to_lowercase();
    whitelist
        .iter()
        .map(|d| d.trim().to_lowercase())
        .any(|d| !d.is_empty() && host.contains(&d))
}

/// Check a page against the whitelist and the homescreen rules
pub fn check_page(url: &str, whitelist: &[String]) -> Result<(), Rejection> {
    let parsed = Url::parse(url).map_err(|e| Rejection::InvalidUrl(e.to_string()))?;
    let host = parsed.host_str().unwrap_or_default();

    if !host_permitted(host, whitelist) {
        return Err(Rejection::NotWhitelisted(host.to_string()));
    }

    match homescreen_rule(&parsed) {
        Some(rule) if !has_article_segment(&parsed) => Err(Rejection::Homescreen(rule)),
        _ => Ok(()),
    }
}

/// Decide whether to start the pipeline on this page load
pub fn decide(url: &str, whitelist: &[String], activation: Activation) -> Decision {
    match (check_page(url, whitelist), activation) {
        (Ok(()), Activation::Normal) => Decision::Start,
        (Ok(()), Activation::Forced) => Decision::Forced(None),
        (Err(rejection), Activation::Forced) => Decision::Forced(Some(rejection)),
        (Err(rejection), Activation::Normal) => Decision::Reject(rejection),
    }
}

// ---------------------------------------------------------------------------
// Whitelist store
// ---------------------------------------------------------------------------

/// Errors from whitelist edits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WhitelistError {
    #[error("domain must not be empty")]
    Empty,

    #[error("domain '{0}' is already whitelisted")]
    Duplicate(String),

    #[error("domain '{0}' is not whitelisted")]
    Missing(String),

    #[error("URL '{0}' has no host")]
    NoHost(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WhitelistFile {
    #[serde(rename = "aiWhitelistedDomains", default)]
    domains: Vec<String>,
}

/// Persisted set of permitted hosts
#[derive(Debug)]
pub struct WhitelistStore {
    path: PathBuf,
    domains: Vec<String>,
}

impl WhitelistStore {
    /// Open the store, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let domains = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read whitelist: {}", path.display()))?;
            let file: WhitelistFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse whitelist: {}", path.display()))?;
            file.domains
        } else {
            Vec::new()
        };

        Ok(Self { path, domains })
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn contains_host(&self, host: &str) -> bool {
        host_permitted(host, &self.domains)
    }

    /// Add a domain (trimmed and lowercased)
    pub fn add(&mut self, domain: &str) -> Result<String, WhitelistError> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Err(WhitelistError::Empty);
        }
        if self.domains.contains(&domain) {
            return Err(WhitelistError::Duplicate(domain));
        }
        self.domains.push(domain.clone());
        Ok(domain)
    }

    /// Add the host of a page URL
    pub fn add_site(&mut self, url: &str) -> Result<String, WhitelistError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| WhitelistError::NoHost(url.to_string()))?;
        self.add(&host)
    }

    pub fn remove(&mut self, domain: &str) -> Result<(), WhitelistError> {
        let domain = domain.trim().to_lowercase();
        let before = self.domains.len();
        self.domains.retain(|d| *d != domain);
        if self.domains.len() == before {
            return Err(WhitelistError::Missing(domain));
        }
        Ok(())
    }

    /// Write the store back to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = WhitelistFile {
            domains: self.domains.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write whitelist: {}", self.path.display()))?;
        Ok(())
    }
}
