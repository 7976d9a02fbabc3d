//! Navigation Matcher
//!
//! Fallback decision point for hosts without declarative rule support.
//! Called inline for every navigation, so it never does I/O: the site list
//! is compiled once per settings snapshot and each decision is a pure
//! function of that snapshot and the URL.

use crate::site::SitePattern;
use crate::types::{Settings, SiteEntry};
use crate::url::extract_host;

// =============================================================================
// Match Result
// =============================================================================

/// Decision for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    Allow,
    Block,
}

/// Result of matching a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub decision: MatchDecision,
    /// Index into `sites` of the entry that blocked, if any.
    pub entry_index: Option<usize>,
}

impl Default for MatchResult {
    fn default() -> Self {
        Self {
            decision: MatchDecision::Allow,
            entry_index: None,
        }
    }
}

// =============================================================================
// Matcher
// =============================================================================

#[derive(Debug, Clone)]
enum Needle {
    Pattern(SitePattern),
    /// Entry that failed validation; only plain containment applies.
    Raw(String),
}

impl Needle {
    fn text(&self) -> &str {
        match self {
            Self::Pattern(pattern) => pattern.as_str(),
            Self::Raw(text) => text,
        }
    }
}

/// Compiled view of a settings snapshot for navigation decisions.
#[derive(Debug, Clone)]
pub struct SiteMatcher {
    enabled: bool,
    needles: Vec<(usize, Needle)>,
}

impl SiteMatcher {
    /// Compile a matcher for the given snapshot.
    ///
    /// Trusts the focus flag as stored. Use [`SiteMatcher::from_settings_at`]
    /// when the clock is known.
    pub fn new(settings: &Settings) -> Self {
        Self::from_sites(&settings.sites, settings.blocking_enabled())
    }

    /// Compile a matcher for the snapshot as it stands at `now_ms` (epoch
    /// millis). A focus session past its end time no longer forces blocking,
    /// even before the flag has been cleared in storage.
    pub fn from_settings_at(settings: &Settings, now_ms: i64) -> Self {
        Self::from_sites(&settings.sites, settings.blocking_enabled_at(now_ms))
    }

    pub fn from_sites(sites: &[SiteEntry], enabled: bool) -> Self {
        let mut needles = Vec::with_capacity(sites.len());
        for (idx, site) in sites.iter().enumerate() {
            match SitePattern::parse(&site.url) {
                Ok(pattern) => needles.push((idx, Needle::Pattern(pattern))),
                Err(err) => {
                    let raw = site.url.trim().to_lowercase();
                    // Needles like "" or "/" are contained in every URL
                    if !raw.bytes().any(|b| b.is_ascii_alphanumeric()) {
                        continue;
                    }
                    log::debug!("site entry {:?} is not a valid pattern ({err}), matching as raw text", site.url);
                    needles.push((idx, Needle::Raw(raw)));
                }
            }
        }
        Self { enabled, needles }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of entries taking part in matching.
    pub fn len(&self) -> usize {
        self.needles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }

    /// Match a navigation URL and return the decision.
    pub fn match_url(&self, url: &str) -> MatchResult {
        if !self.enabled || self.needles.is_empty() {
            return MatchResult::default();
        }

        let url = url.trim().to_lowercase();
        let hit = match extract_host(&url) {
            Some(host) => {
                let host = host.strip_suffix('.').unwrap_or(host);
                self.needles.iter().find(|(_, needle)| match needle {
                    Needle::Pattern(pattern) => pattern.matches(host, &url),
                    Needle::Raw(text) => url.contains(text.as_str()),
                })
            }
            // Unparseable URL: plain containment of every entry
            None => self
                .needles
                .iter()
                .find(|(_, needle)| url.contains(needle.text())),
        };

        match hit {
            Some((idx, _)) => MatchResult {
                decision: MatchDecision::Block,
                entry_index: Some(*idx),
            },
            None => MatchResult::default(),
        }
    }

    /// Whether the navigation should be cancelled.
    #[inline]
    pub fn should_block(&self, url: &str) -> bool {
        self.match_url(url).decision == MatchDecision::Block
    }
}

/// One-shot decision without keeping a compiled matcher around.
pub fn is_url_blocked(url: &str, sites: &[SiteEntry], enabled: bool) -> bool {
    SiteMatcher::from_sites(sites, enabled).should_block(url)
}
