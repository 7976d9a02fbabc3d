//! Site entry normalisation
//!
//! Turns what the user typed ("Facebook.com", "https://www.youtube.com/",
//! "reddit.com/r/all") into a [`SitePattern`] that both the declarative
//! rule compiler and the in-process matcher understand.
//!
//! Host entries match label-aligned: `facebook.com` covers `facebook.com`
//! and `m.facebook.com` but never `notfacebook.com`. Anything that is not a
//! bare host becomes a substring pattern and matches anywhere in the URL.

use std::fmt;

use crate::url::{get_scheme_end, host_matches_domain, is_valid_hostname, split_authority};

/// Characters with a special meaning in declarative URL filters.
const FILTER_METACHARS: [char; 3] = ['*', '|', '^'];

/// Error type for site entry validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiteError {
    #[error("Site cannot be empty")]
    Empty,
    #[error("Site cannot contain spaces or control characters")]
    InvalidCharacter,
    #[error("Site must be ASCII; enter internationalised domains in punycode form")]
    NonAscii,
    #[error("Site contains unsupported character '{0}'")]
    UnsupportedCharacter(char),
    #[error("Site needs a host name")]
    MissingHost,
}

/// A validated, normalised site entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SitePattern {
    /// Bare hostname; blocks the host and all of its subdomains.
    Host(String),
    /// Lowercase text matched anywhere in the URL.
    Substring(String),
}

impl SitePattern {
    /// Parse and normalise a site entry.
    pub fn parse(raw: &str) -> Result<Self, SiteError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SiteError::Empty);
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SiteError::InvalidCharacter);
        }
        if !trimmed.is_ascii() {
            return Err(SiteError::NonAscii);
        }

        let lowered = trimmed.to_ascii_lowercase();
        let without_scheme = match get_scheme_end(&lowered) {
            Some(end) => &lowered[end..],
            None => lowered.as_str(),
        };

        let (host, rest) = split_authority(without_scheme);
        if !host.bytes().any(|b| b.is_ascii_alphanumeric()) {
            return Err(if without_scheme.is_empty() {
                SiteError::Empty
            } else {
                SiteError::MissingHost
            });
        }
        let host = host.strip_prefix("*.").unwrap_or(host);
        let host = host.strip_suffix('.').unwrap_or(host);
        if (rest.is_empty() || rest == "/") && is_valid_hostname(host) {
            return Ok(Self::Host(host.to_string()));
        }

        if let Some(c) = without_scheme.chars().find(|c| FILTER_METACHARS.contains(c)) {
            return Err(SiteError::UnsupportedCharacter(c));
        }

        Ok(Self::Substring(without_scheme.to_string()))
    }

    /// Normalised text of the pattern.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Host(host) => host,
            Self::Substring(text) => text,
        }
    }

    /// Declarative URL filter equivalent to this pattern.
    pub fn url_filter(&self) -> String {
        match self {
            Self::Host(host) => format!("||{host}^"),
            Self::Substring(text) => text.clone(),
        }
    }

    /// Match against an already parsed navigation.
    ///
    /// `host` and `url` must be lowercase.
    #[inline]
    pub fn matches(&self, host: &str, url: &str) -> bool {
        match self {
            Self::Host(domain) => host_matches_domain(host, domain),
            Self::Substring(text) => url.contains(text.as_str()),
        }
    }
}

impl fmt::Display for SitePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(s: &str) -> SitePattern {
        SitePattern::Host(s.to_string())
    }

    fn substring(s: &str) -> SitePattern {
        SitePattern::Substring(s.to_string())
    }

    #[test]
    fn parses_bare_hosts() {
        assert_eq!(SitePattern::parse("facebook.com"), Ok(host("facebook.com")));
        assert_eq!(SitePattern::parse("  Twitter.COM "), Ok(host("twitter.com")));
        assert_eq!(SitePattern::parse("localhost"), Ok(host("localhost")));
        assert_eq!(SitePattern::parse("example.com."), Ok(host("example.com")));
        assert_eq!(SitePattern::parse("*.example.com"), Ok(host("example.com")));
    }

    #[test]
    fn strips_url_decoration_from_hosts() {
        assert_eq!(SitePattern::parse("https://www.youtube.com/"), Ok(host("www.youtube.com")));
        assert_eq!(SitePattern::parse("http://user@example.com:8080"), Ok(host("example.com")));
        assert_eq!(SitePattern::parse("example.com:443"), Ok(host("example.com")));
    }

    #[test]
    fn paths_become_substrings() {
        assert_eq!(SitePattern::parse("reddit.com/r/all"), Ok(substring("reddit.com/r/all")));
        assert_eq!(
            SitePattern::parse("https://news.ycombinator.com/item?id=1"),
            Ok(substring("news.ycombinator.com/item?id=1"))
        );
        assert_eq!(SitePattern::parse("my_site"), Ok(substring("my_site")));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(SitePattern::parse(""), Err(SiteError::Empty));
        assert_eq!(SitePattern::parse("   "), Err(SiteError::Empty));
        assert_eq!(SitePattern::parse("https://"), Err(SiteError::Empty));
        assert_eq!(SitePattern::parse("face book.com"), Err(SiteError::InvalidCharacter));
        assert_eq!(SitePattern::parse("bücher.de"), Err(SiteError::NonAscii));
        assert_eq!(SitePattern::parse("ads*.com"), Err(SiteError::UnsupportedCharacter('*')));
        assert_eq!(SitePattern::parse("a|b"), Err(SiteError::UnsupportedCharacter('|')));
    }

    #[test]
    fn rejects_entries_without_a_host() {
        for input in ["/", ".", ":", "https:///", "//", "/r/all", "?q=1", "-.-", ":8080/x"] {
            assert_eq!(SitePattern::parse(input), Err(SiteError::MissingHost), "{input}");
        }
    }

    #[test]
    fn url_filters() {
        assert_eq!(host("facebook.com").url_filter(), "||facebook.com^");
        assert_eq!(substring("reddit.com/r/all").url_filter(), "reddit.com/r/all");
    }

    #[test]
    fn host_patterns_are_label_aligned() {
        let pattern = host("facebook.com");
        assert!(pattern.matches("www.facebook.com", "https://www.facebook.com/feed"));
        assert!(!pattern.matches("notfacebook.com", "https://notfacebook.com/"));
    }
}
